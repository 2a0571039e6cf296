//! Back-office endpoints. Every handler requires an admin token.

use crate::{
    api::{AppState, extract::AdminAuth, handlers::auth::json_body},
    core::{
        admin::{AdminIdentity, create_admin},
        dashboard::{DashboardStats, MerchantOverview, dashboard_stats, list_merchants},
        monthly::{
            ResetSweepResult, format_reset_summary, perform_monthly_reset_at,
            process_monthly_resets,
        },
        subscription::{
            SubscriptionUpdate, UsageStats, get_subscription_by_id, update_subscription,
            usage_stats,
        },
    },
    entities::subscription,
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

/// A subscription as seen by admins.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetail {
    pub id: String,
    pub merchant_id: String,
    pub start_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub usage: UsageStats,
}

impl SubscriptionDetail {
    fn new(model: &subscription::Model, now: DateTime<Utc>) -> Self {
        Self {
            id: model.id.clone(),
            merchant_id: model.merchant_id.clone(),
            start_date: model.start_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
            usage: usage_stats(model, now),
        }
    }
}

// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn deserialize_some<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdateRequest {
    pub plan: Option<String>,
    pub status: Option<String>,
    pub messages_limit: Option<i32>,
    pub messages_used: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub end_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
    pub subscription: SubscriptionDetail,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub summary: String,
    pub result: ResetSweepResult,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub username: String,
    pub password: String,
}

pub async fn dashboard(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<DashboardStats>> {
    Ok(Json(dashboard_stats(&state.db, Utc::now()).await?))
}

pub async fn merchants(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<Vec<MerchantOverview>>> {
    Ok(Json(list_merchants(&state.db, Utc::now()).await?))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(subscription_id): Path<String>,
) -> Result<Json<SubscriptionDetail>> {
    let subscription = get_subscription_by_id(&state.db, &subscription_id).await?;
    Ok(Json(SubscriptionDetail::new(&subscription, Utc::now())))
}

pub async fn update_subscription_handler(
    State(state): State<AppState>,
    AdminAuth(claims): AdminAuth,
    Path(subscription_id): Path<String>,
    body: std::result::Result<Json<SubscriptionUpdateRequest>, JsonRejection>,
) -> Result<Json<SubscriptionDetail>> {
    let request = json_body(body)?;
    let now = Utc::now();
    let updated = update_subscription(
        &state.db,
        &subscription_id,
        SubscriptionUpdate {
            plan: request.plan,
            status: request.status,
            messages_limit: request.messages_limit,
            messages_used: request.messages_used,
            end_date: request.end_date,
        },
        now,
    )
    .await?;
    info!(admin = %claims.username, subscription_id = %subscription_id, "Subscription edited");
    Ok(Json(SubscriptionDetail::new(&updated, now)))
}

/// Unconditional reset, regardless of status or elapsed time.
pub async fn reset_subscription(
    State(state): State<AppState>,
    AdminAuth(claims): AdminAuth,
    Path(subscription_id): Path<String>,
) -> Result<Json<ResetResponse>> {
    let now = Utc::now();
    let subscription = perform_monthly_reset_at(&state.db, &subscription_id, now).await?;
    info!(
        admin = %claims.username,
        subscription_id = %subscription_id,
        "Subscription usage reset by admin"
    );
    Ok(Json(ResetResponse {
        success: true,
        message: "Monthly usage reset".to_string(),
        subscription: SubscriptionDetail::new(&subscription, now),
    }))
}

pub async fn reset_due(
    State(state): State<AppState>,
    AdminAuth(claims): AdminAuth,
) -> Result<Json<SweepResponse>> {
    let result = process_monthly_resets(&state.db, Utc::now()).await?;
    info!(
        admin = %claims.username,
        reset = result.reset_subscriptions.len(),
        "Reset sweep triggered"
    );
    Ok(Json(SweepResponse {
        summary: format_reset_summary(&result),
        result,
    }))
}

pub async fn create_admin_handler(
    State(state): State<AppState>,
    AdminAuth(claims): AdminAuth,
    body: std::result::Result<Json<CreateAdminRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AdminIdentity>)> {
    let request = json_body(body)?;
    let created = create_admin(&state.db, &request.username, &request.password, Utc::now()).await?;
    info!(admin = %claims.username, new_admin = %created.username, "Admin account created");
    Ok((
        StatusCode::CREATED,
        Json(AdminIdentity {
            id: created.id,
            username: created.username,
            source: "database",
        }),
    ))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_end_date_absent_null_and_value() {
        let absent: SubscriptionUpdateRequest =
            serde_json::from_str(r#"{"plan":"PREMIUM"}"#).unwrap();
        assert!(absent.end_date.is_none());

        let cleared: SubscriptionUpdateRequest =
            serde_json::from_str(r#"{"endDate":null}"#).unwrap();
        assert_eq!(cleared.end_date, Some(None));

        let set: SubscriptionUpdateRequest =
            serde_json::from_str(r#"{"endDate":"2026-01-01T00:00:00Z"}"#).unwrap();
        assert!(matches!(set.end_date, Some(Some(_))));
    }
}
