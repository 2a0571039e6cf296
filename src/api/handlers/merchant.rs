//! Endpoints for a logged-in merchant.

use crate::{
    api::{AppState, extract::MerchantAuth, handlers::auth::json_body},
    core::{
        conversation::{ConversationSummary, conversation_messages, list_conversations},
        merchant::{MerchantProfile, ProfileUpdate, get_merchant_by_id, update_merchant_profile},
        monthly::check_and_perform_reset_at,
        subscription::{UsageStats, get_subscription_for_merchant, usage_stats},
    },
    entities::message,
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub bot_name: Option<String>,
    pub welcome_message: Option<String>,
    pub primary_color: Option<String>,
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<message::Model> for MessageView {
    fn from(model: message::Model) -> Self {
        Self {
            id: model.id,
            role: model.role,
            content: model.content,
            created_at: model.created_at,
        }
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    MerchantAuth(claims): MerchantAuth,
) -> Result<Json<MerchantProfile>> {
    let merchant = get_merchant_by_id(&state.db, &claims.merchant_id).await?;
    Ok(Json(merchant.into()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    MerchantAuth(claims): MerchantAuth,
    body: std::result::Result<Json<ProfileUpdateRequest>, JsonRejection>,
) -> Result<Json<MerchantProfile>> {
    let request = json_body(body)?;
    let updated = update_merchant_profile(
        &state.db,
        &claims.merchant_id,
        ProfileUpdate {
            business_name: request.business_name,
            phone: request.phone,
            bot_name: request.bot_name,
            welcome_message: request.welcome_message,
            primary_color: request.primary_color,
            custom_instructions: request.custom_instructions,
        },
        Utc::now(),
    )
    .await?;
    Ok(Json(updated.into()))
}

/// Usage stats; a due monthly reset is applied first.
pub async fn usage(
    State(state): State<AppState>,
    MerchantAuth(claims): MerchantAuth,
) -> Result<Json<UsageStats>> {
    let now = Utc::now();
    let subscription = get_subscription_for_merchant(&state.db, &claims.merchant_id).await?;
    let subscription = check_and_perform_reset_at(&state.db, subscription, now).await?;
    Ok(Json(usage_stats(&subscription, now)))
}

pub async fn conversations(
    State(state): State<AppState>,
    MerchantAuth(claims): MerchantAuth,
) -> Result<Json<Vec<ConversationSummary>>> {
    Ok(Json(list_conversations(&state.db, &claims.merchant_id).await?))
}

pub async fn messages(
    State(state): State<AppState>,
    MerchantAuth(claims): MerchantAuth,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<MessageView>>> {
    let messages = conversation_messages(&state.db, &claims.merchant_id, &conversation_id).await?;
    Ok(Json(messages.into_iter().map(MessageView::from).collect()))
}
