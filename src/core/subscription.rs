//! Subscription business logic - quota gate, usage metering, and admin edits.
//!
//! The message counter is only ever changed through single conditional
//! updates so concurrent chat requests cannot exceed the plan limit.

use crate::{
    core::{
        monthly::RESET_INTERVAL_DAYS,
        plan::{Plan, SubscriptionStatus, get_message_limit_by_plan},
    },
    entities::{Subscription, subscription},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{Set, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Usage snapshot returned to merchants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub plan: String,
    pub status: String,
    pub messages_used: i32,
    pub messages_limit: i32,
    pub messages_remaining: i32,
    /// Progress as a percentage (0-100)
    pub usage_percent: f64,
    pub last_reset: Option<DateTime<Utc>>,
    pub next_reset: Option<DateTime<Utc>>,
    pub days_until_reset: Option<i64>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Fields an admin may change. `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionUpdate {
    pub plan: Option<String>,
    pub status: Option<String>,
    pub messages_limit: Option<i32>,
    pub messages_used: Option<i32>,
    /// `Some(None)` clears the end date
    pub end_date: Option<Option<DateTime<Utc>>>,
}

/// Creates the TRIAL subscription every merchant starts with.
pub async fn create_trial_subscription<C>(
    db: &C,
    merchant_id: &str,
    now: DateTime<Utc>,
    trial_days: i64,
) -> Result<subscription::Model>
where
    C: ConnectionTrait,
{
    let plan = Plan::Basic;
    let subscription = subscription::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        merchant_id: Set(merchant_id.to_string()),
        plan: Set(plan.as_str().to_string()),
        status: Set(SubscriptionStatus::Trial.as_str().to_string()),
        messages_used: Set(0),
        messages_limit: Set(plan.message_limit()),
        last_reset: Set(Some(now)),
        start_date: Set(now),
        end_date: Set(Some(trial_end(now, trial_days)?)),
        created_at: Set(now),
        updated_at: Set(now),
    };

    Ok(subscription.insert(db).await?)
}

fn trial_end(now: DateTime<Utc>, trial_days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(trial_days)
        .filter(|length| *length > Duration::zero())
        .and_then(|length| now.checked_add_signed(length))
        .ok_or_else(|| Error::Config {
            message: format!("trial_days = {trial_days} is out of range"),
        })
}

pub async fn get_subscription_by_id<C>(db: &C, subscription_id: &str) -> Result<subscription::Model>
where
    C: ConnectionTrait,
{
    Subscription::find_by_id(subscription_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::SubscriptionNotFound {
            id: subscription_id.to_string(),
        })
}

/// Finds the subscription owned by a merchant.
pub async fn get_subscription_for_merchant<C>(
    db: &C,
    merchant_id: &str,
) -> Result<subscription::Model>
where
    C: ConnectionTrait,
{
    Subscription::find()
        .filter(subscription::Column::MerchantId.eq(merchant_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::SubscriptionNotFound {
            id: format!("merchant:{merchant_id}"),
        })
}

/// Decides whether chat traffic may be served for this subscription.
///
/// # Errors
/// * [`Error::SubscriptionInactive`] - status is not TRIAL or ACTIVE
/// * [`Error::SubscriptionExpired`] - `end_date` has passed
/// * [`Error::MessageLimitReached`] - the counter is at the ceiling
pub fn check_chat_access(subscription: &subscription::Model, now: DateTime<Utc>) -> Result<()> {
    let allowed = subscription
        .status
        .parse::<SubscriptionStatus>()
        .is_ok_and(SubscriptionStatus::allows_chat);
    if !allowed {
        return Err(Error::SubscriptionInactive {
            status: subscription.status.clone(),
        });
    }

    if subscription.end_date.is_some_and(|end| end <= now) {
        return Err(Error::SubscriptionExpired);
    }

    if subscription.messages_used >= subscription.messages_limit {
        return Err(Error::MessageLimitReached {
            used: subscription.messages_used,
            limit: subscription.messages_limit,
        });
    }

    Ok(())
}

/// Atomically consumes one message from the quota:
/// `UPDATE subscriptions SET messages_used = messages_used + 1, updated_at = ?
///  WHERE id = ? AND messages_used < messages_limit`
///
/// # Errors
/// [`Error::MessageLimitReached`] when no row was updated because the quota is exhausted.
pub async fn reserve_message<C>(
    db: &C,
    subscription_id: &str,
    now: DateTime<Utc>,
) -> Result<subscription::Model>
where
    C: ConnectionTrait,
{
    let result = Subscription::update_many()
        .col_expr(
            subscription::Column::MessagesUsed,
            Expr::col(subscription::Column::MessagesUsed).add(1),
        )
        .col_expr(subscription::Column::UpdatedAt, Expr::value(now))
        .filter(subscription::Column::Id.eq(subscription_id))
        .filter(
            Expr::col(subscription::Column::MessagesUsed)
                .lt(Expr::col(subscription::Column::MessagesLimit)),
        )
        .exec(db)
        .await?;

    let current = get_subscription_by_id(db, subscription_id).await?;
    if result.rows_affected == 0 {
        return Err(Error::MessageLimitReached {
            used: current.messages_used,
            limit: current.messages_limit,
        });
    }

    Ok(current)
}

fn calculate_progress(used: i32, limit: i32) -> f64 {
    if limit <= 0 {
        return 100.0;
    }
    (f64::from(used) / f64::from(limit) * 100.0).clamp(0.0, 100.0)
}

/// Builds the usage snapshot shown on the merchant dashboard.
#[must_use]
pub fn usage_stats(subscription: &subscription::Model, now: DateTime<Utc>) -> UsageStats {
    let next_reset = subscription
        .last_reset
        .map(|last| last + Duration::days(RESET_INTERVAL_DAYS));
    let days_until_reset = next_reset.map(|next| (next - now).num_days().max(0));

    UsageStats {
        plan: subscription.plan.clone(),
        status: subscription.status.clone(),
        messages_used: subscription.messages_used,
        messages_limit: subscription.messages_limit,
        messages_remaining: (subscription.messages_limit - subscription.messages_used).max(0),
        usage_percent: calculate_progress(subscription.messages_used, subscription.messages_limit),
        last_reset: subscription.last_reset,
        next_reset,
        days_until_reset,
        end_date: subscription.end_date,
    }
}

/// Applies an admin edit.
///
/// Changing the plan without an explicit limit moves the limit to the new
/// plan's ceiling. Plan and status must be known names.
pub async fn update_subscription(
    db: &DatabaseConnection,
    subscription_id: &str,
    changes: SubscriptionUpdate,
    now: DateTime<Utc>,
) -> Result<subscription::Model> {
    let existing = get_subscription_by_id(db, subscription_id).await?;
    let mut active: subscription::ActiveModel = existing.into();

    if let Some(plan) = changes.plan {
        let plan: Plan = plan.parse().map_err(Error::validation)?;
        active.plan = Set(plan.as_str().to_string());
        if changes.messages_limit.is_none() {
            active.messages_limit = Set(get_message_limit_by_plan(plan.as_str()));
        }
    }

    if let Some(status) = changes.status {
        let status: SubscriptionStatus = status.parse().map_err(Error::validation)?;
        active.status = Set(status.as_str().to_string());
    }

    if let Some(limit) = changes.messages_limit {
        if limit < 0 {
            return Err(Error::validation("messagesLimit cannot be negative"));
        }
        active.messages_limit = Set(limit);
    }

    if let Some(used) = changes.messages_used {
        if used < 0 {
            return Err(Error::validation("messagesUsed cannot be negative"));
        }
        active.messages_used = Set(used);
    }

    if let Some(end_date) = changes.end_date {
        active.end_date = Set(end_date);
    }

    active.updated_at = Set(now);
    let updated = active.update(db).await?;
    info!(
        subscription_id,
        plan = %updated.plan,
        status = %updated.status,
        "Subscription updated by admin"
    );
    Ok(updated)
}
