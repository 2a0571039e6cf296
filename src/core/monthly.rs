//! Monthly usage reset business logic
//!
//! Decides whether a subscription's message counter should be zeroed and
//! performs the reset. A counter is due once 30 whole days have passed since
//! `last_reset`, and only ACTIVE subscriptions are eligible.
//!
//! The reset is a conditional update keyed on the `last_reset` value the
//! caller observed. When two callers race, only one update applies and the
//! other re-reads the row instead of writing stale counters back.

use crate::{
    core::plan::SubscriptionStatus,
    entities::{Subscription, subscription},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{debug, info, instrument};

pub use crate::core::plan::get_message_limit_by_plan;

/// Whole days that must elapse between resets.
pub const RESET_INTERVAL_DAYS: i64 = 30;

/// Per-subscription outcome of a reset sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResetResult {
    pub subscription_id: String,
    pub merchant_id: String,
    pub plan: String,
    /// Counter before the reset
    pub old_messages_used: i32,
    /// Counter after the reset (zero unless a concurrent writer got there first)
    pub new_messages_used: i32,
}

/// Represents the result of sweeping all subscriptions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSweepResult {
    pub reset_subscriptions: Vec<SubscriptionResetResult>,
    pub total_checked: usize,
    /// Due but not ACTIVE
    pub skipped_ineligible: usize,
    /// Fewer than 30 days since the last reset, or never reset
    pub not_due: usize,
    pub run_at: DateTime<Utc>,
}

/// Checks whether 30 or more whole days have passed since the last reset.
/// Returns false when the subscription has never been reset.
#[must_use]
pub fn needs_monthly_reset(subscription: &subscription::Model) -> bool {
    needs_monthly_reset_at(subscription, Utc::now())
}

/// [`needs_monthly_reset`] against an explicit clock.
#[must_use]
pub fn needs_monthly_reset_at(subscription: &subscription::Model, now: DateTime<Utc>) -> bool {
    subscription
        .last_reset
        .is_some_and(|last_reset| (now - last_reset).num_days() >= RESET_INTERVAL_DAYS)
}

/// Only ACTIVE subscriptions get their quota refilled.
#[must_use]
pub fn is_eligible_for_reset(subscription: &subscription::Model) -> bool {
    subscription.status.parse::<SubscriptionStatus>() == Ok(SubscriptionStatus::Active)
}

/// Zeroes `messages_used` and stamps `last_reset` with the current time.
///
/// # Errors
/// * [`Error::SubscriptionNotFound`] - no subscription has this id
/// * [`Error::Database`] - the update failed; its message is the store's error text
pub async fn perform_monthly_reset<C>(db: &C, subscription_id: &str) -> Result<subscription::Model>
where
    C: ConnectionTrait,
{
    perform_monthly_reset_at(db, subscription_id, Utc::now()).await
}

/// [`perform_monthly_reset`] against an explicit clock.
#[instrument(skip(db))]
pub async fn perform_monthly_reset_at<C>(
    db: &C,
    subscription_id: &str,
    now: DateTime<Utc>,
) -> Result<subscription::Model>
where
    C: ConnectionTrait,
{
    let result = Subscription::update_many()
        .col_expr(subscription::Column::MessagesUsed, Expr::value(0))
        .col_expr(subscription::Column::LastReset, Expr::value(now))
        .col_expr(subscription::Column::UpdatedAt, Expr::value(now))
        .filter(subscription::Column::Id.eq(subscription_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::SubscriptionNotFound {
            id: subscription_id.to_string(),
        });
    }

    info!(subscription_id, "Monthly usage reset performed");

    Subscription::find_by_id(subscription_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::SubscriptionNotFound {
            id: subscription_id.to_string(),
        })
}

/// Resets the subscription if it is due and eligible; otherwise returns it unchanged.
///
/// On success the returned copy carries `messages_used == 0` and the new
/// `last_reset`. If another caller already reset the row, the current row is
/// returned instead.
pub async fn check_and_perform_reset<C>(
    db: &C,
    subscription: subscription::Model,
) -> Result<subscription::Model>
where
    C: ConnectionTrait,
{
    check_and_perform_reset_at(db, subscription, Utc::now()).await
}

/// [`check_and_perform_reset`] against an explicit clock.
pub async fn check_and_perform_reset_at<C>(
    db: &C,
    subscription: subscription::Model,
    now: DateTime<Utc>,
) -> Result<subscription::Model>
where
    C: ConnectionTrait,
{
    if !needs_monthly_reset_at(&subscription, now) || !is_eligible_for_reset(&subscription) {
        return Ok(subscription);
    }

    // Only apply if nobody reset the row since we read it.
    let observed = subscription.last_reset;
    let result = Subscription::update_many()
        .col_expr(subscription::Column::MessagesUsed, Expr::value(0))
        .col_expr(subscription::Column::LastReset, Expr::value(now))
        .col_expr(subscription::Column::UpdatedAt, Expr::value(now))
        .filter(subscription::Column::Id.eq(subscription.id.as_str()))
        .filter(subscription::Column::LastReset.eq(observed))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        debug!(
            subscription_id = %subscription.id,
            "Reset already applied by another request, re-reading"
        );
        return Subscription::find_by_id(subscription.id.as_str())
            .one(db)
            .await?
            .ok_or(Error::SubscriptionNotFound {
                id: subscription.id,
            });
    }

    info!(
        subscription_id = %subscription.id,
        previous_usage = subscription.messages_used,
        "Monthly usage reset performed"
    );

    Ok(subscription::Model {
        messages_used: 0,
        last_reset: Some(now),
        updated_at: now,
        ..subscription
    })
}

/// Applies [`check_and_perform_reset_at`] to every subscription.
///
/// Each reset is its own conditional update, so a sweep that fails halfway
/// leaves the already-reset rows in a consistent state.
pub async fn process_monthly_resets(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<ResetSweepResult> {
    let subscriptions = Subscription::find().all(db).await?;
    let total_checked = subscriptions.len();

    let mut reset_subscriptions = Vec::new();
    let mut skipped_ineligible = 0;
    let mut not_due = 0;

    for sub in subscriptions {
        if !needs_monthly_reset_at(&sub, now) {
            not_due += 1;
            continue;
        }
        if !is_eligible_for_reset(&sub) {
            skipped_ineligible += 1;
            continue;
        }

        let old_messages_used = sub.messages_used;
        let updated = check_and_perform_reset_at(db, sub, now).await?;
        reset_subscriptions.push(SubscriptionResetResult {
            subscription_id: updated.id,
            merchant_id: updated.merchant_id,
            plan: updated.plan,
            old_messages_used,
            new_messages_used: updated.messages_used,
        });
    }

    Ok(ResetSweepResult {
        reset_subscriptions,
        total_checked,
        skipped_ineligible,
        not_due,
        run_at: now,
    })
}

/// Formats a sweep result into a human-readable summary for logs.
#[must_use]
pub fn format_reset_summary(result: &ResetSweepResult) -> String {
    use std::fmt::Write;

    let mut summary = format!(
        "Monthly Reset - {} - Checked {} subscriptions\n",
        result.run_at.format("%Y-%m-%d %H:%M UTC"),
        result.total_checked
    );

    // write! is infallible when writing to String
    let _ = write!(
        summary,
        "  Reset: {} | Not due: {} | Ineligible: {}\n",
        result.reset_subscriptions.len(),
        result.not_due,
        result.skipped_ineligible
    );

    for reset in &result.reset_subscriptions {
        let _ = writeln!(
            summary,
            "  {} ({}) | {} → {}",
            reset.subscription_id, reset.plan, reset.old_messages_used, reset.new_messages_used
        );
    }

    summary
}
