//! Aggregates for the admin dashboard.

use crate::{
    core::{
        plan::SubscriptionStatus,
        subscription::{UsageStats, usage_stats},
    },
    entities::{Conversation, Merchant, Message, Subscription, merchant, subscription},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{PaginatorTrait, QueryOrder, QuerySelect, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;

/// Platform-wide counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_merchants: u64,
    /// Subscription count per status, every known status present
    pub subscriptions_by_status: BTreeMap<String, u64>,
    pub total_messages_used: i64,
    pub total_conversations: u64,
    pub total_messages: u64,
    pub generated_at: DateTime<Utc>,
}

/// One row of the admin merchant list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantOverview {
    pub id: String,
    pub email: String,
    pub business_name: String,
    pub chatbot_id: String,
    pub created_at: DateTime<Utc>,
    pub subscription_id: Option<String>,
    pub usage: Option<UsageStats>,
}

pub async fn dashboard_stats(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<DashboardStats> {
    let total_merchants = Merchant::find().count(db).await?;
    let total_conversations = Conversation::find().count(db).await?;
    let total_messages = Message::find().count(db).await?;

    let mut subscriptions_by_status: BTreeMap<String, u64> = SubscriptionStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
    let mut total_messages_used = 0_i64;

    let rows: Vec<(String, i32)> = Subscription::find()
        .select_only()
        .column(subscription::Column::Status)
        .column(subscription::Column::MessagesUsed)
        .into_tuple()
        .all(db)
        .await?;
    for (status, used) in rows {
        *subscriptions_by_status.entry(status).or_insert(0) += 1;
        total_messages_used += i64::from(used);
    }

    Ok(DashboardStats {
        total_merchants,
        subscriptions_by_status,
        total_messages_used,
        total_conversations,
        total_messages,
        generated_at: now,
    })
}

/// Every merchant with its subscription usage, newest merchants first.
pub async fn list_merchants(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Vec<MerchantOverview>> {
    let rows = Merchant::find()
        .find_also_related(Subscription)
        .order_by_desc(merchant::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(merchant, subscription)| MerchantOverview {
            subscription_id: subscription.as_ref().map(|s| s.id.clone()),
            usage: subscription.as_ref().map(|s| usage_stats(s, now)),
            id: merchant.id,
            email: merchant.email,
            business_name: merchant.business_name,
            chatbot_id: merchant.chatbot_id,
            created_at: merchant.created_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::conversation::{ROLE_USER, add_message, get_or_create_conversation},
        test_utils::*,
    };

    #[tokio::test]
    async fn test_dashboard_stats_empty() -> Result<()> {
        let db = setup_test_db().await?;
        let stats = dashboard_stats(&db, Utc::now()).await?;

        assert_eq!(stats.total_merchants, 0);
        assert_eq!(stats.total_messages_used, 0);
        assert_eq!(stats.subscriptions_by_status.len(), 4);
        assert!(stats.subscriptions_by_status.values().all(|count| *count == 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_dashboard_stats_counts() -> Result<()> {
        let db = setup_test_db().await?;
        let now = Utc::now();
        let a = create_test_merchant(&db, "a@example.com").await?;
        let b = create_test_merchant(&db, "b@example.com").await?;
        create_custom_subscription(&db, &a.id, "BASIC", "ACTIVE", 40, Some(now)).await?;
        create_custom_subscription(&db, &b.id, "PREMIUM", "TRIAL", 2, Some(now)).await?;

        let conv = get_or_create_conversation(&db, &a.id, "s-1", None, now).await?;
        add_message(&db, &conv.id, ROLE_USER, "hi", now).await?;
        add_message(&db, &conv.id, ROLE_USER, "hello?", now).await?;

        let stats = dashboard_stats(&db, now).await?;
        assert_eq!(stats.total_merchants, 2);
        assert_eq!(stats.subscriptions_by_status["ACTIVE"], 1);
        assert_eq!(stats.subscriptions_by_status["TRIAL"], 1);
        assert_eq!(stats.subscriptions_by_status["CANCELLED"], 0);
        assert_eq!(stats.total_messages_used, 42);
        assert_eq!(stats.total_conversations, 1);
        assert_eq!(stats.total_messages, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_merchants_joins_subscription() -> Result<()> {
        let db = setup_test_db().await?;
        let now = Utc::now();
        let with_sub = create_test_merchant(&db, "with@example.com").await?;
        create_test_merchant(&db, "without@example.com").await?;
        let sub =
            create_custom_subscription(&db, &with_sub.id, "STANDARD", "ACTIVE", 100, Some(now))
                .await?;

        let list = list_merchants(&db, now).await?;
        assert_eq!(list.len(), 2);

        let row = list.iter().find(|m| m.id == with_sub.id).unwrap();
        assert_eq!(row.subscription_id.as_deref(), Some(sub.id.as_str()));
        assert_eq!(row.usage.as_ref().unwrap().messages_used, 100);

        let bare = list.iter().find(|m| m.id != with_sub.id).unwrap();
        assert!(bare.usage.is_none());
        Ok(())
    }
}
