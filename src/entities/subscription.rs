//! Subscription entity - A merchant's plan, quota, and usage counters.
//!
//! `plan` and `status` are stored as plain strings so that rows written by
//! older deployments with unknown plan names still load; the typed views
//! live in `core::plan`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subscription database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    /// UUID string
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning merchant (one-to-one)
    #[sea_orm(unique)]
    pub merchant_id: String,
    /// `"BASIC"`, `"STANDARD"`, `"PREMIUM"`, or `"ENTERPRISE"`
    pub plan: String,
    /// `"TRIAL"`, `"ACTIVE"`, `"CANCELLED"`, or `"EXPIRED"`
    pub status: String,
    /// Messages consumed since the last reset
    pub messages_used: i32,
    /// Message ceiling for the current period
    pub messages_limit: i32,
    /// When the counter was last zeroed
    pub last_reset: Option<DateTimeUtc>,
    pub start_date: DateTimeUtc,
    /// End of the paid or trial period, if bounded
    pub end_date: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Subscription and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each subscription belongs to one merchant
    #[sea_orm(
        belongs_to = "super::merchant::Entity",
        from = "Column::MerchantId",
        to = "super::merchant::Column::Id"
    )]
    Merchant,
}

impl Related<super::merchant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Merchant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
