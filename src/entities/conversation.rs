//! Conversation entity - One chat session between a customer and a merchant's bot.
//!
//! A conversation is keyed by (`merchant_id`, `session_id`); the session id is
//! generated by the widget and kept in the customer's browser.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Conversation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conversations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub merchant_id: String,
    /// Widget-generated session identifier
    pub session_id: String,
    pub customer_name: Option<String>,
    pub created_at: DateTimeUtc,
    /// Bumped on every new message
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::merchant::Entity",
        from = "Column::MerchantId",
        to = "super::merchant::Column::Id"
    )]
    Merchant,
    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
}

impl Related<super::merchant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Merchant.def()
    }
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
