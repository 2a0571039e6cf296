//! Merchant entity - A tenant business owning one chatbot.
//!
//! Holds login credentials, the public `chatbot_id` used by the embeddable
//! widget, and the display customization shown to customers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Merchant database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "merchants")]
pub struct Model {
    /// UUID string
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Login email, stored lowercased
    #[sea_orm(unique)]
    pub email: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name of the business
    pub business_name: String,
    pub phone: Option<String>,
    /// Public identifier embedded in the chat widget
    #[sea_orm(unique)]
    pub chatbot_id: String,
    /// Name the assistant introduces itself with
    pub bot_name: String,
    /// First message shown in the widget
    pub welcome_message: String,
    /// Widget accent color in `#RRGGBB` form
    pub primary_color: String,
    /// Extra guidance appended to the system prompt
    pub custom_instructions: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Merchant and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One merchant has exactly one subscription
    #[sea_orm(has_one = "super::subscription::Entity")]
    Subscription,
    /// One merchant has many conversations
    #[sea_orm(has_many = "super::conversation::Entity")]
    Conversations,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl Related<super::conversation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Conversations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
