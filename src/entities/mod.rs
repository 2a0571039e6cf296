//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod admin;
pub mod conversation;
pub mod merchant;
pub mod message;
pub mod subscription;

// Re-export specific types to avoid conflicts
pub use admin::{Column as AdminColumn, Entity as Admin, Model as AdminModel};
pub use conversation::{
    Column as ConversationColumn, Entity as Conversation, Model as ConversationModel,
};
pub use merchant::{Column as MerchantColumn, Entity as Merchant, Model as MerchantModel};
pub use message::{Column as MessageColumn, Entity as Message, Model as MessageModel};
pub use subscription::{
    Column as SubscriptionColumn, Entity as Subscription, Model as SubscriptionModel,
};
