/// Admin accounts from the environment and the database
pub mod admin;

/// Password hashing and merchant/admin tokens
pub mod auth;

/// The widget chat flow
pub mod chat;

/// Conversation and message storage
pub mod conversation;

/// Admin dashboard aggregates
pub mod dashboard;

/// Merchant registration, login, and profile
pub mod merchant;

/// Monthly usage reset
pub mod monthly;

/// Plan tiers and subscription statuses
pub mod plan;

/// Quota gate, metering, and admin subscription edits
pub mod subscription;
