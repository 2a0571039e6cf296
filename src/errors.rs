//! Unified error types and result handling.
//!
//! Every fallible operation in the crate returns [`Result`]. Each variant is
//! classified into a closed [`ErrorKind`] which the HTTP layer maps to a
//! status code in one place.

use thiserror::Error;

/// Closed classification of everything that can go wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input
    Validation,
    /// Missing, invalid, or expired credentials
    Auth,
    /// Authenticated but not allowed (inactive subscription, non-admin token)
    Forbidden,
    /// The addressed record does not exist
    NotFound,
    /// The request collides with existing state
    Conflict,
    /// The message quota is used up
    QuotaExceeded,
    /// An outbound dependency (LLM API) failed or timed out
    UpstreamUnavailable,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable snake-case code used in JSON error bodies.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::QuotaExceeded => "quota_exceeded",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Email already registered: {email}")]
    EmailTaken { email: String },

    #[error("Admin username already exists: {username}")]
    AdminExists { username: String },

    #[error("Merchant not found: {id}")]
    MerchantNotFound { id: String },

    #[error("Subscription not found: {id}")]
    SubscriptionNotFound { id: String },

    #[error("Conversation not found: {id}")]
    ConversationNotFound { id: String },

    #[error("Subscription is not active (status: {status})")]
    SubscriptionInactive { status: String },

    #[error("Subscription expired")]
    SubscriptionExpired,

    #[error("Message limit reached ({used}/{limit})")]
    MessageLimitReached { used: i32, limit: i32 },

    #[error("LLM provider unavailable: {message}")]
    Upstream { message: String },

    #[error("Password hashing failed: {message}")]
    PasswordHash { message: String },

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Integer conversion error: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),
}

impl Error {
    /// Classifies this error for the HTTP boundary.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::InvalidCredentials | Self::Unauthorized { .. } | Self::Token(_) => {
                ErrorKind::Auth
            }
            Self::Forbidden { .. }
            | Self::SubscriptionInactive { .. }
            | Self::SubscriptionExpired => ErrorKind::Forbidden,
            Self::MerchantNotFound { .. }
            | Self::SubscriptionNotFound { .. }
            | Self::ConversationNotFound { .. } => ErrorKind::NotFound,
            Self::EmailTaken { .. } | Self::AdminExists { .. } => ErrorKind::Conflict,
            Self::MessageLimitReached { .. } => ErrorKind::QuotaExceeded,
            Self::Upstream { .. } | Self::Http(_) => ErrorKind::UpstreamUnavailable,
            Self::Config { .. }
            | Self::PasswordHash { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::IntConversion(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
