//! Maps [`Error`] onto HTTP responses.
//!
//! This is the only place error kinds become status codes. Bodies look like
//! `{"error": "...", "code": "...", "details": ...}`.

use crate::errors::{Error, ErrorKind};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub details: Option<Value>,
}

#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Auth => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn details_for(err: &Error) -> Option<Value> {
    match err {
        Error::MessageLimitReached { used, limit } => Some(json!({ "used": used, "limit": limit })),
        Error::SubscriptionInactive { status } => Some(json!({ "status": status })),
        _ => None,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);

        let message = match kind {
            // Database and I/O messages stay in the log.
            ErrorKind::Internal => {
                error!(error = %self, "Request failed with internal error");
                "Internal server error".to_string()
            }
            ErrorKind::UpstreamUnavailable => {
                warn!(error = %self, "Upstream dependency failed");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: message,
            code: kind.code(),
            details: details_for(&self),
        };
        (status, Json(body)).into_response()
    }
}
