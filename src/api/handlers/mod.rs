/// Admin dashboard, subscription management, and admin accounts
pub mod admin;

/// Merchant and admin registration/login
pub mod auth;

/// Public widget configuration and chat
pub mod chat;

/// Database and LLM diagnostics
pub mod diagnostics;

/// Merchant profile, usage, and conversations
pub mod merchant;

use crate::api::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: DatabaseHealth,
    pub timestamp: DateTime<Utc>,
}

/// Public view of the database ping; the failure text stays in the logs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub ok: bool,
    pub latency_ms: u128,
}

/// Liveness plus a database ping. Answers 503 when the database is unreachable.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ping = diagnostics::ping(&state.db).await;
    if let Some(error) = &ping.error {
        warn!(error = %error, "Health check database ping failed");
    }
    let database = DatabaseHealth {
        ok: ping.ok,
        latency_ms: ping.latency_ms,
    };
    let (status, label) = if database.ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            database,
            timestamp: Utc::now(),
        }),
    )
}
