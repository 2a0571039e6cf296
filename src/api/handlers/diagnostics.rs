//! Admin-only connectivity diagnostics for the database and the LLM provider.
//!
//! Connection strings are always masked and secret values are never returned;
//! only whether each environment key is set.

use crate::{
    api::{AppState, extract::AdminAuth},
    config::database::{ProbeReport, probe_candidates},
    llm::{ModelProbe, probe_models},
};
use axum::{Json, extract::State};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    pub name: String,
    pub masked_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    pub ok: bool,
    pub latency_ms: u128,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseDiagnostics {
    pub active_profile: String,
    pub active_url: String,
    pub backend: String,
    pub candidates: Vec<CandidateView>,
    pub ping: PingResult,
    pub configured_keys: BTreeMap<&'static str, bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmDiagnostics {
    pub primary_model: Option<String>,
    pub working_models: Vec<String>,
    pub models: Vec<ModelProbe>,
}

pub(crate) async fn ping(db: &DatabaseConnection) -> PingResult {
    let started = Instant::now();
    let outcome = db.ping().await;
    PingResult {
        ok: outcome.is_ok(),
        latency_ms: started.elapsed().as_millis(),
        error: outcome.err().map(|e| e.to_string()),
    }
}

pub async fn database(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Json<DatabaseDiagnostics> {
    let active = &state.connection.active;
    Json(DatabaseDiagnostics {
        active_profile: active.name.clone(),
        active_url: active.masked_url(),
        backend: format!("{:?}", state.db.get_database_backend()),
        candidates: state
            .connection
            .candidates
            .iter()
            .map(|c| CandidateView {
                name: c.name.clone(),
                masked_url: c.masked_url(),
            })
            .collect(),
        ping: ping(&state.db).await,
        configured_keys: state.settings.configured_keys().into_iter().collect(),
    })
}

/// Opens a fresh connection to every candidate; the live pool is untouched.
pub async fn probe_database(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Json<Vec<ProbeReport>> {
    let timeout = Duration::from_secs(state.settings.server.database.connect_timeout_secs);
    Json(probe_candidates(&state.connection.candidates, timeout).await)
}

pub async fn llm(State(state): State<AppState>, _admin: AdminAuth) -> Json<LlmDiagnostics> {
    let models = probe_models(state.llm.as_ref()).await;
    Json(LlmDiagnostics {
        primary_model: state.llm.models().into_iter().next(),
        working_models: models
            .iter()
            .filter(|m| m.ok)
            .map(|m| m.model.clone())
            .collect(),
        models,
    })
}
