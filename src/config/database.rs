//! Database configuration module.
//!
//! Builds the list of candidate connection strings (direct, SSL-required,
//! pooled), picks the first one that answers a ping, and creates all tables
//! from the entity definitions with `Schema::create_table_from_entity`.
//!
//! The chosen connection is returned to the caller and injected into the
//! HTTP state; nothing here keeps process-wide state.

use crate::entities::{Admin, Conversation, Merchant, Message, Subscription, conversation};
use crate::errors::{Error, Result};
use reqwest::Url;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema,
    sea_query::Index,
};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Local development fallback when `DATABASE_URL` is unset.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/merchant_bot.sqlite?mode=rwc";

const POOLER_PORT: u16 = 6543;
const DIRECT_PORT: u16 = 5432;

/// A named connection string to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    /// `"direct"`, `"ssl"`, or `"pooled"`
    pub name: String,
    pub url: String,
}

impl ConnectionProfile {
    pub(crate) fn new(name: &str, url: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            url: url.into(),
        }
    }

    /// The URL with any password replaced, safe to log or return from diagnostics.
    #[must_use]
    pub fn masked_url(&self) -> String {
        mask_url(&self.url)
    }
}

/// Outcome of probing one candidate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub name: String,
    pub masked_url: String,
    pub ok: bool,
    pub latency_ms: u128,
    pub error: Option<String>,
}

/// Replaces the password component of a connection URL with `****`.
#[must_use]
pub fn mask_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("****")).is_err() {
                return "<unparseable>".to_string();
            }
            url.to_string()
        }
        Err(_) => "<unparseable>".to_string(),
    }
}

fn is_postgres(url: &Url) -> bool {
    matches!(url.scheme(), "postgres" | "postgresql")
}

fn with_query_param(url: &Url, key: &str, value: &str) -> Url {
    let mut url = url.clone();
    let already_set = url.query_pairs().any(|(k, _)| k == key);
    if !already_set {
        url.query_pairs_mut().append_pair(key, value);
    }
    url
}

/// Builds the ordered candidate list for a database URL.
///
/// Non-Postgres URLs (`SQLite`) yield a single direct candidate. Postgres URLs
/// additionally yield an SSL-required variant and a pooled variant, the latter
/// taken from `pooler_url` or derived by moving the direct port to the pooler
/// port with the statement cache disabled.
#[must_use]
pub fn connection_candidates(
    database_url: &str,
    pooler_url: Option<&str>,
) -> Vec<ConnectionProfile> {
    let mut candidates = vec![ConnectionProfile::new("direct", database_url)];

    let Ok(parsed) = Url::parse(database_url) else {
        return candidates;
    };
    if !is_postgres(&parsed) {
        return candidates;
    }

    candidates.push(ConnectionProfile::new(
        "ssl",
        with_query_param(&parsed, "sslmode", "require").to_string(),
    ));

    let pooled = match pooler_url {
        Some(url) => Some(url.to_string()),
        None => {
            let mut derived = with_query_param(&parsed, "sslmode", "require");
            let port = derived.port().unwrap_or(DIRECT_PORT);
            if port == DIRECT_PORT && derived.set_port(Some(POOLER_PORT)).is_ok() {
                Some(with_query_param(&derived, "statement-cache-capacity", "0").to_string())
            } else {
                None
            }
        }
    };
    if let Some(url) = pooled {
        candidates.push(ConnectionProfile::new("pooled", url));
    }

    candidates.dedup_by(|a, b| a.url == b.url);
    candidates
}

async fn connect(url: &str, timeout: Duration) -> std::result::Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(url.to_string());
    options
        .connect_timeout(timeout)
        .acquire_timeout(timeout)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    db.ping().await?;
    Ok(db)
}

/// Tries each candidate in order and returns the first that connects and
/// answers a ping, pausing `retry_delay` between attempts.
///
/// # Errors
/// Returns the last connection error when every candidate fails.
#[instrument(skip(candidates), fields(count = candidates.len()))]
pub async fn connect_with_fallback(
    candidates: &[ConnectionProfile],
    retry_delay: Duration,
    timeout: Duration,
) -> Result<(ConnectionProfile, DatabaseConnection)> {
    let mut last_error = None;

    for (attempt, candidate) in candidates.iter().enumerate() {
        if attempt > 0 && !retry_delay.is_zero() {
            tokio::time::sleep(retry_delay).await;
        }

        match connect(&candidate.url, timeout).await {
            Ok(db) => {
                info!(
                    profile = %candidate.name,
                    url = %candidate.masked_url(),
                    "Database connection established"
                );
                return Ok((candidate.clone(), db));
            }
            Err(e) => {
                warn!(profile = %candidate.name, error = %e, "Database candidate failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.map_or_else(
        || Error::Config {
            message: "No database connection candidates configured".to_string(),
        },
        Error::Database,
    ))
}

/// Connects to every candidate independently and reports which ones work.
pub async fn probe_candidates(
    candidates: &[ConnectionProfile],
    timeout: Duration,
) -> Vec<ProbeReport> {
    let mut reports = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let started = Instant::now();
        let outcome = connect(&candidate.url, timeout).await;
        reports.push(ProbeReport {
            name: candidate.name.clone(),
            masked_url: candidate.masked_url(),
            ok: outcome.is_ok(),
            latency_ms: started.elapsed().as_millis(),
            error: outcome.err().map(|e| e.to_string()),
        });
    }
    reports
}

/// Creates all tables with `SeaORM`'s schema generation from the entity definitions.
///
/// Tables that already exist are left untouched, so this runs on every startup.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut statements = vec![
        schema.create_table_from_entity(Merchant),
        schema.create_table_from_entity(Subscription),
        schema.create_table_from_entity(Conversation),
        schema.create_table_from_entity(Message),
        schema.create_table_from_entity(Admin),
    ];

    for statement in &mut statements {
        statement.if_not_exists();
        db.execute(builder.build(statement)).await?;
    }

    // One conversation per widget session
    let session_index = Index::create()
        .name("idx_conversations_merchant_session")
        .table(Conversation)
        .col(conversation::Column::MerchantId)
        .col(conversation::Column::SessionId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&session_index)).await?;

    Ok(())
}
