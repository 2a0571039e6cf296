use dotenvy::dotenv;
use merchant_bot::{
    api::{self, AppState},
    config::{
        Settings,
        database::{
            DEFAULT_DATABASE_URL, connect_with_fallback, connection_candidates, create_tables,
        },
        server::load_default_config,
    },
    errors::Result,
    llm::HttpLlmClient,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file (non-fatal, env vars can be set externally)
    if dotenv().is_ok() {
        info!("Loaded .env file");
    }

    // 3. Tunables from config.toml, secrets from the environment
    let server_config = load_default_config()?;
    let settings = Settings::from_env(server_config)
        .inspect_err(|e| error!("Invalid environment configuration: {}", e))?;

    // 4. Pick the first database connection string that answers
    if settings.database_url == DEFAULT_DATABASE_URL {
        std::fs::create_dir_all("data")?;
    }
    let candidates = connection_candidates(
        &settings.database_url,
        settings.database_pooler_url.as_deref(),
    );
    let db_tuning = &settings.server.database;
    let (active, db) = connect_with_fallback(
        &candidates,
        Duration::from_millis(db_tuning.connect_retry_delay_ms),
        Duration::from_secs(db_tuning.connect_timeout_secs),
    )
    .await
    .inspect_err(|e| error!("Failed to connect to any database candidate: {}", e))?;

    create_tables(&db)
        .await
        .inspect(|_| info!("Database tables ready"))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. LLM client and shared state
    let llm = HttpLlmClient::new(&settings.llm, &settings.server.llm)?;
    info!(models = ?settings.llm.candidate_models(), "LLM provider configured");

    let bind_address = settings.server.server.bind_address.clone();
    let state = AppState::new(db, settings, Arc::new(llm), active, candidates);

    // 6. Serve until Ctrl-C
    let listener = TcpListener::bind(&bind_address).await?;
    info!("Listening on {}", bind_address);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
