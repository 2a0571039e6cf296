/// Database connection candidates, fallback selection, and table creation
pub mod database;

/// Tunables loaded from config.toml
pub mod server;

/// Secrets and endpoints loaded from environment variables
pub mod settings;

pub use server::ServerConfig;
pub use settings::Settings;
