//! Environment-backed settings.
//!
//! Secrets, credentials, and endpoints come from the process environment
//! (populated from `.env` by `dotenvy` in `main`). Lookup goes through a
//! closure so tests can supply a map instead of mutating the environment.

use super::database::DEFAULT_DATABASE_URL;
use super::server::ServerConfig;
use crate::errors::{Error, Result};

const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Everything the service needs at runtime.
#[derive(Clone)]
pub struct Settings {
    pub database_url: String,
    /// False when `DATABASE_URL` was unset and the local `SQLite` default is used
    pub database_url_configured: bool,
    /// Explicit pooled connection string; derived from `database_url` when absent
    pub database_pooler_url: Option<String>,
    pub supabase: SupabaseKeys,
    /// Secret for merchant tokens
    pub jwt_secret: String,
    /// Separate secret for admin tokens
    pub admin_jwt_secret: String,
    pub admin: AdminCredentials,
    pub llm: LlmSettings,
    pub server: ServerConfig,
}

/// Supabase keys. Only their presence is reported by diagnostics.
#[derive(Clone, Default)]
pub struct SupabaseKeys {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
}

/// Admin configured through the environment rather than the `admins` table.
#[derive(Clone, Default)]
pub struct AdminCredentials {
    pub username: Option<String>,
    /// Plain password, used only when no hash is configured
    pub password: Option<String>,
    /// Argon2 PHC string
    pub password_hash: Option<String>,
}

/// External LLM provider endpoint.
#[derive(Clone)]
pub struct LlmSettings {
    /// Base URL of an OpenAI-compatible API
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Extra model names checked by the diagnostics probe
    pub fallback_models: Vec<String>,
}

impl LlmSettings {
    /// The primary model followed by the fallback models, without duplicates.
    #[must_use]
    pub fn candidate_models(&self) -> Vec<String> {
        let mut models = vec![self.model.clone()];
        for model in &self.fallback_models {
            if !models.contains(model) {
                models.push(model.clone());
            }
        }
        models
    }
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when a required secret is missing.
    pub fn from_env(server: ServerConfig) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), server)
    }

    /// Reads settings through an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F, server: ServerConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| Error::Config {
                message: format!("{key} must be set"),
            })
        };

        let fallback_models = get("LLM_FALLBACK_MODELS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let database_url = get("DATABASE_URL");

        Ok(Self {
            database_url_configured: database_url.is_some(),
            database_url: database_url.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            database_pooler_url: get("DATABASE_POOLER_URL"),
            supabase: SupabaseKeys {
                url: get("SUPABASE_URL"),
                anon_key: get("SUPABASE_ANON_KEY"),
                service_role_key: get("SUPABASE_SERVICE_ROLE_KEY"),
            },
            jwt_secret: require("JWT_SECRET")?,
            admin_jwt_secret: require("ADMIN_JWT_SECRET")?,
            admin: AdminCredentials {
                username: get("ADMIN_USERNAME"),
                password: get("ADMIN_PASSWORD"),
                password_hash: get("ADMIN_PASSWORD_HASH"),
            },
            llm: LlmSettings {
                api_url: get("LLM_API_URL").unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
                api_key: get("LLM_API_KEY"),
                model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
                fallback_models,
            },
            server,
        })
    }

    /// Names of the environment keys that are set, for diagnostics. Values are never reported.
    #[must_use]
    pub fn configured_keys(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("DATABASE_URL", self.database_url_configured),
            ("DATABASE_POOLER_URL", self.database_pooler_url.is_some()),
            ("SUPABASE_URL", self.supabase.url.is_some()),
            ("SUPABASE_ANON_KEY", self.supabase.anon_key.is_some()),
            (
                "SUPABASE_SERVICE_ROLE_KEY",
                self.supabase.service_role_key.is_some(),
            ),
            ("JWT_SECRET", true),
            ("ADMIN_JWT_SECRET", true),
            ("ADMIN_USERNAME", self.admin.username.is_some()),
            ("ADMIN_PASSWORD", self.admin.password.is_some()),
            ("ADMIN_PASSWORD_HASH", self.admin.password_hash.is_some()),
            ("LLM_API_KEY", self.llm.api_key.is_some()),
        ]
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_required_secrets() {
        let result = Settings::from_lookup(lookup_from(&[]), ServerConfig::default());
        assert!(matches!(result, Err(Error::Config { .. })));

        let result = Settings::from_lookup(
            lookup_from(&[("JWT_SECRET", "a"), ("ADMIN_JWT_SECRET", "  ")]),
            ServerConfig::default(),
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_defaults_and_fallback_models() {
        let settings = Settings::from_lookup(
            lookup_from(&[
                ("JWT_SECRET", "merchant-secret"),
                ("ADMIN_JWT_SECRET", "admin-secret"),
                ("LLM_MODEL", "deepseek-chat"),
                ("LLM_FALLBACK_MODELS", "gpt-4o-mini, deepseek-chat,,llama3"),
            ]),
            ServerConfig::default(),
        )
        .unwrap();

        assert_eq!(settings.database_url, DEFAULT_DATABASE_URL);
        assert!(!settings.database_url_configured);
        assert_eq!(settings.llm.api_url, DEFAULT_LLM_API_URL);
        assert!(settings.llm.api_key.is_none());
        assert_eq!(
            settings.llm.candidate_models(),
            vec!["deepseek-chat", "gpt-4o-mini", "llama3"]
        );
    }

    #[test]
    fn test_configured_keys_never_include_values() {
        let settings = Settings::from_lookup(
            lookup_from(&[
                ("JWT_SECRET", "merchant-secret"),
                ("ADMIN_JWT_SECRET", "admin-secret"),
                ("SUPABASE_URL", "https://project.supabase.co"),
            ]),
            ServerConfig::default(),
        )
        .unwrap();

        let keys: HashMap<_, _> = settings.configured_keys().into_iter().collect();
        assert!(keys["SUPABASE_URL"]);
        assert!(!keys["SUPABASE_ANON_KEY"]);
        assert!(!keys["LLM_API_KEY"]);
        assert!(!keys["DATABASE_URL"], "the SQLite default is not a configured key");
        assert!(keys["JWT_SECRET"]);
    }

    #[test]
    fn test_configured_database_url_is_reported() {
        let settings = Settings::from_lookup(
            lookup_from(&[
                ("JWT_SECRET", "merchant-secret"),
                ("ADMIN_JWT_SECRET", "admin-secret"),
                ("DATABASE_URL", "postgres://app:pw@db.example.com:5432/app"),
            ]),
            ServerConfig::default(),
        )
        .unwrap();

        let keys: HashMap<_, _> = settings.configured_keys().into_iter().collect();
        assert!(keys["DATABASE_URL"]);
    }
}
