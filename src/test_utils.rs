//! Shared test utilities for `merchant-bot`.
//!
//! This module provides common helper functions for setting up test databases,
//! creating test entities with sensible defaults, and stub LLM providers.

use crate::{
    api::AppState,
    config::{
        ServerConfig, Settings,
        database::ConnectionProfile,
        settings::{AdminCredentials, LlmSettings, SupabaseKeys},
    },
    core::{auth, plan::get_message_limit_by_plan},
    entities::{merchant, subscription},
    errors::{Error, Result},
    llm::{ChatMessage, LlmProvider, ModelProbe},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::{Arc, LazyLock, Mutex};
use uuid::Uuid;

/// Password every test merchant is created with.
pub const TEST_PASSWORD: &str = "test-password-123";

// Hashing is slow in debug builds, so test merchants share one hash.
#[allow(clippy::expect_used)]
static TEST_PASSWORD_HASH: LazyLock<String> =
    LazyLock::new(|| auth::hash_password(TEST_PASSWORD).expect("hash test password"));

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// An unsaved merchant with sensible defaults.
///
/// # Defaults
/// * `business_name`: "Corner Bakery"
/// * `bot_name`: "Sara"
/// * `phone`, `custom_instructions`: None
pub fn merchant_fixture() -> merchant::Model {
    let now = Utc::now();
    merchant::Model {
        id: Uuid::new_v4().to_string(),
        email: "fixture@example.com".to_string(),
        password_hash: TEST_PASSWORD_HASH.clone(),
        business_name: "Corner Bakery".to_string(),
        phone: None,
        chatbot_id: format!("bot_{}", &Uuid::new_v4().simple().to_string()[..16]),
        bot_name: "Sara".to_string(),
        welcome_message: "Welcome to Corner Bakery!".to_string(),
        primary_color: "#4F46E5".to_string(),
        custom_instructions: None,
        created_at: now,
        updated_at: now,
    }
}

/// Inserts a merchant without a subscription. Its password is [`TEST_PASSWORD`].
pub async fn create_test_merchant(db: &DatabaseConnection, email: &str) -> Result<merchant::Model> {
    let merchant = merchant::Model {
        email: email.to_string(),
        ..merchant_fixture()
    };
    let active: merchant::ActiveModel = merchant.into();
    Ok(active.reset_all().insert(db).await?)
}

/// Inserts a subscription with explicit plan, status, counter, and last reset.
///
/// # Defaults
/// * `messages_limit`: the plan's ceiling
/// * `end_date`: None
pub async fn create_custom_subscription(
    db: &DatabaseConnection,
    merchant_id: &str,
    plan: &str,
    status: &str,
    messages_used: i32,
    last_reset: Option<DateTime<Utc>>,
) -> Result<subscription::Model> {
    let now = Utc::now();
    let subscription = subscription::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        merchant_id: Set(merchant_id.to_string()),
        plan: Set(plan.to_string()),
        status: Set(status.to_string()),
        messages_used: Set(messages_used),
        messages_limit: Set(get_message_limit_by_plan(plan)),
        last_reset: Set(last_reset),
        start_date: Set(now),
        end_date: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(subscription.insert(db).await?)
}

/// An unsaved BASIC subscription (limit 1000, nothing used) for pure-function tests.
pub fn subscription_fixture(
    status: &str,
    last_reset: Option<DateTime<Utc>>,
) -> subscription::Model {
    let now = Utc::now();
    subscription::Model {
        id: "sub-fixture".to_string(),
        merchant_id: "merchant-fixture".to_string(),
        plan: "BASIC".to_string(),
        status: status.to_string(),
        messages_used: 0,
        messages_limit: 1000,
        last_reset,
        start_date: now,
        end_date: None,
        created_at: now,
        updated_at: now,
    }
}

/// Settings with fixed secrets and no environment admin.
pub fn test_settings() -> Settings {
    Settings {
        database_url: "sqlite::memory:".to_string(),
        database_url_configured: true,
        database_pooler_url: None,
        supabase: SupabaseKeys::default(),
        jwt_secret: "test-merchant-secret".to_string(),
        admin_jwt_secret: "test-admin-secret".to_string(),
        admin: AdminCredentials::default(),
        llm: LlmSettings {
            api_url: "http://127.0.0.1:9/v1".to_string(),
            api_key: None,
            model: "stub-model".to_string(),
            fallback_models: vec!["stub-backup".to_string()],
        },
        server: ServerConfig::default(),
    }
}

/// LLM stub that always answers with the same text and remembers the last prompt.
pub struct StaticLlm {
    reply: String,
    last_prompt: Mutex<Vec<ChatMessage>>,
}

impl StaticLlm {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            last_prompt: Mutex::new(Vec::new()),
        }
    }

    #[allow(clippy::unwrap_used)]
    pub fn last_prompt(&self) -> Vec<ChatMessage> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for StaticLlm {
    #[allow(clippy::unwrap_used)]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        *self.last_prompt.lock().unwrap() = messages.to_vec();
        Ok(self.reply.clone())
    }

    fn models(&self) -> Vec<String> {
        vec!["stub-model".to_string(), "stub-backup".to_string()]
    }

    async fn probe_model(&self, model: &str) -> ModelProbe {
        ModelProbe {
            model: model.to_string(),
            ok: true,
            latency_ms: 0,
            error: None,
        }
    }
}

/// LLM stub that always fails, as if the provider timed out.
pub struct FailingLlm;

#[async_trait]
impl LlmProvider for FailingLlm {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(Error::Upstream {
            message: "request timed out".to_string(),
        })
    }

    fn models(&self) -> Vec<String> {
        vec!["stub-model".to_string()]
    }

    async fn probe_model(&self, model: &str) -> ModelProbe {
        ModelProbe {
            model: model.to_string(),
            ok: false,
            latency_ms: 0,
            error: Some("request timed out".to_string()),
        }
    }
}

/// HTTP state over a fresh in-memory database and the given LLM.
pub async fn test_state(llm: Arc<dyn LlmProvider>) -> Result<AppState> {
    let db = setup_test_db().await?;
    let settings = test_settings();
    let profile = ConnectionProfile::new("direct", settings.database_url.clone());
    Ok(AppState::new(db, settings, llm, profile.clone(), vec![profile]))
}
