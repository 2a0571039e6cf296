//! External LLM access.
//!
//! [`LlmProvider`] is the seam between the chat flow and the completion API;
//! [`HttpLlmClient`] talks to any OpenAI-compatible endpoint, and tests swap
//! in stubs.

pub mod client;
pub mod fallback;

pub use client::HttpLlmClient;
pub use fallback::{contains_arabic, fallback_greeting};

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One turn of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"system"`, `"user"`, or `"assistant"`
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Outcome of probing a single model name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProbe {
    pub model: String,
    pub ok: bool,
    pub latency_ms: u128,
    pub error: Option<String>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Produces the assistant's reply to a conversation.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Model names this provider would try, primary first.
    fn models(&self) -> Vec<String>;

    /// Sends a minimal request to one model and reports whether it answered.
    async fn probe_model(&self, model: &str) -> ModelProbe;
}

/// Probes every configured model in order.
pub async fn probe_models(provider: &dyn LlmProvider) -> Vec<ModelProbe> {
    let mut reports = Vec::new();
    for model in provider.models() {
        reports.push(provider.probe_model(&model).await);
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticLlm;

    #[tokio::test]
    async fn test_probe_models_covers_every_model() {
        let llm = StaticLlm::new("hi");
        let reports = probe_models(&llm).await;
        let names: Vec<&str> = reports.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(names, vec!["stub-model", "stub-backup"]);
        assert!(reports.iter().all(|r| r.ok));
    }
}
