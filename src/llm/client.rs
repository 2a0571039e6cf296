//! OpenAI-compatible chat-completions client.

use crate::{
    config::{server::LlmTuning, settings::LlmSettings},
    errors::{Error, Result},
    llm::{ChatMessage, LlmProvider, ModelProbe},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// HTTP client for `POST {api_url}/chat/completions`.
///
/// `complete` walks the candidate models in order and returns the first
/// successful reply.
#[derive(Clone)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    models: Vec<String>,
    timeout: Duration,
    probe_timeout: Duration,
    max_tokens: u32,
    temperature: f32,
}

impl HttpLlmClient {
    pub fn new(settings: &LlmSettings, tuning: &LlmTuning) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("merchant-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            models: settings.candidate_models(),
            timeout: Duration::from_secs(tuning.timeout_secs),
            probe_timeout: Duration::from_secs(tuning.probe_timeout_secs),
            max_tokens: tuning.max_tokens,
            temperature: tuning.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_url)
    }

    async fn request(&self, body: &Value, timeout: Duration) -> Result<String> {
        let mut request = self.client.post(self.endpoint()).timeout(timeout).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                message: format!("HTTP {status}: {}", truncate(&text, 200)),
            });
        }

        let payload: Value = response.json().await?;
        extract_reply(&payload)
    }
}

/// Request body for one completion call.
pub fn build_request_body(
    model: &str,
    messages: &[ChatMessage],
    max_tokens: u32,
    temperature: f32,
) -> Value {
    json!({
        "model": model,
        "messages": messages,
        "max_tokens": max_tokens,
        "temperature": temperature,
    })
}

/// Pulls `choices[0].message.content` out of a completion response.
pub fn extract_reply(payload: &Value) -> Result<String> {
    if let Some(message) = payload["error"]["message"].as_str() {
        return Err(Error::Upstream {
            message: message.to_string(),
        });
    }

    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| Error::Upstream {
            message: "completion response had no content".to_string(),
        })
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl LlmProvider for HttpLlmClient {
    #[instrument(skip(self, messages), fields(turns = messages.len()))]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut last_error = Error::Upstream {
            message: "no LLM model configured".to_string(),
        };

        for model in &self.models {
            let body = build_request_body(model, messages, self.max_tokens, self.temperature);
            match self.request(&body, self.timeout).await {
                Ok(reply) => {
                    debug!(model = %model, "LLM replied");
                    return Ok(reply);
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "LLM request failed, trying next model");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    fn models(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn probe_model(&self, model: &str) -> ModelProbe {
        let body = build_request_body(model, &[ChatMessage::new("user", "ping")], 1, 0.0);
        let started = Instant::now();
        let result = self.request(&body, self.probe_timeout).await;
        let latency_ms = started.elapsed().as_millis();

        match result {
            Ok(_) => ModelProbe {
                model: model.to_string(),
                ok: true,
                latency_ms,
                error: None,
            },
            Err(e) => ModelProbe {
                model: model.to_string(),
                ok: false,
                latency_ms,
                error: Some(e.to_string()),
            },
        }
    }
}
