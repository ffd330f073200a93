//! Completion-service client.
//!
//! The pipeline talks to the language model through [`CompletionClient`], a
//! narrow trait the tests replace with scripted doubles. The HTTP
//! implementation targets an OpenAI-compatible `/chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use helpline_core::config::LlmConfig;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

/// Classified completion failure. `ModelNotFound` is the one variant the
/// model-selection chain treats specially; everything else is a generic
/// remote failure the caller recovers from locally.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("model not found: {model}")]
    ModelNotFound { model: String },
    #[error("completion request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("completion service unavailable: {0}")]
    Unavailable(String),
    #[error("completion reply was malformed: {0}")]
    MalformedReply(String),
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// One completion round-trip against the named model.
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        user_message: &str,
        temperature: f64,
    ) -> Result<String, CompletionError>;
}

/// Ordered model candidates: the configured primary followed by its
/// fallbacks. Each candidate is tried in turn; any remote failure advances
/// to the next, and exhaustion surfaces the last error to the caller.
#[derive(Clone, Debug)]
pub struct ModelChain {
    models: Vec<String>,
}

impl ModelChain {
    pub fn new(primary: impl Into<String>, fallbacks: &[String]) -> Self {
        let primary = primary.into();
        let mut models = vec![primary.clone()];
        for fallback in fallbacks {
            if fallback != &primary && !models.contains(fallback) {
                models.push(fallback.clone());
            }
        }
        Self { models }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub async fn complete(
        &self,
        client: &dyn CompletionClient,
        system_prompt: &str,
        user_message: &str,
        temperature: f64,
    ) -> Result<String, CompletionError> {
        let mut last_error = None;

        for model in &self.models {
            match client.complete(model, system_prompt, user_message, temperature).await {
                Ok(reply) => return Ok(reply),
                Err(error) => {
                    debug!(
                        event_name = "llm.model_candidate_failed",
                        model = %model,
                        error = %error,
                        "model candidate failed, advancing"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| CompletionError::Unavailable("no models configured".to_string())))
    }
}

pub struct HttpCompletionClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct ChatCompletionReply {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpCompletionClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| CompletionError::Unavailable(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        user_message: &str,
        temperature: f64,
    ) -> Result<String, CompletionError> {
        let body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_message },
            ],
            "temperature": temperature,
            "max_tokens": 500,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                CompletionError::Timeout { timeout_secs: self.timeout_secs }
            } else {
                CompletionError::Unavailable(error.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_status(model, status, &body_text));
        }

        let reply: ChatCompletionReply = response
            .json()
            .await
            .map_err(|error| CompletionError::MalformedReply(error.to_string()))?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::MalformedReply("reply carried no content".to_string()))
    }
}

fn classify_status(model: &str, status: StatusCode, body: &str) -> CompletionError {
    let body_lower = body.to_lowercase();
    let names_missing_model = body_lower.contains("model")
        && (body_lower.contains("not found") || body_lower.contains("does not exist"));

    if status == StatusCode::NOT_FOUND || names_missing_model {
        warn!(
            event_name = "llm.model_not_found",
            model = %model,
            status = status.as_u16(),
            "completion service does not know this model"
        );
        return CompletionError::ModelNotFound { model: model.to_string() };
    }

    if status == StatusCode::REQUEST_TIMEOUT {
        return CompletionError::Timeout { timeout_secs: 0 };
    }

    CompletionError::Unavailable(format!("status {}: {}", status.as_u16(), truncate(body, 200)))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
