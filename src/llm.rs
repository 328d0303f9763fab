//! Provider clients implementing [`LanguageModel`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mentor_core::{ChatError, ChatRequest, LanguageModel, ModelCompletion, Result, TokenUsage};

use crate::config::AppConfig;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> ChatError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return ChatError::LanguageModel(format!("{provider} rate limit exceeded: {body}"));
    }
    ChatError::LanguageModel(format!("{provider} request failed with {}: {body}", status))
}

// ─────────────────────────────────────────────────────────────────────────────
// Groq Client (OpenAI-compatible API)
// ─────────────────────────────────────────────────────────────────────────────

/// Groq client speaking the OpenAI-compatible chat completions API.
///
/// The model is taken from each [`ChatRequest`], so one client serves every
/// entry of the model catalog.
#[derive(Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GroqClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, Duration::from_secs(120))
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|err| ChatError::LanguageModel(format!("http client error: {err}")))?,
            api_key: api_key.into(),
            base_url: GROQ_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let client = Self::with_timeout(
            cfg.api_key()?,
            Duration::from_secs(cfg.model.timeout_secs),
        )?;
        Ok(match &cfg.model.base_url {
            Some(base_url) => client.with_base_url(base_url.clone()),
            None => client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LanguageModel for GroqClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelCompletion> {
        let body = OpenAiRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: false,
        };

        debug!(model = %request.model, messages = body.messages.len(), "sending Groq request");
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::LanguageModel(format!("Groq request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "Groq"));
        }

        let parsed: OpenAiResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::LanguageModel(format!("Groq parse error: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::LanguageModel("Groq returned no choices".into()))?;

        Ok(ModelCompletion {
            content: choice.message.content,
            finish_reason: choice.finish_reason,
            usage: parsed.usage,
        })
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
