use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};
use crate::prompt::ChatRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result of a chat completion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelCompletion {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl ModelCompletion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// Minimal abstraction around a chat completion provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelCompletion>;
}

/// A deterministic model used for tests and demos.
///
/// Each call pops the next scripted reply. A reply is either plain text or a
/// JSON directive such as `{"action":"fail","error":"boom"}`.
#[derive(Debug)]
pub struct StubModel {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .map(|responses| responses.len())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum StubDirective {
    Respond { content: String },
    Fail { error: String },
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelCompletion> {
        self.requests
            .lock()
            .map_err(|_| ChatError::LanguageModel("stub model poisoned".into()))?
            .push(request.clone());

        let raw = self
            .responses
            .lock()
            .map_err(|_| ChatError::LanguageModel("stub model poisoned".into()))?
            .pop_front()
            .ok_or_else(|| {
                ChatError::LanguageModel("StubModel ran out of scripted responses".into())
            })?;

        match serde_json::from_str::<StubDirective>(&raw) {
            Ok(StubDirective::Respond { content }) => Ok(ModelCompletion::text(content)),
            Ok(StubDirective::Fail { error }) => Err(ChatError::LanguageModel(error)),
            Err(_) => Ok(ModelCompletion::text(raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn request(text: &str) -> ChatRequest {
        ChatRequest {
            model: "stub".into(),
            messages: vec![Message::user(text)],
        }
    }

    #[tokio::test]
    async fn replays_script_and_records_requests() {
        let model = StubModel::new(vec![
            "plain reply".into(),
            r#"{"action":"respond","content":"directive reply"}"#.into(),
        ]);

        let first = model.complete(&request("one")).await.unwrap();
        let second = model.complete(&request("two")).await.unwrap();

        assert_eq!(first.content.as_deref(), Some("plain reply"));
        assert_eq!(second.content.as_deref(), Some("directive reply"));
        assert_eq!(model.requests().len(), 2);
        assert_eq!(model.requests()[1].messages[0].content, "two");
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn fail_directive_and_exhaustion_are_errors() {
        let model = StubModel::new(vec![r#"{"action":"fail","error":"provider down"}"#.into()]);

        let err = model.complete(&request("x")).await.unwrap_err();
        assert!(err.to_string().contains("provider down"));

        let err = model.complete(&request("y")).await.unwrap_err();
        assert!(err.to_string().contains("ran out"));
    }
}
