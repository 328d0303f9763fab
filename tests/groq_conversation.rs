//! Config, Groq client and conversation wired together against a mock provider.

use std::sync::Arc;

use mentor_chat::{AppConfig, ChatError, ChatSession, Conversation, GroqClient};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn config_for(server: &MockServer) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.model.api_key = Some("gsk_integration".into());
    cfg.model.base_url = Some(server.uri());
    cfg.model.timeout_secs = 5;
    cfg
}

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": text}, "finish_reason": "stop"}]
    }))
}

#[tokio::test]
async fn second_request_carries_first_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("Ownership moves values."))
        .mount(&server)
        .await;

    let cfg = config_for(&server);
    let client = Arc::new(GroqClient::from_config(&cfg).unwrap());
    let conversation = Conversation::new(client).with_request_builder(cfg.request_builder());
    let mut session = ChatSession::new(cfg.session_settings().unwrap());

    conversation
        .predict(&mut session, "What is ownership?")
        .await
        .unwrap();
    conversation
        .predict(&mut session, "And borrowing?")
        .await
        .unwrap();

    let received: Vec<Request> = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);

    let first: Value = serde_json::from_slice(&received[0].body).unwrap();
    let second: Value = serde_json::from_slice(&received[1].body).unwrap();
    assert_eq!(first["model"], "mixtral-8x7b-32768");

    let first_prompt = first["messages"][0]["content"].as_str().unwrap();
    assert!(!first_prompt.contains("What is ownership?\nAI: "));

    let second_prompt = second["messages"][0]["content"].as_str().unwrap();
    assert!(second_prompt.contains("Human: What is ownership?\nAI: Ownership moves values."));
    assert!(second_prompt.ends_with("Human: And borrowing?\nAI:"));
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn provider_error_leaves_history_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("over capacity"))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = config_for(&server);
    let client = Arc::new(GroqClient::from_config(&cfg).unwrap());
    let conversation = Conversation::new(client);
    let mut session = ChatSession::new(cfg.session_settings().unwrap());

    let err = conversation.predict(&mut session, "Hello").await.unwrap_err();
    assert!(matches!(err, ChatError::LanguageModel(_)));
    assert!(session.history().is_empty());
}
