use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{ChatError, Result};
use crate::llm::LanguageModel;
use crate::memory::window;
use crate::prompt::RequestBuilder;
use crate::session::ChatSession;

/// Forwards user input to a model with the session's recent turns as context.
pub struct Conversation<M: LanguageModel> {
    model: Arc<M>,
    builder: RequestBuilder,
}

impl<M: LanguageModel> Conversation<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self {
            model,
            builder: RequestBuilder::default(),
        }
    }

    pub fn with_request_builder(mut self, builder: RequestBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Run one exchange. Blank input is ignored and returns `Ok(None)`.
    ///
    /// The turn is recorded only when the model produced an answer; on any
    /// error the session history is left as it was.
    pub async fn predict(&self, session: &mut ChatSession, input: &str) -> Result<Option<String>> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        let request = {
            let context = window(
                session.history().all(),
                session.settings.memory_length.get(),
            );
            debug!(
                model = %session.settings.model,
                window = context.len(),
                stored = session.history().len(),
                "dispatching chat request"
            );
            self.builder.build(&session.settings.model, &context, input)
        };

        let completion = match self.model.complete(&request).await {
            Ok(completion) => completion,
            Err(err) => {
                warn!(model = %request.model, error = %err, "chat request failed");
                return Err(err);
            }
        };

        if let Some(usage) = completion.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat request usage"
            );
        }

        let output = completion
            .content
            .ok_or_else(|| ChatError::LanguageModel("empty completion".into()))?;
        session.history_mut().record(input, output.clone());
        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Turn;
    use crate::llm::StubModel;
    use crate::memory::MemoryLength;
    use crate::message::{Message, Role};
    use crate::prompt::PromptStyle;
    use crate::session::{ModelCatalog, SessionSettings};

    fn session_with(k: usize) -> ChatSession {
        let settings = SessionSettings::new(
            ModelCatalog::default().default_model(),
            MemoryLength::new(k).unwrap(),
        );
        ChatSession::new(settings)
    }

    fn message_conversation(model: Arc<StubModel>) -> Conversation<StubModel> {
        Conversation::new(model).with_request_builder(RequestBuilder::new(PromptStyle::Messages))
    }

    #[tokio::test]
    async fn first_exchange_carries_no_context() {
        let model = StubModel::new(vec!["Hi".into()]);
        let conversation = message_conversation(model.clone());
        let mut session = session_with(5);

        let reply = conversation.predict(&mut session, "Hello").await.unwrap();

        assert_eq!(reply.as_deref(), Some("Hi"));
        assert_eq!(model.requests()[0].messages, vec![Message::user("Hello")]);
        assert_eq!(session.history().all(), &[Turn::new("Hello", "Hi")]);
    }

    #[tokio::test]
    async fn failure_records_nothing() {
        let model = StubModel::new(vec![
            "first".into(),
            r#"{"action":"fail","error":"503 from provider"}"#.into(),
        ]);
        let conversation = Conversation::new(model);
        let mut session = session_with(5);

        conversation.predict(&mut session, "one").await.unwrap();
        let err = conversation.predict(&mut session, "two").await.unwrap_err();

        assert!(matches!(err, ChatError::LanguageModel(_)));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().last().map(Turn::input), Some("one"));
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let model = StubModel::new(vec!["unused".into()]);
        let conversation = Conversation::new(model.clone());
        let mut session = session_with(5);

        assert_eq!(conversation.predict(&mut session, "   \n").await.unwrap(), None);
        assert!(model.requests().is_empty());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn input_is_trimmed_before_recording() {
        let model = StubModel::new(vec!["ok".into()]);
        let conversation = Conversation::new(model);
        let mut session = session_with(5);

        conversation.predict(&mut session, "  spaced  ").await.unwrap();
        assert_eq!(session.history().all()[0].input(), "spaced");
    }

    #[tokio::test]
    async fn window_follows_current_memory_length() {
        let replies: Vec<String> = (1..=9).map(|i| format!("a{i}")).collect();
        let model = StubModel::new(replies);
        let conversation = message_conversation(model.clone());
        let mut session = session_with(5);

        for i in 1..=8 {
            conversation
                .predict(&mut session, &format!("q{i}"))
                .await
                .unwrap();
        }
        session.set_memory_length(2).unwrap();
        conversation.predict(&mut session, "q9").await.unwrap();

        let last = model.requests().pop().unwrap();
        let replayed: Vec<&str> = last
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(replayed, vec!["q7", "q8", "q9"]);
        assert_eq!(session.history().len(), 9);
    }

    #[tokio::test]
    async fn request_uses_selected_model() {
        let model = StubModel::new(vec!["ok".into()]);
        let conversation = Conversation::new(model.clone());
        let catalog = ModelCatalog::default();
        let mut session = session_with(3);
        session.set_model(&catalog, "llama2-70b-4096").unwrap();

        conversation.predict(&mut session, "hi").await.unwrap();
        assert_eq!(model.requests()[0].model, "llama2-70b-4096");
    }
}
