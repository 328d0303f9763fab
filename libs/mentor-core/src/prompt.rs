//! Turns a memory window plus the new input into a provider request.

use serde::{Deserialize, Serialize};

use crate::memory::MemoryWindow;
use crate::message::Message;

pub const DEFAULT_PREAMBLE: &str = "The following is a friendly conversation between a human and an AI. \
The AI is talkative and provides lots of specific details from its context. \
If the AI does not know the answer to a question, it truthfully says it does not know.";

/// Everything a provider needs to answer one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyle {
    /// A single user message carrying a `Human:`/`AI:` transcript.
    #[default]
    Transcript,
    /// Native chat roles, one message per side of each turn.
    Messages,
}

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    style: PromptStyle,
    preamble: String,
    system_prompt: Option<String>,
    human_prefix: String,
    ai_prefix: String,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            style: PromptStyle::default(),
            preamble: DEFAULT_PREAMBLE.to_string(),
            system_prompt: None,
            human_prefix: "Human".to_string(),
            ai_prefix: "AI".to_string(),
        }
    }
}

impl RequestBuilder {
    pub fn new(style: PromptStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_prefixes(mut self, human: impl Into<String>, ai: impl Into<String>) -> Self {
        self.human_prefix = human.into();
        self.ai_prefix = ai.into();
        self
    }

    pub fn build(&self, model: &str, window: &MemoryWindow<'_>, input: &str) -> ChatRequest {
        let messages = match self.style {
            PromptStyle::Transcript => vec![Message::user(self.render_transcript(window, input))],
            PromptStyle::Messages => {
                let mut messages = Vec::with_capacity(window.len() * 2 + 2);
                if let Some(system) = &self.system_prompt {
                    messages.push(Message::system(system.clone()));
                }
                messages.extend(window.to_messages());
                messages.push(Message::user(input));
                messages
            }
        };
        ChatRequest {
            model: model.to_string(),
            messages,
        }
    }

    fn render_transcript(&self, window: &MemoryWindow<'_>, input: &str) -> String {
        let history = window.buffer_string(&self.human_prefix, &self.ai_prefix);
        format!(
            "{}\n\nCurrent conversation:\n{}\n{}: {}\n{}:",
            self.preamble, history, self.human_prefix, input, self.ai_prefix
        )
    }
}
