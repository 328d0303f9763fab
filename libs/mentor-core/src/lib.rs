//! Core pieces of a chat front-end with a bounded conversational memory.
//!
//! The crate provides:
//! - An append-only `ChatHistory` of completed `Turn`s.
//! - A pure `window` projection of the last *k* turns.
//! - A `RequestBuilder` that merges the window with new input.
//! - A `LanguageModel` abstraction and a `Conversation` that ties them together.

mod conversation;
mod error;
mod history;
mod llm;
mod memory;
mod message;
mod prompt;
mod session;

pub use conversation::Conversation;
pub use error::{ChatError, Result};
pub use history::{ChatHistory, Turn};
pub use llm::{LanguageModel, ModelCompletion, StubModel, TokenUsage};
pub use memory::{window, MemoryLength, MemoryWindow};
pub use message::{Message, Role};
pub use prompt::{ChatRequest, PromptStyle, RequestBuilder, DEFAULT_PREAMBLE};
pub use session::{ChatSession, ModelCatalog, SessionSettings};
