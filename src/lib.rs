//! Coding-mentor chat front-end.
//!
//! Wires the `mentor-core` conversation loop to:
//! - A Groq chat-completions client (`GroqClient`).
//! - TOML/env configuration with a fatal credential check (`AppConfig`).
//! - A terminal shell (`Repl`) and, behind the `server` feature, a web shell (`ChatServer`).

mod config;
mod llm;
mod repl;
#[cfg(feature = "server")]
mod server;
mod session;
mod telemetry;

pub use config::{
    AppConfig, LogFormat, MemoryConfig, ModelConfig, PromptConfig, ServerConfig, TelemetryConfig,
    API_KEY_VAR,
};
pub use llm::{GroqClient, GROQ_BASE_URL};
pub use mentor_core::*;
pub use repl::Repl;
#[cfg(feature = "server")]
pub use server::ChatServer;
pub use session::{SessionRegistry, SharedSession};
pub use telemetry::{env_filter, init_tracing};
