use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};
use crate::history::Turn;
use crate::message::Message;

/// How many past turns are replayed into the next request.
///
/// Only values in `MIN..=MAX` can be constructed; the window itself accepts any
/// `usize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct MemoryLength(usize);

impl MemoryLength {
    pub const MIN: usize = 1;
    pub const MAX: usize = 10;
    pub const DEFAULT: usize = 5;

    pub fn new(k: usize) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&k) {
            return Err(ChatError::Config(format!(
                "memory length must be between {} and {}, got {k}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(k))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for MemoryLength {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<usize> for MemoryLength {
    type Error = ChatError;

    fn try_from(value: usize) -> Result<Self> {
        Self::new(value)
    }
}

impl From<MemoryLength> for usize {
    fn from(value: MemoryLength) -> Self {
        value.0
    }
}

impl fmt::Display for MemoryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The most recent turns of a history, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWindow<'a> {
    turns: &'a [Turn],
}

/// Project the last `k` turns out of `turns`.
pub fn window(turns: &[Turn], k: usize) -> MemoryWindow<'_> {
    let start = turns.len().saturating_sub(k);
    MemoryWindow {
        turns: &turns[start..],
    }
}

impl<'a> MemoryWindow<'a> {
    pub fn empty() -> Self {
        Self { turns: &[] }
    }

    pub fn turns(&self) -> &'a [Turn] {
        self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Alternating user/assistant messages for chat-style prompts.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() * 2);
        for turn in self.turns {
            messages.push(Message::user(turn.input()));
            messages.push(Message::assistant(turn.output()));
        }
        messages
    }

    /// Render as `Human: ...` / `AI: ...` transcript lines.
    pub fn buffer_string(&self, human_prefix: &str, ai_prefix: &str) -> String {
        let mut lines = Vec::with_capacity(self.turns.len() * 2);
        for turn in self.turns {
            lines.push(format!("{human_prefix}: {}", turn.input()));
            lines.push(format!("{ai_prefix}: {}", turn.output()));
        }
        lines.join("\n")
    }
}
