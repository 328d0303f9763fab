use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};
use crate::history::ChatHistory;
use crate::memory::MemoryLength;

/// The model identifiers a user may pick from. The first entry is the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ModelCatalog {
    models: Vec<String>,
}

impl ModelCatalog {
    pub fn new(models: Vec<String>) -> Result<Self> {
        if models.is_empty() {
            return Err(ChatError::Config("model catalog is empty".into()));
        }
        Ok(Self { models })
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn default_model(&self) -> &str {
        &self.models[0]
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// Resolve a user choice to a catalog entry.
    pub fn select(&self, model: &str) -> Result<String> {
        if self.contains(model) {
            Ok(model.to_string())
        } else {
            Err(ChatError::Config(format!(
                "unknown model `{model}`; choose one of: {}",
                self.models.join(", ")
            )))
        }
    }
}

impl TryFrom<Vec<String>> for ModelCatalog {
    type Error = ChatError;

    fn try_from(models: Vec<String>) -> Result<Self> {
        Self::new(models)
    }
}

impl From<ModelCatalog> for Vec<String> {
    fn from(catalog: ModelCatalog) -> Self {
        catalog.models
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            models: vec!["mixtral-8x7b-32768".into(), "llama2-70b-4096".into()],
        }
    }
}

/// What the user picked for the next submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub model: String,
    pub memory_length: MemoryLength,
}

impl SessionSettings {
    pub fn new(model: impl Into<String>, memory_length: MemoryLength) -> Self {
        Self {
            model: model.into(),
            memory_length,
        }
    }

    pub fn for_catalog(catalog: &ModelCatalog) -> Self {
        Self::new(catalog.default_model(), MemoryLength::default())
    }
}

/// State owned by one user's interaction. Dropping it discards the history.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub settings: SessionSettings,
    history: ChatHistory,
}

impl ChatSession {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            history: ChatHistory::new(),
        }
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut ChatHistory {
        &mut self.history
    }

    pub fn set_model(&mut self, catalog: &ModelCatalog, model: &str) -> Result<()> {
        self.settings.model = catalog.select(model)?;
        Ok(())
    }

    pub fn set_memory_length(&mut self, k: usize) -> Result<()> {
        self.settings.memory_length = MemoryLength::new(k)?;
        Ok(())
    }
}
