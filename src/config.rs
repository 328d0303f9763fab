use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use mentor_core::{
    ChatError, MemoryLength, ModelCatalog, PromptStyle, RequestBuilder, Result, SessionSettings,
    DEFAULT_PREAMBLE,
};

/// Environment variable holding the provider credential.
pub const API_KEY_VAR: &str = "GROQ_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Web sessions untouched for this long are ended by the idle sweep.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8501
}

fn default_session_idle_secs() -> u64 {
    1800
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            default_model: None,
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_models() -> Vec<String> {
    ModelCatalog::default().models().to_vec()
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MemoryConfig {
    #[serde(default)]
    pub default_length: MemoryLength,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptConfig {
    #[serde(default)]
    pub style: PromptStyle,
    #[serde(default = "default_preamble")]
    pub preamble: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_human_prefix")]
    pub human_prefix: String,
    #[serde(default = "default_ai_prefix")]
    pub ai_prefix: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            style: PromptStyle::default(),
            preamble: default_preamble(),
            system_prompt: None,
            human_prefix: default_human_prefix(),
            ai_prefix: default_ai_prefix(),
        }
    }
}

fn default_preamble() -> String {
    DEFAULT_PREAMBLE.into()
}

fn default_human_prefix() -> String {
    "Human".into()
}

fn default_ai_prefix() -> String {
    "AI".into()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&raw)
            .map_err(|err| ChatError::Config(format!("Failed to parse configuration: {err}")))?;
        Ok(cfg)
    }

    /// Load `path` when given (or a missing default path is tolerated), then
    /// apply environment overrides and validate.
    pub fn load(path: Option<&Path>, required: bool) -> Result<Self> {
        let mut cfg = match path {
            Some(path) if required || path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Ok(host) = env::var("MENTOR_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("MENTOR_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                self.server.port = parsed;
            }
        }
        if let Ok(idle) = env::var("MENTOR_SESSION_IDLE_SECS") {
            if let Ok(parsed) = idle.parse::<u64>() {
                self.server.session_idle_secs = parsed;
            }
        }
        if let Ok(model) = env::var("MENTOR_MODEL") {
            self.model.default_model = Some(model);
        }
        if let Ok(base_url) = env::var("MENTOR_BASE_URL") {
            self.model.base_url = Some(base_url);
        }
        if let Ok(length) = env::var("MENTOR_MEMORY_LENGTH") {
            if let Some(parsed) = length
                .parse::<usize>()
                .ok()
                .and_then(|k| MemoryLength::new(k).ok())
            {
                self.memory.default_length = parsed;
            }
        }
        if let Ok(format) = env::var("MENTOR_LOG_FORMAT") {
            self.telemetry.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            };
        }
        if let Ok(key) = env::var(API_KEY_VAR) {
            if !key.trim().is_empty() {
                self.model.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.session_idle_secs == 0 {
            return Err(ChatError::Config(
                "server.session_idle_secs must be greater than zero".into(),
            ));
        }
        let catalog = self.catalog()?;
        if let Some(model) = &self.model.default_model {
            catalog.select(model)?;
        }
        Ok(())
    }

    /// Catalog ordered so the configured default model comes first.
    pub fn catalog(&self) -> Result<ModelCatalog> {
        let mut models = self.model.models.clone();
        if let Some(default) = &self.model.default_model {
            if let Some(pos) = models.iter().position(|m| m == default) {
                let chosen = models.remove(pos);
                models.insert(0, chosen);
            }
        }
        ModelCatalog::new(models)
    }

    pub fn session_settings(&self) -> Result<SessionSettings> {
        let catalog = self.catalog()?;
        Ok(SessionSettings::new(
            catalog.default_model(),
            self.memory.default_length,
        ))
    }

    pub fn request_builder(&self) -> RequestBuilder {
        let mut builder = RequestBuilder::new(self.prompt.style)
            .with_preamble(self.prompt.preamble.clone())
            .with_prefixes(self.prompt.human_prefix.clone(), self.prompt.ai_prefix.clone());
        if let Some(system) = &self.prompt.system_prompt {
            builder = builder.with_system_prompt(system.clone());
        }
        builder
    }

    /// The provider credential. Its absence is fatal at startup.
    pub fn api_key(&self) -> Result<&str> {
        self.model
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ChatError::Config(format!(
                    "{API_KEY_VAR} is missing. Set it in the environment or in the [model] section of the config file."
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Overrides that `load` would otherwise pick up from the caller's shell.
    fn clear_overrides() {
        for var in [
            "MENTOR_HOST",
            "MENTOR_MODEL",
            "MENTOR_MEMORY_LENGTH",
            "MENTOR_BASE_URL",
            "MENTOR_SESSION_IDLE_SECS",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn defaults_cover_model_and_memory_choices() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.memory.default_length.get(), 5);
        assert_eq!(
            cfg.catalog().unwrap().models(),
            &["mixtral-8x7b-32768".to_string(), "llama2-70b-4096".to_string()]
        );
        assert_eq!(cfg.prompt.style, PromptStyle::Transcript);
        assert_eq!(cfg.model.timeout_secs, 120);
        assert_eq!(cfg.server.session_idle_secs, 1800);
    }

    #[test]
    fn loads_file_and_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nhost='0.0.0.0'\nport=9000\nsession_idle_secs=60\n[model]\nmodels=['a','b','c']\ndefault_model='a'\n[memory]\ndefault_length=3\n[prompt]\nstyle='messages'"
        )
        .unwrap();

        clear_overrides();
        env::set_var("MENTOR_PORT", "9100");
        let cfg = AppConfig::load(Some(file.path()), true).unwrap();
        env::remove_var("MENTOR_PORT");

        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.session_idle_secs, 60);
        assert_eq!(cfg.memory.default_length.get(), 3);
        assert_eq!(cfg.prompt.style, PromptStyle::Messages);
        assert_eq!(cfg.session_settings().unwrap().model, "a");
    }

    #[test]
    fn file_default_model_survives_foreign_shell_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[model]\nmodels=['a','b']\ndefault_model='b'").unwrap();

        clear_overrides();
        let cfg = AppConfig::load(Some(file.path()), true).unwrap();
        assert_eq!(cfg.catalog().unwrap().default_model(), "b");
    }

    #[test]
    fn rejects_zero_idle_timeout() {
        let mut cfg = AppConfig::default();
        cfg.server.session_idle_secs = 0;
        assert!(matches!(cfg.validate(), Err(ChatError::Config(_))));
    }

    #[test]
    fn default_model_is_moved_to_front() {
        let mut cfg = AppConfig::default();
        cfg.model.default_model = Some("llama2-70b-4096".into());
        assert_eq!(cfg.catalog().unwrap().default_model(), "llama2-70b-4096");
        assert_eq!(cfg.catalog().unwrap().models().len(), 2);
    }

    #[test]
    fn rejects_out_of_range_memory_length() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[memory]\ndefault_length=11").unwrap();
        assert!(AppConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn rejects_default_model_outside_catalog() {
        let mut cfg = AppConfig::default();
        cfg.model.default_model = Some("gpt-unknown".into());
        assert!(matches!(cfg.validate(), Err(ChatError::Config(_))));
    }

    #[test]
    fn missing_optional_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("mentor.toml");
        clear_overrides();
        assert!(AppConfig::load(Some(&missing), false).is_ok());
        assert!(AppConfig::load(Some(&missing), true).is_err());
    }

    #[test]
    fn missing_credential_is_a_config_error() {
        let cfg = AppConfig::default();
        let err = cfg.api_key().unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
        assert!(err.to_string().contains(API_KEY_VAR));

        let mut cfg = AppConfig::default();
        cfg.model.api_key = Some("   ".into());
        assert!(cfg.api_key().is_err());

        cfg.model.api_key = Some("gsk_test".into());
        assert_eq!(cfg.api_key().unwrap(), "gsk_test");
    }
}
