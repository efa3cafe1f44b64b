//! Configuration management for the Conference Concierge.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (.concierge/config.yaml, or the path in `CONCIERGE_CONFIG`)
//! - Environment variables
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Default Llama Stack endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8321";

/// Model used when the server lists no models and none is configured.
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-3.2-3B-Instruct";

/// Conversation label every session is created under.
pub const DEFAULT_SESSION_LABEL: &str = "conference_chat";

/// Answer recorded when a turn produced neither deltas nor a final message.
pub const DEFAULT_FALLBACK_RESPONSE: &str = "I found some relevant sessions for you.";

/// System instructions given to the agent.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful conference concierge assistant.
When users ask about sessions, provide a friendly, conversational response (2-3 sentences).
Summarize what you found and highlight the most relevant information.
Keep it concise - detailed session information will be shown in a table.";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory searched for `.concierge/config.yaml`
    pub workspace: PathBuf,

    /// Optional explicit config file path
    pub config_file: Option<PathBuf>,

    /// Base URL of the Llama Stack server
    pub base_url: String,

    /// Model identifier; discovered from the server when unset
    pub model: Option<String>,

    /// Vector database identifier; first available when unset
    pub vector_db: Option<String>,

    /// System instructions for the agent
    pub instructions: String,

    /// Label sessions are created under
    pub session_label: String,

    /// Answer used when a turn yields no text
    pub fallback_response: String,

    /// Upper bound for one turn (dispatch plus streaming), in seconds
    pub turn_timeout_secs: u64,

    /// Timeout for non-streaming HTTP calls, in seconds
    pub request_timeout_secs: u64,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    server: Option<ServerSection>,
    agent: Option<AgentSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerSection {
    url: Option<String>,
    request_timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentSection {
    model: Option<String>,
    vector_db: Option<String>,
    instructions: Option<String>,
    session_label: Option<String>,
    fallback_response: Option<String>,
    turn_timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: None,
            vector_db: None,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            session_label: DEFAULT_SESSION_LABEL.to_string(),
            fallback_response: DEFAULT_FALLBACK_RESPONSE.to_string(),
            turn_timeout_secs: 60,
            request_timeout_secs: 30,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// Environment variables:
    /// - `CONCIERGE_WORKSPACE`: Directory containing `.concierge/`
    /// - `CONCIERGE_CONFIG`: Path to config file
    /// - `LLAMA_STACK_URL`: Server base URL
    /// - `CONCIERGE_MODEL`: Model identifier
    /// - `CONCIERGE_VECTOR_DB`: Vector database identifier
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("CONCIERGE_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("CONCIERGE_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        let config_path = config.config_path();
        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(url) = std::env::var("LLAMA_STACK_URL") {
            config.base_url = url;
        }

        if let Ok(model) = std::env::var("CONCIERGE_MODEL") {
            config.model = Some(model);
        }

        if let Ok(vector_db) = std::env::var("CONCIERGE_VECTOR_DB") {
            config.vector_db = Some(vector_db);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Path of the config file this configuration reads.
    pub fn config_path(&self) -> PathBuf {
        match self.config_file {
            Some(ref cf) => cf.clone(),
            None => self.workspace.join(".concierge/config.yaml"),
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(server) = config_file.server {
            if let Some(url) = server.url {
                result.base_url = url;
            }
            if let Some(timeout) = server.request_timeout {
                result.request_timeout_secs = timeout;
            }
        }

        if let Some(agent) = config_file.agent {
            if agent.model.is_some() {
                result.model = agent.model;
            }
            if agent.vector_db.is_some() {
                result.vector_db = agent.vector_db;
            }
            if let Some(instructions) = agent.instructions {
                result.instructions = instructions;
            }
            if let Some(label) = agent.session_label {
                result.session_label = label;
            }
            if let Some(fallback) = agent.fallback_response {
                result.fallback_response = fallback;
            }
            if let Some(timeout) = agent.turn_timeout {
                result.turn_timeout_secs = timeout;
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over the config file and environment.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        base_url: Option<String>,
        model: Option<String>,
        vector_db: Option<String>,
        turn_timeout_secs: Option<u64>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(base_url) = base_url {
            self.base_url = base_url;
        }

        if model.is_some() {
            self.model = model;
        }

        if vector_db.is_some() {
            self.vector_db = vector_db;
        }

        if let Some(timeout) = turn_timeout_secs {
            self.turn_timeout_secs = timeout;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Turn timeout as a `Duration`.
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration before connecting.
    pub fn validate(&self) -> AppResult<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(AppError::Config("Server URL must not be empty".to_string()));
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "Server URL must start with http:// or https://: {}",
                url
            )));
        }

        if self.session_label.trim().is_empty() {
            return Err(AppError::Config(
                "Session label must not be empty".to_string(),
            ));
        }

        if self.turn_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(AppError::Config(
                "Timeouts must be at least one second".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.session_label, "conference_chat");
        assert_eq!(config.turn_timeout_secs, 60);
        assert!(config.model.is_none());
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path_defaults_to_workspace() {
        let config = AppConfig::default();
        assert!(config.config_path().ends_with(".concierge/config.yaml"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(
            Some("http://rag.svc:8321".to_string()),
            Some("llama-model".to_string()),
            None,
            Some(5),
            None,
            true,
            false,
        );

        assert_eq!(config.base_url, "http://rag.svc:8321");
        assert_eq!(config.model.as_deref(), Some("llama-model"));
        assert!(config.vector_db.is_none());
        assert_eq!(config.turn_timeout(), Duration::from_secs(5));
        assert_eq!(config.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  url: http://lsd.rag.svc:8321
  requestTimeout: 10
agent:
  model: llama-model
  vectorDb: sessions
  sessionLabel: expo_chat
  turnTimeout: 90
logging:
  level: info
  color: false
"#
        )
        .unwrap();

        let config = AppConfig::default().merge_yaml(file.path()).unwrap();
        assert_eq!(config.base_url, "http://lsd.rag.svc:8321");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.model.as_deref(), Some("llama-model"));
        assert_eq!(config.vector_db.as_deref(), Some("sessions"));
        assert_eq!(config.session_label, "expo_chat");
        assert_eq!(config.turn_timeout_secs, 90);
        assert_eq!(config.log_level.as_deref(), Some("info"));
        assert!(config.no_color);
        assert_eq!(config.fallback_response, DEFAULT_FALLBACK_RESPONSE);
    }

    #[test]
    fn test_merge_yaml_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "server: [unclosed").unwrap();
        let result = AppConfig::default().merge_yaml(file.path());
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = AppConfig::default();
        config.base_url = "localhost:8321".to_string();
        assert!(config.validate().is_err());

        config.base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = AppConfig::default();
        config.turn_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
