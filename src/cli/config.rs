// Server Configuration Module
// Handles configuration from YAML files.

use crate::generator::DEFAULT_OUTPUT_TOKENS;
use crate::registry::ModelProfile;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Render the effective configuration as YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check everything the server needs before it starts serving
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Validation(
                "at least one model must be configured".to_string(),
            ));
        }
        for model in &self.models {
            if model.name.is_empty() {
                return Err(ConfigError::Validation("model name is empty".to_string()));
            }
            if model.ttft.min > model.ttft.max {
                return Err(ConfigError::Validation(format!(
                    "model '{}': ttft.min ({}) is greater than ttft.max ({})",
                    model.name, model.ttft.min, model.ttft.max
                )));
            }
            if model.max_context_tokens == 0 || model.max_output_tokens == 0 {
                return Err(ConfigError::Validation(format!(
                    "model '{}': token limits must be positive",
                    model.name
                )));
            }
        }
        if self.common.tokens_file.is_empty() {
            return Err(ConfigError::Validation(
                "common.tokens_file is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Model profiles in configuration order
    pub fn model_profiles(&self) -> Vec<ModelProfile> {
        self.models.iter().map(ModelConfig::to_profile).collect()
    }
}

/// Server network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Seconds allowed for reading a request body (0 disables)
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    /// Seconds allowed for producing a whole response (0 disables)
    #[serde(default = "default_write_timeout")]
    pub write_timeout: u64,
    /// Expose `/debug/stats`
    #[serde(default)]
    pub stats_enabled: bool,
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout > 0).then(|| Duration::from_secs(self.read_timeout))
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout > 0).then(|| Duration::from_secs(self.write_timeout))
    }
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_read_timeout() -> u64 {
    60
}

fn default_write_timeout() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            read_timeout: default_read_timeout(),
            write_timeout: default_write_timeout(),
            stats_enabled: false,
        }
    }
}

/// Settings shared by every model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonConfig {
    /// Corpus JSON file produced by `llm-mock split`
    #[serde(default = "default_tokens_file")]
    pub tokens_file: String,
    /// Output budget used when the request leaves none
    #[serde(default = "default_output_tokens")]
    pub default_output_tokens: u32,
}

fn default_tokens_file() -> String {
    "tokens.json".to_string()
}

fn default_output_tokens() -> u32 {
    DEFAULT_OUTPUT_TOKENS
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            tokens_file: default_tokens_file(),
            default_output_tokens: default_output_tokens(),
        }
    }
}

/// Time-to-first-token range in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtftConfig {
    pub min: u64,
    pub max: u64,
}

/// One simulated model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub max_context_tokens: u32,
    pub max_output_tokens: u32,
    pub ttft: TtftConfig,
    /// Output tokens per second
    pub otps: u32,
}

impl ModelConfig {
    pub fn to_profile(&self) -> ModelProfile {
        ModelProfile {
            name: self.name.clone(),
            max_context_tokens: self.max_context_tokens,
            max_output_tokens: self.max_output_tokens,
            ttft_min_ms: self.ttft.min,
            ttft_max_ms: self.ttft.max,
            output_tokens_per_second: self.otps,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(String),
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server:
  port: 9000
  host: "127.0.0.1"
  read_timeout: 10
  write_timeout: 0

common:
  tokens_file: "data/tokens.json"

models:
  - name: qwen-72b
    max_context_tokens: 32768
    max_output_tokens: 4096
    ttft:
      min: 200
      max: 800
    otps: 40
  - name: llama-8b
    max_context_tokens: 8192
    max_output_tokens: 1024
    ttft:
      min: 50
      max: 100
    otps: 120
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.read_timeout(), Some(Duration::from_secs(60)));
        assert!(!config.server.stats_enabled);
        assert_eq!(config.common.tokens_file, "tokens.json");
        assert_eq!(config.common.default_output_tokens, 50);
        assert!(config.models.is_empty());
    }

    #[test]
    fn test_parse_yaml() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.read_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.server.write_timeout(), None);
        assert_eq!(config.common.tokens_file, "data/tokens.json");
        assert_eq!(config.models.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_profiles() {
        let profiles = Config::from_yaml(SAMPLE).unwrap().model_profiles();
        assert_eq!(
            profiles[0],
            ModelProfile {
                name: "qwen-72b".to_string(),
                max_context_tokens: 32768,
                max_output_tokens: 4096,
                ttft_min_ms: 200,
                ttft_max_ms: 800,
                output_tokens_per_second: 40,
            }
        );
        assert_eq!(profiles[1].name, "llama-8b");
    }

    #[test]
    fn test_validate_empty_models() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_validate_ttft_range() {
        let yaml = r#"
models:
  - name: broken
    max_context_tokens: 100
    max_output_tokens: 10
    ttft: { min: 500, max: 100 }
    otps: 10
"#;
        let err = Config::from_yaml(yaml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("ttft.min"));
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_yaml("models: [ { name: x } ]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_yaml_round_trip_for_logging() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        let rendered = config.to_yaml().unwrap();
        assert!(rendered.contains("qwen-72b"));
        assert!(rendered.contains("tokens_file: data/tokens.json"));
    }
}
