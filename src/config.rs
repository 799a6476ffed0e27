//! Configuration module for the evaluation API.
//!
//! Loads configuration from YAML files and environment variables.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub evaluators: EvaluatorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Require a bearer token on evaluation routes.
    pub enabled: bool,
    /// HMAC secret used to verify tokens.
    pub jwt_secret: String,
    /// Expected `iss` claim.
    pub jwt_issuer: String,
    /// Lifetime of issued tokens.
    #[serde(default = "default_token_duration_hours")]
    pub token_duration_hours: i64,
    /// Actor attached to requests when authentication is disabled.
    pub default_user_id: String,
    /// Project attached to requests when authentication is disabled.
    pub default_project_id: String,
}

/// Permission enforcement ("cloud mode").
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    /// Run per-action permission checks in every handler.
    #[serde(default)]
    pub enforce: bool,
}

/// Task queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Queue that evaluation jobs are published to.
    pub name: String,
}

/// Evaluator related settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluatorsConfig {
    /// Fallback OpenAI key for AI critique evaluators.
    #[serde(default)]
    pub openai_api_key: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (EVALS__*)
    /// 2. config/local.yaml (if exists)
    /// 3. config/default.yaml
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("EVALS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jwt_secret: "change-me".to_string(),
            jwt_issuer: "evaluation-api".to_string(),
            token_duration_hours: default_token_duration_hours(),
            default_user_id: "local-user".to_string(),
            default_project_id: "default".to_string(),
        }
    }
}

fn default_token_duration_hours() -> i64 {
    24
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "evaluations".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let auth = AuthConfig::default();
        assert!(!auth.enabled);
        assert_eq!(auth.default_project_id, "default");

        assert!(!AccessConfig::default().enforce);
        assert_eq!(QueueConfig::default().name, "evaluations");
        assert!(EvaluatorsConfig::default().openai_api_key.is_none());
        assert_eq!(LoggingConfig::default().format, LogFormat::Json);
    }

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = ConfigLoader::builder()
            .set_override("server.host", "127.0.0.1")
            .unwrap()
            .set_override("server.port", 8080)
            .unwrap()
            .set_override("database.url", "sqlite::memory:")
            .unwrap()
            .set_override("access.enforce", true)
            .unwrap()
            .set_override("logging.format", "pretty")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.access.enforce);
        assert_eq!(config.queue.name, "evaluations");
        assert!(!config.auth.enabled);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }
}
