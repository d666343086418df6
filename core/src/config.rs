//! Configuration Management Module
//!
//! Layers built-in defaults, an optional TOML file and `MODELGATE__*`
//! environment variables into a single `GateConfig`.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::service::TaskRetention;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "modelgate.toml";
/// Prefix for environment overrides, e.g. `MODELGATE__SERVER__PORT`
pub const ENV_PREFIX: &str = "MODELGATE";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub server: ServerSettings,
    pub model: ModelSettings,
    pub auth: AuthSettings,
    pub logging: LoggingSettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Model artifact and retrain settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Fixed location of the single persisted artifact
    pub artifact_path: PathBuf,
    /// Dataset handed to the trainer on retrain
    pub dataset_path: Option<PathBuf>,
    /// How long shutdown waits for in-flight retrains
    pub shutdown_timeout_secs: u64,
    /// How long a finished retrain status stays queryable
    pub task_ttl_secs: u64,
    /// Most finished retrain statuses kept at once
    pub max_finished_tasks: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("saved_model/model.json"),
            dataset_path: None,
            shutdown_timeout_secs: 10,
            task_ttl_secs: 3600,
            max_finished_tasks: 1024,
        }
    }
}

impl ModelSettings {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn task_retention(&self) -> TaskRetention {
        TaskRetention {
            ttl: Duration::from_secs(self.task_ttl_secs),
            max_finished: self.max_finished_tasks,
        }
    }
}

/// A bearer token accepted by the static verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub identity: String,
}

/// Bearer authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Path prefixes that bypass authentication
    pub public_prefixes: Vec<String>,
    pub tokens: Vec<TokenEntry>,
    /// Tokens that are known but no longer accepted
    pub revoked: Vec<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            public_prefixes: vec!["/login".to_string(), "/public".to_string()],
            tokens: Vec::new(),
            revoked: Vec::new(),
        }
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl GateConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist; without one, `modelgate.toml` in the
    /// working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&GateConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = Config::builder().add_source(defaults);

        builder = match path {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                builder.add_source(File::from(path).format(FileFormat::Toml).required(true))
            }
            None => builder.add_source(
                File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
            ),
        };

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.public_prefixes")
                    .with_list_parse_key("auth.revoked")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}
