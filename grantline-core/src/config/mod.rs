//! Configuration management for Grantline
//!
//! Configuration is read from a TOML file or built from defaults, then
//! overridden from environment variables and validated.

use crate::logging::LogLevel;
use crate::model::validate_name;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// This node's identity within the cluster
    pub node: NodeConfig,

    /// Store gateway configuration
    pub store: StoreConfig,

    /// Cross-node update propagation
    pub propagation: PropagationConfig,

    /// Permission resolution
    pub resolution: ResolutionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Context value this node resolves permissions in (`global` for none)
    pub server_name: String,

    /// Group every new user joins and starts with as primary group
    pub default_group: String,
}

/// Which storage backend the gateway talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Memory,
    File,
}

impl FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageBackendKind::Memory),
            "file" | "json" => Ok(StorageBackendKind::File),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

impl fmt::Display for StorageBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackendKind::Memory => write!(f, "memory"),
            StorageBackendKind::File => write!(f, "file"),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StorageBackendKind,

    /// Data directory for the file backend
    pub data_dir: PathBuf,

    /// Upper bound on a single backend operation
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,
}

/// Which messaging service carries update signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagingKind {
    /// Single node; signals go nowhere
    None,
    /// In-process broadcast bus shared by nodes in one process
    Local,
}

impl FromStr for MessagingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Ok(MessagingKind::None),
            "local" => Ok(MessagingKind::Local),
            other => Err(format!("unknown messaging service '{}'", other)),
        }
    }
}

/// Propagation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    pub messaging_service: MessagingKind,

    /// Buffered signals per subscriber before it lags
    pub channel_capacity: usize,

    /// Number of recently seen signal ids remembered for de-duplication
    pub dedup_capacity: usize,
}

/// Resolution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Let `a.b.*` and `*` nodes answer checks
    pub apply_wildcards: bool,

    /// Let unscoped nodes apply in every context
    pub include_global: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server_name: crate::model::GLOBAL_CONTEXT.to_string(),
            default_group: "default".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::File,
            data_dir: PathBuf::from("./data"),
            operation_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            messaging_service: MessagingKind::None,
            channel_capacity: 256,
            dedup_capacity: 1024,
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            apply_wildcards: true,
            include_global: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

impl Config {
    /// Defaults overridden from environment variables
    ///
    /// Environment variables follow the pattern: GRANTLINE_<SECTION>_<KEY>
    /// Example: GRANTLINE_NODE_SERVER_NAME=lobby
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self = toml::from_str(&contents)?;
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Node config
        if let Some(server) = lookup("GRANTLINE_NODE_SERVER_NAME") {
            self.node.server_name = server;
        }
        if let Some(group) = lookup("GRANTLINE_NODE_DEFAULT_GROUP") {
            self.node.default_group = group;
        }

        // Store config
        if let Some(backend) = lookup("GRANTLINE_STORE_BACKEND") {
            self.store.backend = parse_value("GRANTLINE_STORE_BACKEND", &backend)?;
        }
        if let Some(dir) = lookup("GRANTLINE_STORE_DATA_DIR") {
            self.store.data_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = lookup("GRANTLINE_STORE_OPERATION_TIMEOUT") {
            self.store.operation_timeout = humantime_serde::re::humantime::parse_duration(&timeout)
                .map_err(|e| ConfigError::InvalidValue {
                    key: "GRANTLINE_STORE_OPERATION_TIMEOUT".to_string(),
                    reason: e.to_string(),
                })?;
        }

        // Propagation config
        if let Some(kind) = lookup("GRANTLINE_PROPAGATION_MESSAGING_SERVICE") {
            self.propagation.messaging_service =
                parse_value("GRANTLINE_PROPAGATION_MESSAGING_SERVICE", &kind)?;
        }
        if let Some(capacity) = lookup("GRANTLINE_PROPAGATION_CHANNEL_CAPACITY") {
            self.propagation.channel_capacity =
                parse_value("GRANTLINE_PROPAGATION_CHANNEL_CAPACITY", &capacity)?;
        }

        // Resolution config
        if let Some(flag) = lookup("GRANTLINE_RESOLUTION_APPLY_WILDCARDS") {
            self.resolution.apply_wildcards =
                parse_value("GRANTLINE_RESOLUTION_APPLY_WILDCARDS", &flag)?;
        }

        // Logging config
        if let Some(level) = lookup("GRANTLINE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("GRANTLINE_LOG_JSON") {
            self.logging.json_format = parse_value("GRANTLINE_LOG_JSON", &json)?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.server_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "server_name must not be empty".to_string(),
            ));
        }

        validate_name(&self.node.default_group)
            .map_err(|e| ConfigError::ValidationFailed(format!("default_group: {}", e)))?;

        if self.store.operation_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "operation_timeout must be greater than 0".to_string(),
            ));
        }

        if self.propagation.channel_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "channel_capacity must be greater than 0".to_string(),
            ));
        }

        if self.propagation.dedup_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "dedup_capacity must be greater than 0".to_string(),
            ));
        }

        if self.logging.level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The server context this node resolves in, `None` for global
    pub fn server_context(&self) -> Option<String> {
        crate::model::normalize_context(Some(&self.node.server_name))
    }
}
