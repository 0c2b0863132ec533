//! Configuration loading and management

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "ORDER_API_";

/// Environment used when the requested one is not configured
pub const FALLBACK_ENVIRONMENT: &str = "test";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("environment '{0}' is not configured and no 'test' fallback exists")]
    UnknownEnvironment(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidOverride { key: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` as passed to the listener
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8011,
        }
    }
}

/// Document store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub connection: String,
    pub database: String,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection: "mongodb://localhost:27017".to_string(),
            database: "ProjectDB".to_string(),
            collection: "Orders".to_string(),
        }
    }
}

/// Search index settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub addresses: Vec<String>,
    pub index_name: String,
    /// Writes wait for a refresh so they are searchable on return
    pub refresh: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            addresses: vec!["http://localhost:9200".to_string()],
            index_name: "order_duplicate_v01".to_string(),
            refresh: true,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub index: IndexConfig,
    pub backend_timeout_secs: u64,
    /// Run against the in-memory backends instead of live services
    pub in_memory: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            index: IndexConfig::default(),
            backend_timeout_secs: 20,
            in_memory: false,
        }
    }
}

/// A YAML document holding one configuration per named environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub environments: HashMap<String, AppConfig>,
}

impl ConfigFile {
    /// Load a multi-environment document from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = read_file(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Pick the configuration for `environment`, falling back to `test`
    pub fn select(&self, environment: &str) -> Result<AppConfig, ConfigError> {
        if let Some(config) = self.environments.get(environment) {
            return Ok(config.clone());
        }

        tracing::warn!(
            environment,
            fallback = FALLBACK_ENVIRONMENT,
            "unknown environment, using fallback"
        );
        self.environments
            .get(FALLBACK_ENVIRONMENT)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownEnvironment(environment.to_string()))
    }
}

fn read_file(path: &str) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = read_file(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Create a default configuration for local development and testing
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Timeout applied to every backend call
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Apply `ORDER_API_*` variables from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (`ORDER_API_*` names)
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, uri)) = get("STORE_URI") {
            self.store.connection = uri;
        }
        if let Some((_, database)) = get("STORE_DATABASE") {
            self.store.database = database;
        }
        if let Some((_, collection)) = get("STORE_COLLECTION") {
            self.store.collection = collection;
        }
        if let Some((_, addresses)) = get("INDEX_ADDRESSES") {
            self.index.addresses = addresses
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some((_, name)) = get("INDEX_NAME") {
            self.index.index_name = name;
        }
        if let Some((_, host)) = get("HOST") {
            self.server.host = host;
        }
        if let Some((key, port)) = get("PORT") {
            self.server.port = parse_override(&key, &port)?;
        }
        if let Some((key, secs)) = get("BACKEND_TIMEOUT_SECS") {
            self.backend_timeout_secs = parse_override(&key, &secs)?;
        }
        if let Some((key, flag)) = get("IN_MEMORY") {
            self.in_memory = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(ConfigError::InvalidOverride {
                        key,
                        reason: format!("'{}' is not a boolean", other),
                    });
                }
            };
        }

        Ok(self)
    }

    /// Check the configuration before anything connects
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "backend_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.in_memory {
            return Ok(());
        }

        let required = [
            ("store.connection", &self.store.connection),
            ("store.database", &self.store.database),
            ("store.collection", &self.store.collection),
            ("index.index_name", &self.index.index_name),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
        }
        if self.index.addresses.is_empty() {
            return Err(ConfigError::Invalid(
                "index.addresses must list at least one address".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidOverride {
            key: key.to_string(),
            reason: e.to_string(),
        })
}
