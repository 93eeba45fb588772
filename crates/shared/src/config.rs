//! Configuration management for the catalog data layer.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `graphql.token`
pub const GRAPHQL_TOKEN_ENV: &str = "ANILIST_TOKEN";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// REST upstream settings
    pub rest: RestConfig,

    /// GraphQL upstream settings
    pub graphql: GraphQlConfig,

    /// Raw response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// List view settings
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// REST catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// REST API base URL
    pub base_url: String,

    /// Idle time the request queue keeps between two calls, in milliseconds
    pub cooldown_ms: u64,

    /// Additional attempts for failed (non-429) requests
    pub max_retries: u32,

    /// Wait between failed attempts in milliseconds
    pub retry_delay_ms: u64,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// GraphQL catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQlConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,

    /// Optional bearer token; anonymous when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Additional attempts for failed (non-429) requests
    pub max_retries: u32,

    /// Wait between failed attempts in milliseconds
    pub retry_delay_ms: u64,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching
    pub enabled: bool,

    /// Cache directory (relative to data directory)
    pub cache_dir: String,

    /// Cache expiration in seconds (None = permanent)
    pub expiration_seconds: Option<u64>,
}

/// List view configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Records requested per page
    pub per_page: u32,

    /// Genres whose records are dropped during normalization
    pub excluded_genres: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: "cache".to_string(),
            expiration_seconds: Some(600),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            per_page: 20,
            excluded_genres: vec!["Hentai".to_string()],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
            rest: RestConfig {
                base_url: "https://api.jikan.moe/v4".to_string(),
                cooldown_ms: 1000,
                max_retries: 3,
                retry_delay_ms: 1000,
                timeout_secs: 30,
            },
            graphql: GraphQlConfig {
                endpoint: "https://graphql.anilist.co".to_string(),
                token: None,
                max_retries: 3,
                retry_delay_ms: 1000,
                timeout_secs: 30,
            },
            cache: CacheConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load configuration from a TOML file or create default if not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// GraphQL bearer token, environment first, empty values treated as absent
    pub fn graphql_token(&self) -> Option<String> {
        std::env::var(GRAPHQL_TOKEN_ENV)
            .ok()
            .or_else(|| self.graphql.token.clone())
            .filter(|token| !token.trim().is_empty())
    }

    /// Get the absolute path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the absolute path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    /// Get the absolute path for the cache directory
    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(&self.cache.cache_dir)
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}
