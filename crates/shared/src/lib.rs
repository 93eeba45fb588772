//! Shared library for the anime catalog data layer.
//!
//! This crate provides common functionality used by the catalog crate:
//! - Configuration management
//! - Logging infrastructure
//! - The canonical anime record and pagination descriptor

pub mod config;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use config::{CacheConfig, Config, FeedConfig, GraphQlConfig, RestConfig};
pub use logging::LogConfig;
pub use models::*;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
