// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Hostlink Configuration System
//!
//! Type-safe configuration loader for the bridge with support for:
//! - TOML file parsing
//! - Environment variable overrides
//! - Range validation (ports, timeouts, drain budgets)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hostlink_config::{load_config, HostlinkConfig};
//!
//! // Load configuration with automatic file discovery and overrides
//! let config = load_config(None).expect("Failed to load config");
//!
//! println!("Listen port: {}", config.server.listen_port);
//! println!("Result URL: {}", config.egress.result_url);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{apply_environment_overrides, find_config_file, load_config};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
