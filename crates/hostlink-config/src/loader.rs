// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Loading order:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)

use crate::{ConfigError, ConfigResult, HostlinkConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "hostlink_configuration.toml";

/// Find the hostlink configuration file
///
/// Search order:
/// 1. `HOSTLINK_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Parent directories (up to 5 levels, for workspace roots)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("HOSTLINK_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by HOSTLINK_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "Configuration file '{}' not found in any of these locations:\n{}\n\nSet HOSTLINK_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML
pub fn load_config(config_path: Option<&Path>) -> ConfigResult<HostlinkConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: HostlinkConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `HOSTLINK_LISTEN_HOST` -> `server.listen_host`
/// - `HOSTLINK_LISTEN_PORT` -> `server.listen_port`
/// - `HOSTLINK_RESULT_URL` -> `egress.result_url`
/// - `HOSTLINK_PROMPT_URL` -> `egress.prompt_url`
/// - `HOSTLINK_MAX_EXECUTION_SECS` -> `execution.max_execution_secs`
/// - `HOSTLINK_LOG_LEVEL` -> `logging.level`
/// - `HOSTLINK_LOG_ENABLED` -> `logging.enabled`
pub fn apply_environment_overrides(config: &mut HostlinkConfig) {
    if let Ok(value) = env::var("HOSTLINK_LISTEN_HOST") {
        config.server.listen_host = value;
    }
    if let Ok(value) = env::var("HOSTLINK_LISTEN_PORT") {
        if let Ok(port) = value.parse::<u16>() {
            config.server.listen_port = port;
        }
    }

    if let Ok(value) = env::var("HOSTLINK_RESULT_URL") {
        config.egress.result_url = value;
    }
    if let Ok(value) = env::var("HOSTLINK_PROMPT_URL") {
        config.egress.prompt_url = value;
    }

    if let Ok(value) = env::var("HOSTLINK_MAX_EXECUTION_SECS") {
        if let Ok(secs) = value.parse::<u64>() {
            config.execution.max_execution_secs = secs;
        }
    }

    if let Ok(value) = env::var("HOSTLINK_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("HOSTLINK_LOG_ENABLED") {
        config.logging.enabled =
            value.to_lowercase() == "true" || value == "1" || value.to_lowercase() == "yes";
    }
}
