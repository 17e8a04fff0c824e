// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures configuration values are within valid ranges and do not
//! contradict each other before the bridge starts.

use crate::{ConfigError, ConfigResult, HostlinkConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    InvalidPortRange { port: u16 },
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPortRange { port } => {
                write!(
                    f,
                    "server.listen_port = {} is outside valid range (1024-65535)",
                    port
                )
            }
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Listen port range (0 for ephemeral, else 1024-65535)
/// - Execution timeout range (5-300 seconds)
/// - Scheduler cadence and drain budget sanity
/// - Egress URLs present
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &HostlinkConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    // Port 0 requests an ephemeral port; otherwise stay out of root range.
    if (1..1024).contains(&config.server.listen_port) {
        errors.push(ConfigValidationError::InvalidPortRange {
            port: config.server.listen_port,
        });
    }

    let secs = config.execution.max_execution_secs;
    if !(5..=300).contains(&secs) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "execution.max_execution_secs".to_string(),
            reason: format!("{} is outside valid range (5-300)", secs),
        });
    }

    if config.scheduler.tick_interval_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "scheduler.tick_interval_ms".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    if config.scheduler.max_total_per_tick == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "scheduler.max_total_per_tick".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    if config.scheduler.max_code_per_tick > config.scheduler.max_total_per_tick {
        errors.push(ConfigValidationError::InvalidValue {
            field: "scheduler.max_code_per_tick".to_string(),
            reason: format!(
                "{} exceeds the shared per-tick ceiling of {}",
                config.scheduler.max_code_per_tick, config.scheduler.max_total_per_tick
            ),
        });
    }

    if config.egress.result_url.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "egress.result_url".to_string(),
        });
    }
    if config.egress.prompt_url.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "egress.prompt_url".to_string(),
        });
    }
    if config.egress.max_attempts == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "egress.max_attempts".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = HostlinkConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_privileged_port() {
        let mut config = HostlinkConfig::default();
        config.server.listen_port = 80;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn allows_ephemeral_port() {
        let mut config = HostlinkConfig::default();
        config.server.listen_port = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_execution_timeout_out_of_range() {
        let mut config = HostlinkConfig::default();
        config.execution.max_execution_secs = 4;
        assert!(validate_config(&config).is_err());

        config.execution.max_execution_secs = 301;
        assert!(validate_config(&config).is_err());

        config.execution.max_execution_secs = 300;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_code_budget_above_ceiling() {
        let mut config = HostlinkConfig::default();
        config.scheduler.max_code_per_tick = 5;
        config.scheduler.max_total_per_tick = 3;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_empty_egress_urls() {
        let mut config = HostlinkConfig::default();
        config.egress.result_url = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }
}
