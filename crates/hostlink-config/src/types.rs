// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `hostlink_configuration.toml`.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HostlinkConfig {
    pub server: ServerConfig,
    pub egress: EgressConfig,
    pub execution: ExecutionConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

/// HTTP ingress server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_host: String,
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_string(),
            listen_port: 8765,
        }
    }
}

/// Outbound delivery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EgressConfig {
    /// URL execution results and errors are posted back to
    pub result_url: String,
    /// URL prompt acknowledgments are forwarded to for downstream processing
    pub prompt_url: String,
    /// Per-attempt request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum delivery attempts before giving up
    pub max_attempts: u32,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            result_url: "http://localhost:5678/webhook/result".to_string(),
            prompt_url: "http://localhost:5678/webhook/process".to_string(),
            request_timeout_secs: 15,
            max_attempts: 3,
        }
    }
}

/// Execution limits for submitted work
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum seconds a synchronous caller waits for the owner thread
    pub max_execution_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_execution_secs: 120,
        }
    }
}

/// Owner-thread scheduler cadence and drain budgets
///
/// The drain budgets are deliberate fairness knobs: code work is bounded per
/// tick so a burst of synchronous requests cannot starve prompt processing,
/// and prompt work is capped at the remaining shared ceiling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick cadence in milliseconds
    pub tick_interval_ms: u64,
    /// Max code-queue items drained per tick
    pub max_code_per_tick: usize,
    /// Max items drained per tick across code + prompt queues
    pub max_total_per_tick: usize,
    /// Max delivered-result bookkeeping entries discarded per tick
    pub max_discard_per_tick: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            max_code_per_tick: 2,
            max_total_per_tick: 3,
            max_discard_per_tick: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}
