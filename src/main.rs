// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! `hostlinkd` daemon
//!
//! Loads configuration, starts the bridge against the in-memory reference
//! environment, and runs until interrupted.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hostlink::{load_config, HostlinkConfig, InMemoryEnvironment, Server};
use hostlink_config::ConfigError;

fn init_tracing(config: &HostlinkConfig) {
    if !config.logging.enabled {
        return;
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn main() -> anyhow::Result<()> {
    let (config, from_file) = match load_config(None) {
        Ok(config) => (config, true),
        Err(ConfigError::FileNotFound(_)) => {
            let mut config = HostlinkConfig::default();
            hostlink_config::apply_environment_overrides(&mut config);
            (config, false)
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    init_tracing(&config);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = config.server.listen_port,
        "Starting hostlinkd"
    );
    if !from_file {
        warn!("No configuration file found, running with built-in defaults");
    }

    let mut server = Server::new(config).context("Invalid configuration")?;
    server
        .start(Box::new(InMemoryEnvironment::new()))
        .context("Failed to start the bridge")?;

    // Minimal runtime just for signal handling; the bridge itself runs on
    // its own threads.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("Failed to wait for shutdown signal")?;

    info!("Shutdown signal received");
    server.stop();
    Ok(())
}
