// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Hostlink
//!
//! A thread-affine synchronous execution bridge. External callers submit
//! code or prompts over HTTP; a single owner thread executes everything
//! against a stateful host environment on a fixed tick; results flow back
//! synchronously to blocked callers or asynchronously through a retrying
//! delivery worker.
//!
//! [`Server`] wires the pieces together:
//!
//! ```text
//! HTTP ingress ──▶ handoff / queues ──▶ owner thread ──▶ egress worker
//!      ▲                                    │
//!      └──────────── blocked caller ◀───────┘
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use crossbeam::channel::unbounded;
use tracing::info;

pub use hostlink_api::{ApiServer, ApiSettings};
pub use hostlink_config::{load_config, validate_config, HostlinkConfig};
pub use hostlink_core::{
    BridgeHandle, ErrorCategory, ExecutionEnvironment, ExecutionResult, ExecutionStatus,
    InMemoryEnvironment, OwnerThread, SceneSnapshot, SchedulerSettings,
};
pub use hostlink_egress::{DeliveryPolicy, DeliveryWorker};

/// Errors from assembling or running the bridge
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Server is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Config(#[from] hostlink_config::ConfigError),

    #[error(transparent)]
    Bridge(#[from] hostlink_core::BridgeError),

    #[error(transparent)]
    Api(#[from] hostlink_api::ApiError),

    #[error(transparent)]
    Egress(#[from] hostlink_egress::EgressError),
}

// Field order is drop order: the API server stops accepting work, the owner
// thread drains and drops its report sender, then the worker sees the
// channel disconnect and exits.
struct Running {
    api: ApiServer,
    owner: OwnerThread,
    _worker: DeliveryWorker,
    local_addr: SocketAddr,
}

/// The assembled bridge
///
/// `start` spawns the owner thread, the delivery worker, and the HTTP
/// server; `stop` tears them down in reverse and clears all queued work.
/// A stopped server can be started again with a fresh environment.
pub struct Server {
    config: HostlinkConfig,
    state: Option<Running>,
}

impl Server {
    /// Validate the configuration and prepare an idle server.
    pub fn new(config: HostlinkConfig) -> Result<Self, ServerError> {
        validate_config(&config)?;
        Ok(Self {
            config,
            state: None,
        })
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    /// Address the HTTP server is bound to, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.as_ref().map(|r| r.local_addr)
    }

    /// Submitter-side handle into the running bridge.
    pub fn bridge(&self) -> Option<BridgeHandle> {
        self.state.as_ref().map(|r| r.owner.handle())
    }

    /// Spawn all three threads. Fails if already running.
    pub fn start(
        &mut self,
        environment: Box<dyn ExecutionEnvironment>,
    ) -> Result<(), ServerError> {
        if self.state.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let (report_tx, report_rx) = unbounded();

        let scheduler = SchedulerSettings {
            tick_interval: Duration::from_millis(self.config.scheduler.tick_interval_ms),
            max_code_per_tick: self.config.scheduler.max_code_per_tick,
            max_total_per_tick: self.config.scheduler.max_total_per_tick,
            max_discard_per_tick: self.config.scheduler.max_discard_per_tick,
        };
        let mut owner = OwnerThread::new(environment, report_tx, scheduler);
        let bridge = owner.handle();

        let policy = DeliveryPolicy {
            result_url: self.config.egress.result_url.clone(),
            prompt_url: self.config.egress.prompt_url.clone(),
            request_timeout: Duration::from_secs(self.config.egress.request_timeout_secs),
            max_attempts: self.config.egress.max_attempts,
            ..DeliveryPolicy::default()
        };
        let worker = DeliveryWorker::start(report_rx, bridge.clone(), policy)?;

        owner.start()?;

        let api = ApiServer::start(
            ApiSettings {
                listen_host: self.config.server.listen_host.clone(),
                listen_port: self.config.server.listen_port,
                sync_wait: Duration::from_secs(self.config.execution.max_execution_secs),
            },
            bridge,
        )?;
        let local_addr = api.local_addr();

        info!(addr = %local_addr, "Bridge running");
        self.state = Some(Running {
            api,
            owner,
            _worker: worker,
            local_addr,
        });
        Ok(())
    }

    /// Stop everything and discard queued work. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut running) = self.state.take() {
            running.api.stop();
            running.owner.stop();
            info!("Bridge stopped");
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}
