// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Hostlink Core
//!
//! The heart of the bridge: a single owner thread that holds exclusive access
//! to the execution environment, ingress queues that feed it, and a bounded
//! synchronous handoff so network callers can block for a result without ever
//! touching environment state themselves.
//!
//! Threading model:
//! - Exactly one owner thread mutates the environment. It wakes on a fixed
//!   tick, drains handoff jobs first, then budgeted queue work.
//! - Any number of submitter threads push work through [`BridgeHandle`] and
//!   either fire-and-forget (prompts) or block on a [`HandoffWaiter`].
//! - Completed reports leave through a crossbeam channel toward the egress
//!   delivery worker; the owner thread never performs network I/O.

pub mod classify;
pub mod environment;
pub mod handoff;
pub mod poller;
pub mod queues;
pub mod report;
pub mod work;

pub use classify::{classify, remediation, ErrorCategory};
pub use environment::{EnvironmentDelta, ExecutionEnvironment, FailureDescriptor, InMemoryEnvironment};
pub use handoff::{handoff_pair, HandoffCompleter, HandoffWaiter};
pub use poller::{BridgeHandle, OwnerThread, SchedulerSettings};
pub use queues::{IngressQueues, QueueDepths, QueueError, MAX_CODE_LEN, MAX_PROMPT_LEN};
pub use report::{DeliveryReceipt, DeliveryTarget, OutboundReport};
pub use work::{ExecutionResult, ExecutionStatus, SceneSnapshot, WorkItem, WorkKind};

/// Errors surfaced by the owner-thread lifecycle
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Owner thread is already running")]
    AlreadyRunning,

    #[error("Failed to spawn owner thread: {0}")]
    ThreadSpawn(String),
}
