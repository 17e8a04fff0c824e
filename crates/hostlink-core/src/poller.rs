// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! Owner thread and bridge handle
//!
//! [`OwnerThread`] runs the single thread with exclusive access to the
//! execution environment. Every tick it drains, in order:
//!
//! 1. all pending synchronous handoff jobs (unbudgeted, callers are parked)
//! 2. queued code items, up to the per-tick code budget
//! 3. queued prompts, up to the remaining shared per-tick ceiling
//! 4. delivered-receipt bookkeeping, up to the discard budget
//!
//! [`BridgeHandle`] is the cloneable submitter-side surface. It never touches
//! the environment; it only pushes work and reads published state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::Sender;
use crossbeam::queue::SegQueue;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::environment::ExecutionEnvironment;
use crate::handoff::{handoff_pair, HandoffCompleter, HandoffWaiter};
use crate::queues::{validate_code, IngressQueues, QueueDepths, QueueError};
use crate::report::OutboundReport;
use crate::work::{ExecutionResult, SceneSnapshot, WorkItem, WorkKind};
use crate::BridgeError;

/// How long the poll loop sleeps at a time while waiting for the next tick,
/// so stop requests are noticed promptly.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Cadence and drain budgets for the owner thread
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub tick_interval: Duration,
    pub max_code_per_tick: usize,
    pub max_total_per_tick: usize,
    pub max_discard_per_tick: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            max_code_per_tick: 2,
            max_total_per_tick: 3,
            max_discard_per_tick: 10,
        }
    }
}

/// A synchronous submission waiting for the next tick
struct HandoffJob {
    item: WorkItem,
    completer: HandoffCompleter,
}

/// State shared between submitters and the owner thread
struct OwnerShared {
    handoffs: SegQueue<HandoffJob>,
    queues: IngressQueues,
    latest_snapshot: RwLock<SceneSnapshot>,
}

/// The owner thread lifecycle
///
/// Single-use: `start` moves the environment onto the thread, `stop` joins
/// it and clears the queues. Restarting means constructing a new bridge.
pub struct OwnerThread {
    settings: SchedulerSettings,
    shared: Arc<OwnerShared>,
    egress: Sender<OutboundReport>,
    environment: Option<Box<dyn ExecutionEnvironment>>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl OwnerThread {
    pub fn new(
        environment: Box<dyn ExecutionEnvironment>,
        egress: Sender<OutboundReport>,
        settings: SchedulerSettings,
    ) -> Self {
        let initial = environment.snapshot();
        Self {
            settings,
            shared: Arc::new(OwnerShared {
                handoffs: SegQueue::new(),
                queues: IngressQueues::new(),
                latest_snapshot: RwLock::new(initial),
            }),
            egress,
            environment: Some(environment),
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Submitter-side handle, cheap to clone across threads.
    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the owner thread and begin ticking.
    pub fn start(&mut self) -> Result<(), BridgeError> {
        if self.is_running() {
            warn!("Owner thread already running, ignoring start request");
            return Err(BridgeError::AlreadyRunning);
        }
        let mut environment = self.environment.take().ok_or_else(|| {
            BridgeError::ThreadSpawn("execution environment already consumed".to_string())
        })?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let shared = Arc::clone(&self.shared);
        let egress = self.egress.clone();
        let settings = self.settings.clone();

        let handle = thread::Builder::new()
            .name("hostlink-owner".to_string())
            .spawn(move || {
                info!(
                    tick_ms = settings.tick_interval.as_millis() as u64,
                    "Owner thread started"
                );
                *shared.latest_snapshot.write() = environment.snapshot();
                while running.load(Ordering::SeqCst) {
                    let tick_started = Instant::now();
                    tick(environment.as_mut(), &shared, &egress, &settings);
                    sleep_until_next_tick(tick_started, settings.tick_interval, &running);
                }
                info!("Owner thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                BridgeError::ThreadSpawn(e.to_string())
            })?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Signal the thread to stop, join it, and clear all pending work.
    ///
    /// Idempotent. Pending handoff jobs are dropped, which wakes their
    /// waiters with a timeout-shaped result.
    pub fn stop(&mut self) {
        if !self.is_running() && self.thread_handle.is_none() {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("Owner thread panicked before join");
            }
        }
        while self.shared.handoffs.pop().is_some() {}
        self.shared.queues.clear_all();
    }
}

impl Drop for OwnerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sleep_until_next_tick(tick_started: Instant, interval: Duration, running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        let elapsed = tick_started.elapsed();
        if elapsed >= interval {
            break;
        }
        let remaining = interval - elapsed;
        thread::sleep(remaining.min(STOP_POLL_INTERVAL));
    }
}

/// One scheduler tick over all four drain phases.
fn tick(
    environment: &mut dyn ExecutionEnvironment,
    shared: &OwnerShared,
    egress: &Sender<OutboundReport>,
    settings: &SchedulerSettings,
) {
    // Phase 1: synchronous handoffs. Callers are blocked, so these run
    // ahead of and outside the queue budgets.
    while let Some(job) = shared.handoffs.pop() {
        let result = execute_item(environment, shared, &job.item);
        job.completer.complete(result);
    }

    // Phase 2: queued code, bounded so a burst cannot monopolize the tick.
    let mut drained = 0usize;
    while drained < settings.max_code_per_tick {
        let item = match shared.queues.try_dequeue_code() {
            Some(item) => item,
            None => break,
        };
        let result = execute_item(environment, shared, &item);
        let report = OutboundReport::execution(&item, &result);
        if egress.send(report).is_err() {
            warn!(job_id = %item.id, "Egress channel closed, dropping execution report");
        }
        drained += 1;
    }

    // Phase 3: prompts fill the remaining shared ceiling.
    while drained < settings.max_total_per_tick {
        let item = match shared.queues.try_dequeue_prompt() {
            Some(item) => item,
            None => break,
        };
        debug!(job_id = %item.id, "Forwarding prompt for generation");
        let report = OutboundReport::prompt_ack(&item);
        if egress.send(report).is_err() {
            warn!(job_id = %item.id, "Egress channel closed, dropping prompt ack");
        }
        drained += 1;
    }

    // Phase 4: bounded receipt pruning.
    let mut discarded = 0usize;
    while discarded < settings.max_discard_per_tick {
        match shared.queues.discard_receipt() {
            Some(receipt) => {
                debug!(
                    job_id = %receipt.job_id,
                    succeeded = receipt.succeeded,
                    attempts = receipt.attempts,
                    "Pruned delivery receipt"
                );
                discarded += 1;
            }
            None => break,
        }
    }
}

fn execute_item(
    environment: &mut dyn ExecutionEnvironment,
    shared: &OwnerShared,
    item: &WorkItem,
) -> ExecutionResult {
    let started = Instant::now();
    let result = match environment.run(&item.payload, &item.snapshot) {
        Ok(delta) => {
            ExecutionResult::success(delta.created_entities, started.elapsed(), &delta.snapshot, item.payload.len())
        }
        Err(failure) => {
            debug!(job_id = %item.id, kind = %failure.kind, "Execution failed");
            ExecutionResult::failure(&failure, &item.payload, started.elapsed())
        }
    };
    *shared.latest_snapshot.write() = environment.snapshot();
    result
}

/// Cloneable submitter-side surface of the bridge
#[derive(Clone)]
pub struct BridgeHandle {
    shared: Arc<OwnerShared>,
}

impl BridgeHandle {
    /// Submit code for synchronous execution on the next tick.
    ///
    /// Returns the waiter to block on; validation failures never reach the
    /// owner thread.
    pub fn submit_code(&self, code: String) -> Result<HandoffWaiter, QueueError> {
        validate_code(&code)?;
        let (waiter, completer) = handoff_pair(code.len());
        let item = WorkItem::new(WorkKind::Code, code, self.snapshot());
        self.shared.handoffs.push(HandoffJob { item, completer });
        Ok(waiter)
    }

    /// Queue code for asynchronous execution, result delivered via egress.
    pub fn enqueue_code(&self, code: String) -> Result<uuid::Uuid, QueueError> {
        self.shared.queues.enqueue_code(code, self.snapshot())
    }

    /// Queue a prompt for forwarding to the generation endpoint.
    pub fn enqueue_prompt(&self, prompt: String) -> Result<uuid::Uuid, QueueError> {
        self.shared.queues.enqueue_prompt(prompt, self.snapshot())
    }

    /// Record a finished delivery for the owner thread to prune.
    pub fn push_receipt(&self, receipt: crate::report::DeliveryReceipt) {
        self.shared.queues.push_receipt(receipt);
    }

    pub fn queue_depths(&self) -> QueueDepths {
        self.shared.queues.depths()
    }

    /// Latest environment state as published by the owner thread.
    pub fn snapshot(&self) -> SceneSnapshot {
        self.shared.latest_snapshot.read().clone()
    }
}
