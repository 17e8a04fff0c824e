// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! Synchronous handoff
//!
//! A one-shot rendezvous between a blocking submitter and the owner thread.
//! The submitter parks on [`HandoffWaiter::await_result`] with a bounded
//! timeout; the owner thread calls [`HandoffCompleter::complete`] when the
//! work finishes. If the wait expired first, the completion is silently
//! dropped. That race is accepted: the caller already received a timeout
//! result and nobody is listening anymore.

use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::work::ExecutionResult;

/// Submitter half of the rendezvous
#[derive(Debug)]
pub struct HandoffWaiter {
    rx: Receiver<ExecutionResult>,
    code_length: usize,
}

/// Owner-thread half of the rendezvous
#[derive(Debug)]
pub struct HandoffCompleter {
    tx: Sender<ExecutionResult>,
}

/// Create a connected waiter/completer pair for one submission.
pub fn handoff_pair(code_length: usize) -> (HandoffWaiter, HandoffCompleter) {
    let (tx, rx) = bounded(1);
    (HandoffWaiter { rx, code_length }, HandoffCompleter { tx })
}

impl HandoffWaiter {
    /// Block until the owner thread completes the work or the timeout fires.
    ///
    /// Always produces a result: an expired wait (or a bridge that shut down
    /// before completing) yields a timeout-shaped [`ExecutionResult`].
    pub fn await_result(self, timeout: Duration) -> ExecutionResult {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(_) => ExecutionResult::timed_out(timeout, self.code_length),
        }
    }
}

impl HandoffCompleter {
    /// Deliver the result. A send failure means the waiter already gave up;
    /// the result is discarded by design of the timeout contract.
    pub fn complete(self, result: ExecutionResult) {
        if self.tx.send(result).is_err() {
            tracing::debug!("handoff waiter gone before completion; result discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::FailureDescriptor;
    use crate::work::{ExecutionStatus, SceneSnapshot};
    use std::collections::BTreeSet;
    use std::thread;
    use std::time::Instant;

    fn success_result() -> ExecutionResult {
        ExecutionResult::success(
            BTreeSet::new(),
            Duration::from_millis(5),
            &SceneSnapshot::default(),
            8,
        )
    }

    #[test]
    fn completed_before_wait_returns_result() {
        let (waiter, completer) = handoff_pair(8);
        completer.complete(success_result());
        let result = waiter.await_result(Duration::from_secs(1));
        assert_eq!(result.execution_status, ExecutionStatus::Success);
    }

    #[test]
    fn completion_from_another_thread_wakes_waiter() {
        let (waiter, completer) = handoff_pair(7);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            let failure = FailureDescriptor::at_line("NameError", "name 'x' is not defined", 1);
            completer.complete(ExecutionResult::failure(&failure, "x", Duration::ZERO));
        });
        let result = waiter.await_result(Duration::from_secs(2));
        handle.join().unwrap();
        assert_eq!(result.execution_status, ExecutionStatus::Failed);
        assert_eq!(result.error_type.as_deref(), Some("NameError"));
    }

    #[test]
    fn expired_wait_yields_timeout_result() {
        let (waiter, _completer) = handoff_pair(11);
        let started = Instant::now();
        let result = waiter.await_result(Duration::from_millis(50));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(500));
        assert_eq!(result.execution_status, ExecutionStatus::Timeout);
        assert!(!result.code_executed);
        assert_eq!(result.code_length, 11);
    }

    #[test]
    fn late_completion_is_silently_dropped() {
        let (waiter, completer) = handoff_pair(3);
        let result = waiter.await_result(Duration::from_millis(10));
        assert_eq!(result.execution_status, ExecutionStatus::Timeout);
        // Waiter is gone; this must not panic.
        completer.complete(success_result());
    }

    #[test]
    fn dropped_completer_reads_as_timeout() {
        let (waiter, completer) = handoff_pair(3);
        drop(completer);
        let result = waiter.await_result(Duration::from_secs(5));
        assert_eq!(result.execution_status, ExecutionStatus::Timeout);
    }
}
