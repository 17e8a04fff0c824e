// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Hostlink Egress
//!
//! Background delivery of [`OutboundReport`]s produced by the owner thread.
//! A dedicated worker thread drains an unbounded channel and posts each
//! report to its configured endpoint with bounded retry. Delivery failures
//! never propagate back into execution: after the final attempt the report
//! is logged and dropped.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::Receiver;
use tracing::{debug, error, info, warn};

use hostlink_core::{BridgeHandle, DeliveryReceipt, DeliveryTarget, OutboundReport};

/// Errors from the delivery worker lifecycle
#[derive(Debug, thiserror::Error)]
pub enum EgressError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Failed to spawn delivery thread: {0}")]
    ThreadSpawn(String),
}

/// Where and how reports are delivered
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    pub result_url: String,
    pub prompt_url: String,
    /// Per-attempt request timeout
    pub request_timeout: Duration,
    /// Total attempts before the report is dropped
    pub max_attempts: u32,
    /// Backoff base after an HTTP error status, scaled by attempt number
    pub http_backoff: Duration,
    /// Backoff base after a transport error, scaled by attempt number
    pub transport_backoff: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            result_url: "http://localhost:5678/webhook/result".to_string(),
            prompt_url: "http://localhost:5678/webhook/process".to_string(),
            request_timeout: Duration::from_secs(15),
            max_attempts: 3,
            http_backoff: Duration::from_millis(500),
            transport_backoff: Duration::from_secs(1),
        }
    }
}

impl DeliveryPolicy {
    fn url_for(&self, target: DeliveryTarget) -> &str {
        match target {
            DeliveryTarget::Result => &self.result_url,
            DeliveryTarget::Prompt => &self.prompt_url,
        }
    }
}

/// Background delivery worker
///
/// Runs until the report channel disconnects, then exits. Receipts for every
/// finished delivery series go back to the bridge for pruning on its tick.
pub struct DeliveryWorker {
    thread_handle: Option<JoinHandle<()>>,
}

impl DeliveryWorker {
    /// Spawn the worker thread over a report channel.
    pub fn start(
        reports: Receiver<OutboundReport>,
        bridge: BridgeHandle,
        policy: DeliveryPolicy,
    ) -> Result<Self, EgressError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(policy.request_timeout)
            .build()?;

        let handle = thread::Builder::new()
            .name("hostlink-egress".to_string())
            .spawn(move || {
                info!(
                    result_url = %policy.result_url,
                    prompt_url = %policy.prompt_url,
                    "Delivery worker started"
                );
                while let Ok(report) = reports.recv() {
                    let receipt = deliver(&client, &policy, &report);
                    bridge.push_receipt(receipt);
                }
                info!("Delivery worker stopped");
            })
            .map_err(|e| EgressError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            thread_handle: Some(handle),
        })
    }

    /// Wait for the worker to exit. The report sender must be dropped first
    /// or this blocks forever.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("Delivery worker panicked before join");
            }
        }
    }
}

impl Drop for DeliveryWorker {
    fn drop(&mut self) {
        self.join();
    }
}

/// Post one report, retrying up to the policy's attempt budget.
///
/// Backoff grows linearly with the attempt number; HTTP error statuses and
/// transport errors use separate bases.
pub fn deliver(
    client: &reqwest::blocking::Client,
    policy: &DeliveryPolicy,
    report: &OutboundReport,
) -> DeliveryReceipt {
    let url = policy.url_for(report.target);
    for attempt in 1..=policy.max_attempts {
        match client.post(url).json(&report.body).send() {
            Ok(response) if response.status().is_success() => {
                debug!(job_id = %report.job_id, attempt, "Report delivered");
                return DeliveryReceipt::new(report, true, attempt);
            }
            Ok(response) => {
                warn!(
                    job_id = %report.job_id,
                    attempt,
                    status = %response.status(),
                    "Endpoint rejected report"
                );
                if attempt < policy.max_attempts {
                    thread::sleep(policy.http_backoff * attempt);
                }
            }
            Err(e) => {
                warn!(job_id = %report.job_id, attempt, error = %e, "Delivery attempt failed");
                if attempt < policy.max_attempts {
                    thread::sleep(policy.transport_backoff * attempt);
                }
            }
        }
    }
    error!(
        job_id = %report.job_id,
        attempts = policy.max_attempts,
        url,
        "Report delivery exhausted all attempts, dropping"
    );
    DeliveryReceipt::new(report, false, policy.max_attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_core::work::{SceneSnapshot, WorkItem, WorkKind};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_policy(url: &str) -> DeliveryPolicy {
        DeliveryPolicy {
            result_url: url.to_string(),
            prompt_url: url.to_string(),
            request_timeout: Duration::from_secs(2),
            max_attempts: 3,
            http_backoff: Duration::from_millis(5),
            transport_backoff: Duration::from_millis(5),
        }
    }

    fn sample_report() -> OutboundReport {
        let item = WorkItem::new(WorkKind::Prompt, "a chair".into(), SceneSnapshot::default());
        OutboundReport::prompt_ack(&item)
    }

    // Minimal one-shot HTTP responder; answers `responses` requests with the
    // given status lines, then closes.
    fn spawn_responder(statuses: Vec<&'static str>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_inner = Arc::clone(&hits);
        thread::spawn(move || {
            for status in statuses {
                let (mut stream, _) = match listener.accept() {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                hits_inner.fetch_add(1, Ordering::SeqCst);
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = stream.read(&mut chunk).unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(header_end) = find_header_end(&buf) {
                        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
                        let content_length = headers
                            .lines()
                            .find_map(|l| l.strip_prefix("content-length:"))
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        if buf.len() >= header_end + 4 + content_length {
                            break;
                        }
                    }
                }
                let response =
                    format!("HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (url, hits)
    }

    fn find_header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    #[test]
    fn first_attempt_success() {
        let (url, hits) = spawn_responder(vec!["200 OK"]);
        let client = reqwest::blocking::Client::new();
        let receipt = deliver(&client, &test_policy(&url), &sample_report());
        assert!(receipt.succeeded);
        assert_eq!(receipt.attempts, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retries_after_http_error_then_succeeds() {
        let (url, hits) = spawn_responder(vec![
            "500 Internal Server Error",
            "503 Service Unavailable",
            "200 OK",
        ]);
        let client = reqwest::blocking::Client::new();
        let receipt = deliver(&client, &test_policy(&url), &sample_report());
        assert!(receipt.succeeded);
        assert_eq!(receipt.attempts, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn exhausts_attempts_against_dead_endpoint() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        drop(listener);

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        let receipt = deliver(&client, &test_policy(&url), &sample_report());
        assert!(!receipt.succeeded);
        assert_eq!(receipt.attempts, 3);
    }

    #[test]
    fn persistent_http_errors_fail_the_delivery() {
        let (url, _hits) = spawn_responder(vec!["500 Oops", "500 Oops", "500 Oops"]);
        let client = reqwest::blocking::Client::new();
        let receipt = deliver(&client, &test_policy(&url), &sample_report());
        assert!(!receipt.succeeded);
        assert_eq!(receipt.attempts, 3);
    }
}
