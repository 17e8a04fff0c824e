// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP server lifecycle and request handlers
//!
//! The server owns a small tokio runtime on a dedicated thread. The listener
//! is bound synchronously during `start` so callers immediately learn the
//! resolved address (port 0 is supported for tests) and bind failures are
//! reported as errors instead of a dead background thread.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use hostlink_core::work::unix_timestamp;
use hostlink_core::{BridgeHandle, ErrorCategory, ExecutionResult, QueueError};

use crate::models::{ErrorBody, HealthResponse, PromptAccepted, SubmitRequest};
use crate::ApiError;

/// Request bodies above this are rejected with 413 before parsing.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Listener address and synchronous wait bound
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub listen_host: String,
    pub listen_port: u16,
    /// How long a code submission blocks for its result
    pub sync_wait: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_string(),
            listen_port: 8765,
            sync_wait: Duration::from_secs(120),
        }
    }
}

struct ApiState {
    bridge: BridgeHandle,
    sync_wait: Duration,
}

/// Running HTTP ingress server
pub struct ApiServer {
    local_addr: SocketAddr,
    shutdown: Option<watch::Sender<bool>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Bind and serve on a background thread.
    pub fn start(settings: ApiSettings, bridge: BridgeHandle) -> Result<Self, ApiError> {
        let addr = format!("{}:{}", settings.listen_host, settings.listen_port);
        let std_listener = StdTcpListener::bind(&addr).map_err(|source| ApiError::Bind {
            addr: addr.clone(),
            source,
        })?;
        std_listener.set_nonblocking(true).map_err(ApiError::Runtime)?;
        let local_addr = std_listener.local_addr().map_err(ApiError::Runtime)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("hostlink-api-worker")
            .enable_all()
            .build()
            .map_err(ApiError::Runtime)?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let state = Arc::new(ApiState {
            bridge,
            sync_wait: settings.sync_wait,
        });

        let thread_handle = thread::Builder::new()
            .name("hostlink-api".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(std_listener) {
                        Ok(listener) => listener,
                        Err(e) => {
                            error!(error = %e, "Failed to adopt listener into runtime");
                            return;
                        }
                    };
                    info!(addr = %local_addr, "API server listening");
                    let app = build_router(state);
                    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                        let _ = shutdown_rx.changed().await;
                    });
                    if let Err(e) = serve.await {
                        error!(error = %e, "API server terminated with error");
                    }
                });
            })
            .map_err(|e| ApiError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            thread_handle: Some(thread_handle),
        })
    }

    /// Address actually bound, with the resolved port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Request graceful shutdown and wait for the server thread.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("API server thread panicked before join");
            }
        }
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", post(submit).get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST / with either `code` (synchronous) or a prompt field (queued).
async fn submit(State(state): State<Arc<ApiState>>, body: Bytes) -> Response {
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Rejected unparseable request body");
            let result = ExecutionResult::rejected(
                ErrorCategory::InvalidValue,
                "ValueError",
                &format!("Invalid JSON body: {}", e),
                body.len(),
            );
            return (StatusCode::BAD_REQUEST, Json(result)).into_response();
        }
    };

    // A bare JSON string is shorthand for a prompt.
    if let serde_json::Value::String(prompt) = &value {
        if !prompt.trim().is_empty() {
            return submit_prompt(state, prompt.clone());
        }
    }

    let request: SubmitRequest = serde_json::from_value(value.clone()).unwrap_or_default();
    if request.code_text().is_some() {
        let code = request.code.unwrap_or_default();
        return submit_code(state, code).await;
    }
    if let Some(prompt) = request.prompt_text() {
        return submit_prompt(state, prompt.to_string());
    }
    // No known field matched; the whole payload is treated as the prompt.
    if !value.is_null() {
        return submit_prompt(state, value.to_string());
    }
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody::new("Request body is empty")),
    )
        .into_response()
}

async fn submit_code(state: Arc<ApiState>, code: String) -> Response {
    let code_length = code.len();
    match state.bridge.submit_code(code) {
        Ok(waiter) => {
            let wait = state.sync_wait;
            // The waiter parks its thread, so it must leave the runtime.
            match tokio::task::spawn_blocking(move || waiter.await_result(wait)).await {
                Ok(result) => (StatusCode::OK, Json(result)).into_response(),
                Err(e) => {
                    error!(error = %e, "Execution wait task failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(ErrorBody::new("Execution wait task failed")),
                    )
                        .into_response()
                }
            }
        }
        Err(e @ QueueError::CodeTooLarge { .. }) => {
            let result = ExecutionResult::rejected(
                ErrorCategory::InvalidValue,
                "ValueError",
                &e.to_string(),
                code_length,
            );
            (StatusCode::BAD_REQUEST, Json(result)).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(ErrorBody::new(e.to_string()))).into_response(),
    }
}

fn submit_prompt(state: Arc<ApiState>, prompt: String) -> Response {
    match state.bridge.enqueue_prompt(prompt.clone()) {
        Ok(job_id) => {
            let ack = PromptAccepted {
                status: "accepted",
                job_id: job_id.to_string(),
                prompt,
                message: "Generation started",
                scene_summary: state.bridge.snapshot().summary(),
                timestamp: unix_timestamp(),
            };
            (StatusCode::OK, Json(ack)).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(ErrorBody::new(e.to_string()))).into_response(),
    }
}

/// GET / liveness and queue observability.
async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let snapshot = state.bridge.snapshot();
    Json(HealthResponse {
        service: "hostlink",
        version: env!("CARGO_PKG_VERSION"),
        status: "ok",
        queue_depths: state.bridge.queue_depths(),
        scene_summary: snapshot.summary(),
        current_scene: snapshot,
        timestamp: unix_timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use hostlink_core::{InMemoryEnvironment, OwnerThread, SchedulerSettings};

    struct Fixture {
        owner: OwnerThread,
        server: ApiServer,
    }

    impl Fixture {
        fn start() -> Self {
            let (tx, _rx) = unbounded();
            let mut owner = OwnerThread::new(
                Box::new(InMemoryEnvironment::new()),
                tx,
                SchedulerSettings {
                    tick_interval: Duration::from_millis(10),
                    ..SchedulerSettings::default()
                },
            );
            let bridge = owner.handle();
            owner.start().unwrap();
            let server = ApiServer::start(
                ApiSettings {
                    listen_host: "127.0.0.1".to_string(),
                    listen_port: 0,
                    sync_wait: Duration::from_secs(5),
                },
                bridge,
            )
            .unwrap();
            Self { owner, server }
        }

        fn url(&self) -> String {
            format!("http://{}/", self.server.local_addr())
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.server.stop();
            self.owner.stop();
        }
    }

    #[test]
    fn code_submission_returns_execution_result() {
        let fixture = Fixture::start();
        let client = reqwest::blocking::Client::new();
        let response = client
            .post(fixture.url())
            .json(&serde_json::json!({"code": "spawn cube"}))
            .send()
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["execution_status"], "success");
        assert_eq!(body["objects_created"], 1);
    }

    #[test]
    fn invalid_json_is_structured_400() {
        let fixture = Fixture::start();
        let client = reqwest::blocking::Client::new();
        let response = client
            .post(fixture.url())
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["execution_status"], "failed");
        assert_eq!(body["error_category"], "invalid_value");
        assert!(!body["fix_suggestions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn prompt_alias_fields_are_accepted() {
        let fixture = Fixture::start();
        let client = reqwest::blocking::Client::new();
        let response = client
            .post(fixture.url())
            .json(&serde_json::json!({"message": "a wooden table"}))
            .send()
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["prompt"], "a wooden table");

        // Bare string bodies are prompts too.
        let response = client
            .post(fixture.url())
            .json(&serde_json::json!("a stone arch"))
            .send()
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["prompt"], "a stone arch");
    }

    #[test]
    fn unknown_payload_falls_back_to_prompt() {
        let fixture = Fixture::start();
        let client = reqwest::blocking::Client::new();
        let response = client
            .post(fixture.url())
            .json(&serde_json::json!({"other": 1}))
            .send()
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["prompt"], "{\"other\":1}");

        // A null body is the one payload with nothing to forward.
        let response = client
            .post(fixture.url())
            .json(&serde_json::Value::Null)
            .send()
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[test]
    fn health_reports_queue_depths() {
        let fixture = Fixture::start();
        let client = reqwest::blocking::Client::new();
        let response = client.get(fixture.url()).send().unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["status"], "ok");
        assert!(body["queue_depths"]["code"].is_number());
        assert!(body["current_scene"]["entities"].is_array());
    }

    #[test]
    fn oversized_body_is_413() {
        let fixture = Fixture::start();
        let client = reqwest::blocking::Client::new();
        let huge = "x".repeat(MAX_BODY_BYTES + 10);
        let response = client
            .post(fixture.url())
            .header("content-type", "application/json")
            .body(format!("{{\"code\": \"{}\"}}", huge))
            .send()
            .unwrap();
        assert_eq!(response.status(), 413);
    }
}
