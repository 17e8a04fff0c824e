// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Hostlink API
//!
//! HTTP ingress for the bridge. A single endpoint accepts either a `code`
//! payload (executed synchronously, the response carries the full execution
//! result) or a `prompt` payload (queued and acknowledged immediately).
//! The server runs on its own thread with a private tokio runtime so the
//! rest of the bridge stays free of async plumbing.

pub mod models;
pub mod server;

pub use models::{ErrorBody, HealthResponse, PromptAccepted, SubmitRequest};
pub use server::{ApiServer, ApiSettings};

/// Errors from the API server lifecycle
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Failed to spawn server thread: {0}")]
    ThreadSpawn(String),

    #[error("Failed to build server runtime: {0}")]
    Runtime(std::io::Error),
}
