// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wire shapes for the ingress endpoint

use serde::{Deserialize, Serialize};

use hostlink_core::{QueueDepths, SceneSnapshot};

/// Incoming submission body
///
/// `code` wins when present and non-blank; otherwise the first non-blank of
/// the prompt aliases is used. A bare JSON string is treated as a prompt.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubmitRequest {
    pub code: Option<String>,
    pub prompt: Option<String>,
    pub message: Option<String>,
    pub text: Option<String>,
    pub description: Option<String>,
}

impl SubmitRequest {
    pub fn code_text(&self) -> Option<&str> {
        self.code.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub fn prompt_text(&self) -> Option<&str> {
        [&self.prompt, &self.message, &self.text, &self.description]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .find(|value| !value.trim().is_empty())
    }
}

/// Immediate acknowledgment for an accepted prompt
#[derive(Debug, Clone, Serialize)]
pub struct PromptAccepted {
    pub status: &'static str,
    pub job_id: String,
    pub prompt: String,
    pub message: &'static str,
    pub scene_summary: String,
    pub timestamp: f64,
}

/// Health and observability payload
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub queue_depths: QueueDepths,
    pub current_scene: SceneSnapshot,
    pub scene_summary: String,
    pub timestamp: f64,
}

/// Structured error body for rejected requests
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}
