// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ingress queues
//!
//! Lock-free queues between submitter threads and the owner thread, plus a
//! delivered-receipt queue the owner thread prunes on its tick budget.
//! Payload caps are enforced at enqueue time so oversized work never reaches
//! the owner thread.

use crossbeam::queue::SegQueue;
use serde::Serialize;
use uuid::Uuid;

use crate::report::DeliveryReceipt;
use crate::work::{SceneSnapshot, WorkItem, WorkKind};

/// Hard cap on submitted code, in bytes. Larger submissions are rejected.
pub const MAX_CODE_LEN: usize = 50_000;

/// Cap on prompt text, in bytes. Longer prompts are truncated, not rejected.
pub const MAX_PROMPT_LEN: usize = 10_000;

/// Enqueue-time validation failures
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Code payload is empty")]
    EmptyCode,

    #[error("Code payload of {got} bytes exceeds the {max} byte limit")]
    CodeTooLarge { got: usize, max: usize },

    #[error("Prompt payload is empty")]
    EmptyPrompt,
}

/// Depth counters for observability endpoints
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueDepths {
    pub code: usize,
    pub prompt: usize,
    pub delivered: usize,
}

/// The three ingress-side queues
///
/// `SegQueue` gives multi-producer single-consumer semantics without locks;
/// the owner thread is the only popper for code and prompt work.
#[derive(Debug, Default)]
pub struct IngressQueues {
    code: SegQueue<WorkItem>,
    prompt: SegQueue<WorkItem>,
    delivered: SegQueue<DeliveryReceipt>,
}

impl IngressQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and enqueue a code payload for asynchronous execution.
    pub fn enqueue_code(&self, code: String, snapshot: SceneSnapshot) -> Result<Uuid, QueueError> {
        validate_code(&code)?;
        let item = WorkItem::new(WorkKind::Code, code, snapshot);
        let id = item.id;
        self.code.push(item);
        Ok(id)
    }

    /// Validate, truncate if needed, and enqueue a prompt.
    pub fn enqueue_prompt(
        &self,
        prompt: String,
        snapshot: SceneSnapshot,
    ) -> Result<Uuid, QueueError> {
        if prompt.trim().is_empty() {
            return Err(QueueError::EmptyPrompt);
        }
        let prompt = truncate_prompt(prompt);
        let item = WorkItem::new(WorkKind::Prompt, prompt, snapshot);
        let id = item.id;
        self.prompt.push(item);
        Ok(id)
    }

    pub fn try_dequeue_code(&self) -> Option<WorkItem> {
        self.code.pop()
    }

    pub fn try_dequeue_prompt(&self) -> Option<WorkItem> {
        self.prompt.pop()
    }

    pub fn push_receipt(&self, receipt: DeliveryReceipt) {
        self.delivered.push(receipt);
    }

    pub fn discard_receipt(&self) -> Option<DeliveryReceipt> {
        self.delivered.pop()
    }

    pub fn depths(&self) -> QueueDepths {
        QueueDepths {
            code: self.code.len(),
            prompt: self.prompt.len(),
            delivered: self.delivered.len(),
        }
    }

    /// Drop everything. Called on bridge shutdown so a restart begins clean.
    pub fn clear_all(&self) {
        while self.code.pop().is_some() {}
        while self.prompt.pop().is_some() {}
        while self.delivered.pop().is_some() {}
    }
}

/// Shared validation for both the queued and the synchronous code paths.
pub fn validate_code(code: &str) -> Result<(), QueueError> {
    if code.trim().is_empty() {
        return Err(QueueError::EmptyCode);
    }
    if code.len() > MAX_CODE_LEN {
        return Err(QueueError::CodeTooLarge {
            got: code.len(),
            max: MAX_CODE_LEN,
        });
    }
    Ok(())
}

fn truncate_prompt(prompt: String) -> String {
    if prompt.len() <= MAX_PROMPT_LEN {
        return prompt;
    }
    // Cut on a char boundary, then mark the truncation.
    let mut cut = MAX_PROMPT_LEN;
    while !prompt.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = prompt[..cut].to_string();
    truncated.push_str("...");
    truncated
}
