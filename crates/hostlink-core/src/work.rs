// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! Work items and execution results
//!
//! A [`WorkItem`] is the unit that travels from a submitter to the owner
//! thread; an [`ExecutionResult`] is what comes back. The result struct is
//! the wire shape delivered to downstream consumers, so field names here are
//! part of the external contract.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::{self, ErrorCategory};
use crate::environment::FailureDescriptor;

/// Seconds since the Unix epoch, fractional.
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// What kind of work a queue item carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    Code,
    Prompt,
}

/// A unit of submitted work
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: Uuid,
    pub kind: WorkKind,
    pub payload: String,
    pub submitted_at: DateTime<Utc>,
    /// Environment state observed at submission time, for reporting only.
    pub snapshot: SceneSnapshot,
}

impl WorkItem {
    pub fn new(kind: WorkKind, payload: String, snapshot: SceneSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            submitted_at: Utc::now(),
            snapshot,
        }
    }
}

/// Point-in-time view of the execution environment
///
/// Captured by the owner thread after each executed item and published for
/// read-only consumers. Never holds live handles into the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub taken_at: f64,
    pub entities: Vec<String>,
}

impl SceneSnapshot {
    pub fn new(entities: Vec<String>) -> Self {
        Self {
            taken_at: unix_timestamp(),
            entities,
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Short human-readable summary, truncated past five entities.
    pub fn summary(&self) -> String {
        if self.entities.is_empty() {
            return "No entities in scene".to_string();
        }
        let shown: Vec<&str> = self.entities.iter().take(5).map(|s| s.as_str()).collect();
        let mut out = format!("{} entities: {}", self.entities.len(), shown.join(", "));
        if self.entities.len() > 5 {
            out.push_str(&format!(" and {} more", self.entities.len() - 5));
        }
        out
    }
}

/// Terminal state of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Timeout,
}

/// Full outcome of one executed work item
///
/// Serialized as-is toward both synchronous HTTP callers and the egress
/// delivery worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub code_executed: bool,
    pub execution_status: ExecutionStatus,
    pub new_objects: Vec<String>,
    pub objects_created: usize,
    pub execution_time_seconds: f64,
    pub code_length: usize,
    pub timestamp: f64,
    /// Combined `kind: message` line, null on success
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_summary: Option<String>,
    /// Error detail fields serialize as explicit nulls when absent, so an
    /// unlocatable failure still carries `error_line: null` on the wire.
    #[serde(default)]
    pub error_category: Option<ErrorCategory>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problematic_section: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fix_suggestions: Vec<String>,
}

impl ExecutionResult {
    /// A completed execution with its created entities.
    pub fn success(
        created: BTreeSet<String>,
        elapsed: Duration,
        snapshot: &SceneSnapshot,
        code_length: usize,
    ) -> Self {
        let new_objects: Vec<String> = created.into_iter().collect();
        Self {
            code_executed: true,
            execution_status: ExecutionStatus::Success,
            objects_created: new_objects.len(),
            new_objects,
            execution_time_seconds: elapsed.as_secs_f64(),
            code_length,
            timestamp: unix_timestamp(),
            error: None,
            scene_summary: Some(snapshot.summary()),
            error_category: None,
            error_type: None,
            error_message: None,
            error_line: None,
            problematic_section: None,
            fix_suggestions: Vec::new(),
        }
    }

    /// A failed execution, fully classified with remediation hints.
    pub fn failure(failure: &FailureDescriptor, code: &str, elapsed: Duration) -> Self {
        let category = classify::classify(failure);
        let line = classify::failure_line(&failure.trace);
        let section = line.and_then(|l| classify::problem_section(code, l));
        Self {
            code_executed: false,
            execution_status: ExecutionStatus::Failed,
            new_objects: Vec::new(),
            objects_created: 0,
            execution_time_seconds: elapsed.as_secs_f64(),
            code_length: code.len(),
            timestamp: unix_timestamp(),
            error: Some(format!("{}: {}", failure.kind, failure.message)),
            scene_summary: None,
            error_category: Some(category),
            error_type: Some(failure.kind.clone()),
            error_message: Some(failure.message.clone()),
            error_line: line,
            problematic_section: section,
            fix_suggestions: hints(category),
        }
    }

    /// The synchronous wait expired before the owner thread produced a result.
    ///
    /// `code_executed` is false: the item may still run later, but this
    /// caller will never observe it.
    pub fn timed_out(wait: Duration, code_length: usize) -> Self {
        Self {
            code_executed: false,
            execution_status: ExecutionStatus::Timeout,
            new_objects: Vec::new(),
            objects_created: 0,
            execution_time_seconds: wait.as_secs_f64(),
            code_length,
            timestamp: unix_timestamp(),
            error: Some(format!(
                "TimeoutError: no result within {:.0} seconds",
                wait.as_secs_f64()
            )),
            scene_summary: None,
            error_category: Some(ErrorCategory::Timeout),
            error_type: Some("TimeoutError".to_string()),
            error_message: Some(format!(
                "No result within {:.0} seconds; the submission was discarded",
                wait.as_secs_f64()
            )),
            error_line: None,
            problematic_section: None,
            fix_suggestions: hints(ErrorCategory::Timeout),
        }
    }

    /// A submission rejected before reaching the owner thread.
    pub fn rejected(category: ErrorCategory, kind: &str, message: &str, code_length: usize) -> Self {
        Self {
            code_executed: false,
            execution_status: ExecutionStatus::Failed,
            new_objects: Vec::new(),
            objects_created: 0,
            execution_time_seconds: 0.0,
            code_length,
            timestamp: unix_timestamp(),
            error: Some(format!("{}: {}", kind, message)),
            scene_summary: None,
            error_category: Some(category),
            error_type: Some(kind.to_string()),
            error_message: Some(message.to_string()),
            error_line: None,
            problematic_section: None,
            fix_suggestions: hints(category),
        }
    }
}

fn hints(category: ErrorCategory) -> Vec<String> {
    classify::remediation(category)
        .iter()
        .map(|s| s.to_string())
        .collect()
}
