// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! Outbound report shapes
//!
//! The owner thread produces [`OutboundReport`]s; the egress worker delivers
//! them and pushes a [`DeliveryReceipt`] back for bookkeeping. Keeping these
//! types here lets the egress crate depend on core without a cycle.

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::work::{unix_timestamp, ExecutionResult, WorkItem};

/// Which configured endpoint a report goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryTarget {
    /// Execution results and errors
    Result,
    /// Prompt acknowledgments for downstream generation
    Prompt,
}

/// A JSON body bound for one of the egress endpoints
#[derive(Debug, Clone)]
pub struct OutboundReport {
    pub target: DeliveryTarget,
    pub job_id: Uuid,
    pub body: serde_json::Value,
}

impl OutboundReport {
    /// Report for a completed (or failed) queued code item.
    pub fn execution(item: &WorkItem, result: &ExecutionResult) -> Self {
        let mut body = serde_json::to_value(result).unwrap_or_else(|_| json!({}));
        if let Some(map) = body.as_object_mut() {
            map.insert("job_id".to_string(), json!(item.id.to_string()));
        }
        Self {
            target: DeliveryTarget::Result,
            job_id: item.id,
            body,
        }
    }

    /// Acknowledgment that a prompt was accepted and forwarded.
    pub fn prompt_ack(item: &WorkItem) -> Self {
        let body = json!({
            "status": "accepted",
            "job_id": item.id.to_string(),
            "prompt": item.payload,
            "message": "Generation started",
            "execution": "processing",
            "scene_summary": item.snapshot.summary(),
            "timestamp": unix_timestamp(),
        });
        Self {
            target: DeliveryTarget::Prompt,
            job_id: item.id,
            body,
        }
    }
}

/// Bookkeeping entry for a finished delivery attempt series
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub job_id: Uuid,
    pub target: DeliveryTarget,
    pub succeeded: bool,
    pub attempts: u32,
    pub completed_at: f64,
}

impl DeliveryReceipt {
    pub fn new(report: &OutboundReport, succeeded: bool, attempts: u32) -> Self {
        Self {
            job_id: report.job_id,
            target: report.target,
            succeeded,
            attempts,
            completed_at: unix_timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::{SceneSnapshot, WorkKind};
    use std::collections::BTreeSet;
    use std::time::Duration;

    #[test]
    fn execution_report_carries_job_id() {
        let item = WorkItem::new(WorkKind::Code, "spawn cube".into(), SceneSnapshot::default());
        let snap = SceneSnapshot::new(vec!["cube".into()]);
        let result = ExecutionResult::success(BTreeSet::new(), Duration::ZERO, &snap, 10);
        let report = OutboundReport::execution(&item, &result);
        assert_eq!(report.target, DeliveryTarget::Result);
        assert_eq!(report.body["job_id"], item.id.to_string());
        assert_eq!(report.body["execution_status"], "success");
    }

    #[test]
    fn prompt_ack_shape() {
        let item = WorkItem::new(WorkKind::Prompt, "a red chair".into(), SceneSnapshot::default());
        let report = OutboundReport::prompt_ack(&item);
        assert_eq!(report.target, DeliveryTarget::Prompt);
        assert_eq!(report.body["status"], "accepted");
        assert_eq!(report.body["prompt"], "a red chair");
        assert_eq!(report.body["execution"], "processing");
    }
}
