//! Workflow instance record and its timing stats.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::ids::WorkflowId;
use super::task::Task;

/// Per-worker timing of one workflow instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerTiming {
    pub tasks: u64,
    pub busy_ms: i64,
}

/// Aggregated timing stats, keyed by worker tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub workers: BTreeMap<String, WorkerTiming>,
}

impl WorkflowStats {
    /// Aggregate the finished tasks of a workflow.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut workers: BTreeMap<String, WorkerTiming> = BTreeMap::new();
        for task in tasks {
            let Some(busy) = task.busy_time() else {
                continue;
            };
            let timing = workers.entry(task.worker().to_string()).or_default();
            timing.tasks += 1;
            timing.busy_ms += busy.num_milliseconds();
        }
        Self { workers }
    }

    pub fn total_tasks(&self) -> u64 {
        self.workers.values().map(|t| t.tasks).sum()
    }
}

/// One running (or finished) instance of a named workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    workflow_id: WorkflowId,
    name: String,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    failed: bool,
    #[serde(default)]
    stats: WorkflowStats,
}

impl WorkflowInstance {
    pub fn new(workflow_id: WorkflowId, name: impl Into<String>) -> Self {
        Self {
            workflow_id,
            name: name.into(),
            started_at: None,
            finished_at: None,
            failed: false,
            stats: WorkflowStats::default(),
        }
    }

    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Started and not yet finished.
    pub fn is_active(&self) -> bool {
        self.started_at.is_some() && self.finished_at.is_none()
    }

    pub fn stats(&self) -> &WorkflowStats {
        &self.stats
    }

    pub fn set_started_at(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.started_at.is_some() {
            return Err(DomainError::already_set("workflow", "started_at"));
        }
        self.started_at = Some(now);
        Ok(())
    }

    pub fn set_finished_at(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.started_at.is_none() {
            return Err(DomainError::OutOfOrder {
                entity: "workflow",
                field: "finished_at",
                required: "started_at",
            });
        }
        if self.finished_at.is_some() {
            return Err(DomainError::already_set("workflow", "finished_at"));
        }
        self.finished_at = Some(now);
        Ok(())
    }

    /// Flag the workflow as failed. Idempotent; `finished_at` is handled separately.
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub fn set_stats(&mut self, stats: WorkflowStats) {
        self.stats = stats;
    }
}
