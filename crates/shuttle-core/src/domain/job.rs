//! Job record and status management.
//!
//! A job is a request to run one instance of a named workflow.
//! Lifecycle: `Pending -> Started -> Finished`, or `Failed` from either
//! pending (deadline missed) or started (unrecoverable worker error).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::ids::{JobId, TaskId, WorkflowId};
use super::params::Params;
use super::workflow::WorkflowStats;

/// Job state derived from the record's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Submitted; start task not enqueued yet.
    Pending,

    /// Start task enqueued, workflow running.
    Started,

    /// End sentinel reached the terminal worker.
    Finished,

    Failed,
}

/// Job record.
///
/// Design: state transitions via methods, never by field access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    job_id: JobId,
    workflow_name: String,

    /// Allocated at submission so the id is known before the workflow starts.
    start_task_id: TaskId,
    workflow_id: Option<WorkflowId>,

    /// Initial parameters for the start task.
    #[serde(default)]
    params: Params,

    created_at: DateTime<Utc>,
    start_after: DateTime<Utc>,
    finish_before: Option<DateTime<Utc>>,

    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<String>,

    #[serde(default)]
    stats: WorkflowStats,
}

impl Job {
    /// Create a pending job. `start_after` defaults to `now`.
    pub fn new(
        job_id: JobId,
        workflow_name: impl Into<String>,
        start_task_id: TaskId,
        params: Params,
        start_after: Option<DateTime<Utc>>,
        finish_before: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let start_after = start_after.unwrap_or(now);
        if let Some(deadline) = finish_before
            && deadline <= start_after
        {
            return Err(DomainError::InvalidSchedule);
        }
        Ok(Self {
            job_id,
            workflow_name: workflow_name.into(),
            start_task_id,
            workflow_id: None,
            params,
            created_at: now,
            start_after,
            finish_before,
            started_at: None,
            finished_at: None,
            failed: false,
            failure: None,
            stats: WorkflowStats::default(),
        })
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn start_task_id(&self) -> TaskId {
        self.start_task_id
    }

    pub fn workflow_id(&self) -> Option<WorkflowId> {
        self.workflow_id
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn start_after(&self) -> DateTime<Utc> {
        self.start_after
    }

    pub fn finish_before(&self) -> Option<DateTime<Utc>> {
        self.finish_before
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn stats(&self) -> &WorkflowStats {
        &self.stats
    }

    pub fn state(&self) -> JobState {
        if self.failed {
            JobState::Failed
        } else if self.finished_at.is_some() {
            JobState::Finished
        } else if self.started_at.is_some() {
            JobState::Started
        } else {
            JobState::Pending
        }
    }

    /// Pending and allowed to start at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state() == JobState::Pending && self.start_after <= now
    }

    pub fn is_deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.finish_before.is_some_and(|deadline| now >= deadline)
    }

    /// Bind the workflow instance before its start task is enqueued.
    /// The job stays pending. Binding the same id again is a no-op.
    pub fn assign_workflow(&mut self, workflow_id: WorkflowId) -> Result<(), DomainError> {
        match self.workflow_id {
            Some(bound) if bound != workflow_id => {
                Err(DomainError::already_set("job", "workflow_id"))
            }
            _ => {
                self.workflow_id = Some(workflow_id);
                Ok(())
            }
        }
    }

    /// Record that the start task has been enqueued.
    pub fn mark_started(
        &mut self,
        workflow_id: WorkflowId,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.started_at.is_some() {
            return Err(DomainError::already_set("job", "started_at"));
        }
        self.assign_workflow(workflow_id)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn mark_finished(
        &mut self,
        now: DateTime<Utc>,
        stats: WorkflowStats,
    ) -> Result<(), DomainError> {
        if self.started_at.is_none() {
            return Err(DomainError::OutOfOrder {
                entity: "job",
                field: "finished_at",
                required: "started_at",
            });
        }
        if self.finished_at.is_some() {
            return Err(DomainError::already_set("job", "finished_at"));
        }
        self.finished_at = Some(now);
        self.stats = stats;
        Ok(())
    }

    /// Flag the job as failed. The first reason wins.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.failed = true;
        if self.failure.is_none() {
            self.failure = Some(reason.into());
        }
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            job_id: self.job_id,
            workflow_name: self.workflow_name.clone(),
            workflow_id: self.workflow_id,
            state: self.state(),
            start_after: self.start_after,
            finish_before: self.finish_before,
            started_at: self.started_at,
            finished_at: self.finished_at,
            failure: self.failure.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Job status for API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub workflow_name: String,
    pub workflow_id: Option<WorkflowId>,
    pub state: JobState,
    pub start_after: DateTime<Utc>,
    pub finish_before: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub stats: WorkflowStats,
}
