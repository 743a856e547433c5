//! WorkflowService - workflow instance の開始・終了・失敗
//!
//! 開始・終了のたびに登録済みの WorkflowObserver（fair-share scheduler など）
//! に通知します。終了と失敗は冪等で、二度目の呼び出しは何もしません。

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{WorkflowId, WorkflowInstance, WorkflowStats};
use crate::error::EngineError;
use crate::ports::{Clock, Repository, WorkflowEvent, WorkflowObserver};

#[derive(Clone)]
pub struct WorkflowService {
    repository: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    observers: Vec<Arc<dyn WorkflowObserver>>,
}

impl WorkflowService {
    pub fn new(repository: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Persist a new, started instance. Observers are not notified yet.
    pub async fn create(
        &self,
        workflow_id: WorkflowId,
        name: &str,
    ) -> Result<WorkflowInstance, EngineError> {
        let mut workflow = WorkflowInstance::new(workflow_id, name);
        workflow.set_started_at(self.clock.now())?;
        self.repository.save_workflow(&workflow).await?;
        Ok(workflow)
    }

    /// Finish the workflow: write `finished_at`, aggregate stats from task
    /// history, finish the owning job and notify.
    ///
    /// Returns `None` when the workflow is unknown or already finished.
    pub async fn finish(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<WorkflowInstance>, EngineError> {
        let Some(mut workflow) = self.repository.load_workflow(workflow_id).await? else {
            warn!(%workflow_id, "finish requested for unknown workflow");
            return Ok(None);
        };
        if workflow.finished_at().is_some() {
            return Ok(None);
        }

        let now = self.clock.now();
        let tasks = self.repository.list_tasks_for_workflow(workflow_id).await?;
        let stats = WorkflowStats::from_tasks(&tasks);
        workflow.set_finished_at(now)?;
        workflow.set_stats(stats.clone());
        self.repository.save_workflow(&workflow).await?;

        if let Some(mut job) = self.repository.find_job_by_workflow(workflow_id).await?
            && job.finished_at().is_none()
        {
            job.mark_finished(now, stats)?;
            self.repository.save_job(&job).await?;
            info!(job_id = %job.job_id(), %workflow_id, "job finished");
        }

        self.notify(&WorkflowEvent::finished(&workflow)).await;
        Ok(Some(workflow))
    }

    /// Fail the whole workflow and its job.
    ///
    /// Returns `None` when the workflow is unknown or has already ended, either
    /// way. A late failure never overturns a finished job.
    pub async fn fail(
        &self,
        workflow_id: WorkflowId,
        reason: &str,
    ) -> Result<Option<WorkflowInstance>, EngineError> {
        let Some(mut workflow) = self.repository.load_workflow(workflow_id).await? else {
            warn!(%workflow_id, "fail requested for unknown workflow");
            return Ok(None);
        };
        if workflow.finished_at().is_some() {
            debug!(%workflow_id, failed = workflow.is_failed(), %reason, "workflow already ended, failure ignored");
            return Ok(None);
        }

        workflow.mark_failed();
        workflow.set_finished_at(self.clock.now())?;
        self.repository.save_workflow(&workflow).await?;

        if let Some(mut job) = self.repository.find_job_by_workflow(workflow_id).await? {
            job.mark_failed(reason);
            self.repository.save_job(&job).await?;
            warn!(job_id = %job.job_id(), %workflow_id, %reason, "job failed");
        }

        self.notify(&WorkflowEvent::finished(&workflow)).await;
        Ok(Some(workflow))
    }

    pub async fn notify(&self, event: &WorkflowEvent) {
        for observer in &self.observers {
            observer.on_workflow_event(event).await;
        }
    }
}
