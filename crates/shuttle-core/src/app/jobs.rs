//! JobService - ジョブ投入 API
//!
//! 投入時に workflow 名とスケジュールを検証し、pending の Job を保存します。
//! start task の id はこの時点で確保しますが、enqueue は JobStarter が行います。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::info;

use super::context::EngineContext;
use super::status::{LiveStats, WorkerProgress};
use crate::domain::{Job, JobId, JobStatus, Params};
use crate::error::EngineError;

#[derive(Clone)]
pub struct JobService {
    ctx: EngineContext,
}

impl JobService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub async fn submit_job(
        &self,
        workflow_name: &str,
        start_after: Option<DateTime<Utc>>,
        finish_before: Option<DateTime<Utc>>,
        params: Params,
    ) -> Result<JobId, EngineError> {
        self.ctx.catalog.require(workflow_name)?;
        let job = Job::new(
            self.ctx.ids.job_id(),
            workflow_name,
            self.ctx.ids.task_id(),
            params,
            start_after,
            finish_before,
            self.ctx.clock.now(),
        )?;
        self.ctx.repository.save_job(&job).await?;
        info!(job_id = %job.job_id(), workflow = workflow_name, start_after = %job.start_after(), "job submitted");
        Ok(job.job_id())
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<JobStatus, EngineError> {
        self.load(job_id).await.map(|job| job.status())
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobId>, EngineError> {
        Ok(self.ctx.repository.list_jobs().await?)
    }

    pub async fn live_stats(&self, job_id: JobId) -> Result<LiveStats, EngineError> {
        let job = self.load(job_id).await?;
        let mut workers = BTreeMap::new();

        if let Some(workflow_id) = job.workflow_id() {
            let graph = self.ctx.catalog.require(job.workflow_name())?;
            let tasks = self.ctx.repository.list_tasks_for_workflow(workflow_id).await?;
            for step in graph.steps() {
                let total = tasks.iter().filter(|t| t.worker() == step).count();
                let waiting = self.ctx.queue.count(step, Some(workflow_id)).await?;
                workers.insert(
                    step.to_string(),
                    WorkerProgress {
                        done: total.saturating_sub(waiting),
                        waiting,
                    },
                );
            }
        }

        Ok(LiveStats {
            job_id,
            workflow_id: job.workflow_id(),
            state: job.state(),
            workers,
        })
    }

    async fn load(&self, job_id: JobId) -> Result<Job, EngineError> {
        self.ctx
            .repository
            .load_job(job_id)
            .await?
            .ok_or(EngineError::JobNotFound(job_id))
    }
}
