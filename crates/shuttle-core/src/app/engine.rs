//! Engine - 組み立て済みのエンジンと、その起動・停止
//!
//! `spawn()` で以下を起動します（すべて同じ CancellationToken を共有）:
//! - worker pool ごとの WorkerGroup（threads 本の WorkerLoop）
//! - JobStarter
//! - SchedulerLoop
//!
//! 停止は `EngineHandle::shutdown_and_join()`。実行中のタスクは最後まで走り、
//! 新しい lease は取りません。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::context::EngineContext;
use super::job_starter::JobStarter;
use super::jobs::JobService;
use super::registry::WorkerRegistry;
use super::scheduler_loop::SchedulerLoop;
use super::status::LiveStats;
use super::worker_group::WorkerGroup;
use super::worker_loop::WorkerLoop;
use super::workflows::WorkflowService;
use crate::domain::{JobId, JobStatus, Params};
use crate::error::EngineError;
use crate::scheduler::FairShareScheduler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PoolSpec {
    pub tag: String,
    pub factory: String,
    pub threads: usize,
}

pub struct Engine {
    ctx: EngineContext,
    registry: WorkerRegistry,
    pools: Vec<PoolSpec>,
    scheduler: Arc<FairShareScheduler>,
    workflows: WorkflowService,
    jobs: JobService,
}

impl Engine {
    pub(crate) fn new(
        ctx: EngineContext,
        registry: WorkerRegistry,
        pools: Vec<PoolSpec>,
        scheduler: Arc<FairShareScheduler>,
        workflows: WorkflowService,
    ) -> Self {
        Self {
            jobs: JobService::new(ctx.clone()),
            ctx,
            registry,
            pools,
            scheduler,
            workflows,
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn jobs(&self) -> &JobService {
        &self.jobs
    }

    pub fn scheduler(&self) -> &Arc<FairShareScheduler> {
        &self.scheduler
    }

    pub async fn submit_job(
        &self,
        workflow_name: &str,
        start_after: Option<DateTime<Utc>>,
        finish_before: Option<DateTime<Utc>>,
        params: Params,
    ) -> Result<JobId, EngineError> {
        self.jobs
            .submit_job(workflow_name, start_after, finish_before, params)
            .await
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<JobStatus, EngineError> {
        self.jobs.get_job(job_id).await
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobId>, EngineError> {
        self.jobs.list_jobs().await
    }

    pub async fn live_stats(&self, job_id: JobId) -> Result<LiveStats, EngineError> {
        self.jobs.live_stats(job_id).await
    }

    /// Restore the fair-share tables and start every loop.
    pub async fn spawn(&self) -> Result<EngineHandle, EngineError> {
        self.scheduler.restore().await?;
        let cancel = CancellationToken::new();
        let settings = self.ctx.settings;

        let mut groups = Vec::with_capacity(self.pools.len());
        for pool in &self.pools {
            let loops = (0..pool.threads)
                .map(|instance| -> Result<WorkerLoop, EngineError> {
                    let worker = self.registry.create(&pool.factory)?;
                    Ok(WorkerLoop::new(
                        pool.tag.clone(),
                        instance,
                        worker,
                        self.ctx.clone(),
                        self.workflows.clone(),
                    )
                    .with_scheduler(self.scheduler.clone()))
                })
                .collect::<Result<Vec<_>, EngineError>>()?;
            groups.push(WorkerGroup::spawn(pool.tag.clone(), loops, cancel.clone()));
        }

        let starter = JobStarter::new(self.ctx.clone(), self.workflows.clone());
        let scheduler_loop = SchedulerLoop::new(self.scheduler.clone(), settings.scheduler_interval());
        let background = vec![
            tokio::spawn(starter.run(settings.job_starter_interval(), cancel.clone())),
            tokio::spawn(scheduler_loop.run(cancel.clone())),
        ];

        info!(pools = groups.len(), "engine running");
        Ok(EngineHandle {
            cancel,
            groups,
            background,
        })
    }
}

pub struct EngineHandle {
    cancel: CancellationToken,
    groups: Vec<WorkerGroup>,
    background: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn request_shutdown(&self) {
        self.cancel.cancel();
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for group in self.groups {
            group.shutdown_and_join().await;
        }
        for join in self.background {
            if let Err(err) = join.await {
                warn!(error = %err, "background loop ended abnormally");
            }
        }
        info!("engine stopped");
    }
}
