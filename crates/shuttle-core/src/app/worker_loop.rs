//! WorkerLoop - タスク実行ループ
//!
//! # フロー（1 ステップ）
//! 1. LEASING: fair-share で workflow を選び、その workflow のタスクを 1 件 lease
//!    （なければ workflow を限定せずに lease）
//! 2. 終了・失敗済みの workflow のタスクは実行せずに削除
//! 3. EXECUTING: worker を実行（panic は EXCEPTION として扱う）
//! 4. PUBLISHING: SUCCESS のときだけ successor を step graph で解決して enqueue
//! 5. DELETING: 元の lease を削除
//!
//! ストレージ/キューのエラーで途中終了した場合は lease を削除しないので、
//! lease の期限切れ後に再配送されます。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use super::context::EngineContext;
use super::workflows::WorkflowService;
use crate::domain::{Outcome, Task, TaskId, TaskResult, WorkflowInstance};
use crate::error::EngineError;
use crate::ports::LeasedEntry;
use crate::scheduler::FairShareScheduler;
use crate::workers::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Leasing,
    Executing,
    Publishing,
    Deleting,
    Stopped,
}

/// What one step of the loop did.
#[derive(Debug, Clone, PartialEq)]
pub enum Processed {
    /// Nothing to lease.
    Idle,
    /// Entry deleted without running the worker.
    Discarded { task_id: Option<TaskId> },
    Completed {
        task_id: TaskId,
        outcome: Outcome,
        published: usize,
    },
}

pub struct WorkerLoop {
    tag: String,
    instance: usize,
    worker: Arc<dyn Worker>,
    ctx: EngineContext,
    workflows: WorkflowService,
    scheduler: Option<Arc<FairShareScheduler>>,
}

impl WorkerLoop {
    pub fn new(
        tag: impl Into<String>,
        instance: usize,
        worker: Arc<dyn Worker>,
        ctx: EngineContext,
        workflows: WorkflowService,
    ) -> Self {
        Self {
            tag: tag.into(),
            instance,
            worker,
            ctx,
            workflows,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<FairShareScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn transition(&self, state: WorkerState) {
        trace!(worker = %self.tag, instance = self.instance, ?state, "worker state");
    }

    /// Lease and fully process at most one entry.
    pub async fn process_once(&self) -> Result<Processed, EngineError> {
        self.transition(WorkerState::Leasing);
        match self.lease().await? {
            Some(entry) => self.process_entry(entry).await,
            None => Ok(Processed::Idle),
        }
    }

    async fn lease(&self) -> Result<Option<LeasedEntry>, EngineError> {
        let timeout = self.ctx.settings.lease_timeout();
        let preferred = self.scheduler.as_ref().and_then(|s| s.pick(&self.tag));
        if let Some(workflow_id) = preferred {
            let mut leased = self
                .ctx
                .queue
                .lease(timeout, 1, &self.tag, Some(workflow_id))
                .await?;
            if let Some(entry) = leased.pop() {
                return Ok(Some(entry));
            }
        }
        let mut leased = self.ctx.queue.lease(timeout, 1, &self.tag, None).await?;
        Ok(leased.pop())
    }

    /// Process an entry this instance already holds a lease on.
    pub async fn process_entry(&self, entry: LeasedEntry) -> Result<Processed, EngineError> {
        let task = match entry.decode() {
            Ok(task) => task,
            Err(err) => {
                error!(worker = %self.tag, handle = %entry.handle, error = %err, "undecodable queue entry dropped");
                self.ctx.queue.delete(entry.handle).await?;
                return Ok(Processed::Discarded { task_id: None });
            }
        };
        let span = info_span!(
            "task",
            worker = %self.tag,
            task_id = %task.id(),
            workflow_id = %task.workflow_id(),
            kind = task.kind_name(),
        );
        if let Some(previous) = entry.previous_lease {
            // 前回の lease が delete されずに切れた
            warn!(parent: &span, previous_lease = %previous, "task redelivered");
        }
        self.handle(entry, task).instrument(span).await
    }

    async fn handle(&self, entry: LeasedEntry, task: Task) -> Result<Processed, EngineError> {
        let workflow = self
            .ctx
            .repository
            .load_workflow(task.workflow_id())
            .await?
            .filter(WorkflowInstance::is_active);
        let Some(workflow) = workflow else {
            debug!("workflow is no longer running, task discarded");
            self.ctx.queue.delete(entry.handle).await?;
            return Ok(Processed::Discarded {
                task_id: Some(task.id()),
            });
        };
        let graph = self.ctx.catalog.require(workflow.name())?;

        self.ctx
            .history
            .record_started(&task, self.ctx.clock.now())
            .await?;

        self.transition(WorkerState::Executing);
        let TaskResult {
            outcome,
            next_tasks,
            message,
        } = self.execute(&task, workflow.name()).await;
        // 後続より先に書く（workflow の集計に必ず含まれるように）
        self.ctx
            .history
            .record_finished(task.id(), self.ctx.clock.now())
            .await?;

        let mut published = 0;
        if outcome.is_success() {
            self.transition(WorkerState::Publishing);
            for mut next in next_tasks {
                let to = graph.resolve_step(&self.tag, next.worker()).to_string();
                next.route_to(to);
                self.ctx.history.save(&next).await?;
                self.ctx.queue.add(&next).await?;
                published += 1;
            }
        } else {
            let message = message.unwrap_or_default();
            warn!(?outcome, %message, "task did not succeed, failing workflow");
            self.workflows
                .fail(task.workflow_id(), &format!("{} {:?}: {}", self.tag, outcome, message))
                .await?;
        }

        if outcome.is_success() && task.is_end() && graph.is_end_step(&self.tag) {
            self.workflows.finish(task.workflow_id()).await?;
        }

        self.transition(WorkerState::Deleting);
        if !self.ctx.queue.delete(entry.handle).await? {
            warn!(handle = %entry.handle, "lease was lost before delete");
        }
        debug!(?outcome, published, "task processed");
        Ok(Processed::Completed {
            task_id: task.id(),
            outcome,
            published,
        })
    }

    async fn execute(&self, task: &Task, workflow_name: &str) -> TaskResult {
        let worker = Arc::clone(&self.worker);
        let ctx = self.ctx.work_context(&self.tag, workflow_name);
        let task = task.clone();
        let run = tokio::spawn(async move {
            if task.is_end() {
                worker.work_end(task, &ctx).await
            } else {
                worker.work(task, &ctx).await
            }
        });
        match run.await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => err.into_result(),
            Err(join_error) => TaskResult::exception(format!("worker panicked: {join_error}")),
        }
    }

    /// Loop until `cancel` fires. An in-flight step always completes.
    pub async fn run(self, cancel: CancellationToken) {
        info!(worker = %self.tag, instance = self.instance, "worker loop started");
        let backoff = self.ctx.settings.idle_backoff();
        while !cancel.is_cancelled() {
            self.transition(WorkerState::Idle);
            let idle = match self.process_once().await {
                Ok(Processed::Idle) => true,
                Ok(_) => false,
                Err(err) => {
                    error!(worker = %self.tag, error = %err, kind = ?err.kind(), "worker step failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }
        self.transition(WorkerState::Stopped);
        info!(worker = %self.tag, instance = self.instance, "worker loop stopped");
    }
}
