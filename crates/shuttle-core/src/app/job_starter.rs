//! JobStarter - 開始時刻を過ぎた pending job を起動する周期ループ
//!
//! # 1 ジョブの起動手順
//! 1. 期限（finish_before）を過ぎていれば失敗として記録して終わり
//! 2. workflow id を決めて pending のまま Job に保存
//! 3. WorkflowInstance を作成（started_at を一度だけ書く）
//! 4. start task を履歴に保存して enqueue
//! 5. enqueue できてから Job を started にし、observer に通知
//!
//! 2 以降で落ちた場合、次の tick で同じ job が同じ workflow id のまま
//! もう一度起動されます。4 と 5 の間で落ちた場合は start task が
//! 二重に enqueue されます（at-least-once）。

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::EngineContext;
use super::workflows::WorkflowService;
use crate::domain::{Job, JobId, Task};
use crate::error::EngineError;
use crate::ports::WorkflowEvent;

pub struct JobStarter {
    ctx: EngineContext,
    workflows: WorkflowService,
}

impl JobStarter {
    pub fn new(ctx: EngineContext, workflows: WorkflowService) -> Self {
        Self { ctx, workflows }
    }

    /// Start every due job. Returns the number of jobs started.
    pub async fn tick(&self) -> Result<usize, EngineError> {
        let now = self.ctx.clock.now();
        let due = self.ctx.repository.list_jobs_due_to_start(now).await?;
        let mut started = 0;
        for job in due {
            let job_id = job.job_id();
            match self.start_job(job).await {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(error) if error.is_transient() => {
                    warn!(%job_id, %error, "job start deferred to next tick");
                }
                Err(error) => {
                    error!(%job_id, %error, "job could not be started");
                    self.fail_job(job_id, &error.to_string()).await?;
                }
            }
        }
        Ok(started)
    }

    async fn start_job(&self, mut job: Job) -> Result<bool, EngineError> {
        let now = self.ctx.clock.now();
        if job.is_deadline_passed(now) {
            job.mark_failed("deadline passed before the job could start");
            self.ctx.repository.save_job(&job).await?;
            warn!(job_id = %job.job_id(), "job missed its deadline");
            return Ok(false);
        }

        let graph = self.ctx.catalog.require(job.workflow_name())?;
        let workflow_id = match job.workflow_id() {
            Some(workflow_id) => {
                debug!(job_id = %job.job_id(), %workflow_id, "resuming interrupted job start");
                workflow_id
            }
            None => {
                let workflow_id = self.ctx.ids.workflow_id();
                job.assign_workflow(workflow_id)?;
                self.ctx.repository.save_job(&job).await?;
                workflow_id
            }
        };
        let workflow = match self.ctx.repository.load_workflow(workflow_id).await? {
            Some(workflow) => workflow,
            None => self.workflows.create(workflow_id, graph.name()).await?,
        };

        let start = Task::start(
            job.start_task_id(),
            workflow_id,
            graph.start(),
            job.params().clone(),
            now,
        );
        self.ctx.history.save(&start).await?;
        self.ctx.queue.add(&start).await?;

        job.mark_started(workflow_id, now)?;
        self.ctx.repository.save_job(&job).await?;
        info!(job_id = %job.job_id(), %workflow_id, workflow = graph.name(), "job started");

        self.workflows.notify(&WorkflowEvent::started(&workflow)).await;
        Ok(true)
    }

    async fn fail_job(&self, job_id: JobId, reason: &str) -> Result<(), EngineError> {
        if let Some(mut job) = self.ctx.repository.load_job(job_id).await? {
            job.mark_failed(reason);
            self.ctx.repository.save_job(&job).await?;
        }
        Ok(())
    }

    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        info!(?interval, "job starter started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(0) => {}
                        Ok(started) => debug!(started, "job starter tick"),
                        Err(error) => warn!(%error, "job starter tick failed"),
                    }
                }
            }
        }
        info!("job starter stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use tokio::sync::Mutex;

    use super::*;
    use crate::app::jobs::JobService;
    use crate::config::EngineSettings;
    use crate::domain::{JobState, Params, StepGraph, WorkflowCatalog};
    use crate::ports::{Clock, FixedClock, WorkflowObserver};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<WorkflowEvent>>);

    #[async_trait::async_trait]
    impl WorkflowObserver for Recorder {
        async fn on_workflow_event(&self, event: &WorkflowEvent) {
            self.0.lock().await.push(event.clone());
        }
    }

    struct Fixture {
        ctx: EngineContext,
        clock: Arc<FixedClock>,
        jobs: JobService,
        starter: JobStarter,
        recorder: Arc<Recorder>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap()));
        let catalog = WorkflowCatalog::new().with(StepGraph::new("squares", "split", "end"));
        let ctx = EngineContext::in_memory_with_clock(catalog, EngineSettings::default(), clock.clone());
        let recorder = Arc::new(Recorder::default());
        let workflows = WorkflowService::new(ctx.repository.clone(), ctx.clock.clone())
            .with_observer(recorder.clone());
        Fixture {
            jobs: JobService::new(ctx.clone()),
            starter: JobStarter::new(ctx.clone(), workflows),
            ctx,
            clock,
            recorder,
        }
    }

    #[tokio::test]
    async fn due_job_is_started_and_its_start_task_enqueued() {
        let fx = fixture();
        let params = Params::new().with("count", 3).unwrap();
        let job_id = fx.jobs.submit_job("squares", None, None, params).await.unwrap();

        assert_eq!(fx.starter.tick().await.unwrap(), 1);

        let status = fx.jobs.get_job(job_id).await.unwrap();
        assert_eq!(status.state, JobState::Started);
        let workflow_id = status.workflow_id.unwrap();
        assert_eq!(fx.ctx.queue.count("split", Some(workflow_id)).await.unwrap(), 1);

        let workflow = fx.ctx.repository.load_workflow(workflow_id).await.unwrap().unwrap();
        assert!(workflow.is_active());
        assert_eq!(fx.recorder.0.lock().await.len(), 1);

        // 二度目の tick では何も起動しない
        assert_eq!(fx.starter.tick().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn job_waits_for_start_after() {
        let fx = fixture();
        let start_after = fx.clock.now() + ChronoDuration::minutes(1);
        let job_id = fx
            .jobs
            .submit_job("squares", Some(start_after), None, Params::new())
            .await
            .unwrap();

        assert_eq!(fx.starter.tick().await.unwrap(), 0);
        fx.clock.advance(ChronoDuration::minutes(1));
        assert_eq!(fx.starter.tick().await.unwrap(), 1);
        assert_eq!(fx.jobs.get_job(job_id).await.unwrap().state, JobState::Started);
    }

    #[tokio::test]
    async fn missed_deadline_fails_the_job() {
        let fx = fixture();
        let deadline = fx.clock.now() + ChronoDuration::seconds(5);
        let job_id = fx
            .jobs
            .submit_job("squares", None, Some(deadline), Params::new())
            .await
            .unwrap();

        fx.clock.advance(ChronoDuration::seconds(10));
        assert_eq!(fx.starter.tick().await.unwrap(), 0);

        let status = fx.jobs.get_job(job_id).await.unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert!(fx.recorder.0.lock().await.is_empty());
        assert_eq!(fx.ctx.queue.count("split", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn interrupted_start_resumes_with_the_same_workflow() {
        let fx = fixture();
        let job_id = fx.jobs.submit_job("squares", None, None, Params::new()).await.unwrap();

        // 前回の起動が enqueue の後、Job を started にする前に落ちた状態
        let mut job = fx.ctx.repository.load_job(job_id).await.unwrap().unwrap();
        let workflow_id = fx.ctx.ids.workflow_id();
        job.assign_workflow(workflow_id).unwrap();
        fx.ctx.repository.save_job(&job).await.unwrap();
        WorkflowService::new(fx.ctx.repository.clone(), fx.ctx.clock.clone())
            .create(workflow_id, "squares")
            .await
            .unwrap();
        let start = Task::start(job.start_task_id(), workflow_id, "split", Params::new(), fx.clock.now());
        fx.ctx.history.save(&start).await.unwrap();
        fx.ctx.queue.add(&start).await.unwrap();
        assert_eq!(fx.jobs.get_job(job_id).await.unwrap().state, JobState::Pending);

        assert_eq!(fx.starter.tick().await.unwrap(), 1);

        let status = fx.jobs.get_job(job_id).await.unwrap();
        assert_eq!(status.state, JobState::Started);
        assert_eq!(status.workflow_id, Some(workflow_id));
        assert_eq!(
            fx.ctx.queue.count("split", None).await.unwrap(),
            fx.ctx.queue.count("split", Some(workflow_id)).await.unwrap()
        );
        let task = fx.ctx.history.load(job.start_task_id()).await.unwrap().unwrap();
        assert_eq!(task.workflow_id(), workflow_id);
        let events = fx.recorder.0.lock().await;
        assert!(matches!(
            events.as_slice(),
            [WorkflowEvent::Started { workflow_id: started, .. }] if *started == workflow_id
        ));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let fx = fixture();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(fx.starter.run(std::time::Duration::from_millis(10), cancel.clone()));
        cancel.cancel();
        handle.await.unwrap();
    }
}
