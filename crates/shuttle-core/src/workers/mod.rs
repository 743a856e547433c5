//! Worker plugin contract and the built-in workers.
//!
//! Worker は `(Task) -> TaskResult` の純粋関数として書きます。
//! 外部リソース（blob cache, 履歴）には `WorkContext` 経由で読み取りアクセスします。
//! successor の宛先は symbolic な step 名（通常は [`NEXT`]）で返し、
//! worker loop が step graph で具体的な tag に解決します。
//!
//! # 組み込み worker
//! - `join`: fan-in（[`JoinWorker`]）
//! - `end`: workflow の終端（[`TerminalWorker`]）
//! - `forward`: 何もせず次へ渡す（[`ForwardWorker`]）

pub mod forward;
pub mod join;
pub mod terminal;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::app::history::TaskHistory;
use crate::domain::{
    DomainError, Outcome, Params, StepGraph, Task, TaskId, TaskResult, WorkflowCatalog,
};
use crate::ports::{BlobCache, BlobError, Clock, IdGenerator, StorageError};

pub use self::forward::ForwardWorker;
pub use self::join::JoinWorker;
pub use self::terminal::TerminalWorker;

/// Conventional symbolic name of "the next step".
pub const NEXT: &str = "next";

/// Failure raised by worker logic. Each variant maps to a non-success outcome.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Missing or malformed parameter.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Domain-level failure the worker detected itself.
    #[error("{0}")]
    Business(String),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl WorkerError {
    pub fn outcome(&self) -> Outcome {
        match self {
            WorkerError::Argument(_) => Outcome::ArgumentError,
            WorkerError::Business(_) => Outcome::Error,
            WorkerError::Unexpected(_) => Outcome::Exception,
        }
    }

    pub fn into_result(self) -> TaskResult {
        let message = self.to_string();
        match self.outcome() {
            Outcome::ArgumentError => TaskResult::argument_error(message),
            Outcome::Error => TaskResult::error(message),
            _ => TaskResult::exception(message),
        }
    }
}

impl From<DomainError> for WorkerError {
    fn from(error: DomainError) -> Self {
        WorkerError::Argument(error.to_string())
    }
}

impl From<StorageError> for WorkerError {
    fn from(error: StorageError) -> Self {
        WorkerError::Unexpected(error.to_string())
    }
}

impl From<BlobError> for WorkerError {
    fn from(error: BlobError) -> Self {
        match error {
            BlobError::AlreadyExists(_) => WorkerError::Business(error.to_string()),
            BlobError::Unavailable(_) => WorkerError::Unexpected(error.to_string()),
        }
    }
}

/// Read-only view of the engine handed to a worker for one task.
#[derive(Clone)]
pub struct WorkContext {
    tag: String,
    workflow_name: String,
    catalog: Arc<WorkflowCatalog>,
    history: TaskHistory,
    blobs: Arc<dyn BlobCache>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl WorkContext {
    pub fn new(
        tag: impl Into<String>,
        workflow_name: impl Into<String>,
        catalog: Arc<WorkflowCatalog>,
        history: TaskHistory,
        blobs: Arc<dyn BlobCache>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tag: tag.into(),
            workflow_name: workflow_name.into(),
            catalog,
            history,
            blobs,
            ids,
            clock,
        }
    }

    /// Worker tag this task was delivered to.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn graph(&self) -> Option<&StepGraph> {
        self.catalog.get(&self.workflow_name)
    }

    pub fn history(&self) -> &TaskHistory {
        &self.history
    }

    pub fn blobs(&self) -> &dyn BlobCache {
        self.blobs.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn next_task_id(&self) -> TaskId {
        self.ids.task_id()
    }

    /// Work task caused by `parent`, addressed to `to`.
    pub fn child(&self, parent: &Task, to: &str, params: Params) -> Task {
        Task::child(self.ids.task_id(), parent, to, params, self.now())
    }

    /// End sentinel caused by `parent`, addressed to `to`.
    pub fn end_child(&self, parent: &Task, to: &str) -> Task {
        Task::end_child(self.ids.task_id(), parent, to, self.now())
    }

    /// One work task per `Params`, each stamped with the branch count so the
    /// downstream join waits for exactly that many end sentinels.
    /// Every branch must close itself with one sentinel.
    pub fn fan_out(
        &self,
        parent: &Task,
        to: &str,
        branches: impl IntoIterator<Item = Params>,
    ) -> Vec<Task> {
        let mut tasks: Vec<Task> = branches
            .into_iter()
            .map(|params| self.child(parent, to, params))
            .collect();
        let width = tasks.len();
        for task in &mut tasks {
            task.open_fan_out(width);
        }
        tasks
    }

    pub fn joined(&self, parent: &Task, joined_ids: Vec<TaskId>, to: &str, params: Params) -> Task {
        Task::joined(self.ids.task_id(), parent, joined_ids, to, params, self.now())
    }
}

/// Worker plugin contract.
///
/// `work` receives start and work tasks, `work_end` receives end sentinels.
/// By default a sentinel is forwarded unchanged to [`NEXT`].
#[async_trait]
pub trait Worker: Send + Sync {
    async fn work(&self, task: Task, ctx: &WorkContext) -> Result<TaskResult, WorkerError>;

    async fn work_end(&self, end: Task, ctx: &WorkContext) -> Result<TaskResult, WorkerError> {
        Ok(TaskResult::success_with(vec![ctx.end_child(&end, NEXT)]))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for worker tests.

    use chrono::TimeZone;

    use super::*;
    use crate::domain::WorkflowId;
    use crate::impls::{InMemoryBlobCache, InMemoryRepository};
    use crate::ports::{FixedClock, UlidGenerator};

    pub(crate) struct Fixture {
        pub repo: Arc<InMemoryRepository>,
        pub history: TaskHistory,
        pub ids: Arc<dyn IdGenerator>,
        pub clock: Arc<FixedClock>,
        pub catalog: Arc<WorkflowCatalog>,
        pub workflow_id: WorkflowId,
    }

    impl Fixture {
        pub(crate) fn new(catalog: WorkflowCatalog) -> Self {
            let clock = Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            ));
            let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));
            let repo = Arc::new(InMemoryRepository::new());
            let history = TaskHistory::new(repo.clone(), ids.clone(), 4_096);
            let workflow_id = ids.workflow_id();
            Self {
                repo,
                history,
                ids,
                clock,
                catalog: Arc::new(catalog),
                workflow_id,
            }
        }

        pub(crate) fn ctx(&self, tag: &str, workflow_name: &str) -> WorkContext {
            WorkContext::new(
                tag,
                workflow_name,
                self.catalog.clone(),
                self.history.clone(),
                Arc::new(InMemoryBlobCache::new()),
                self.ids.clone(),
                self.clock.clone(),
            )
        }

        pub(crate) fn root(&self, tag: &str) -> Task {
            Task::start(
                self.ids.task_id(),
                self.workflow_id,
                tag,
                Params::new(),
                self.clock.now(),
            )
        }
    }
}
