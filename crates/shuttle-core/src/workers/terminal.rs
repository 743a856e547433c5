//! TerminalWorker - the `end` step of a workflow.
//!
//! 何も出力しません。sentinel が end step に届いたときの workflow 終了処理
//! （finished_at, stats, job の完了）は worker loop が行います。

use async_trait::async_trait;

use super::{WorkContext, Worker, WorkerError};
use crate::domain::{Task, TaskResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalWorker;

#[async_trait]
impl Worker for TerminalWorker {
    async fn work(&self, _task: Task, _ctx: &WorkContext) -> Result<TaskResult, WorkerError> {
        Ok(TaskResult::success())
    }

    async fn work_end(&self, _end: Task, _ctx: &WorkContext) -> Result<TaskResult, WorkerError> {
        Ok(TaskResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Outcome, StepGraph, WorkflowCatalog};
    use crate::workers::testing::Fixture;

    #[tokio::test]
    async fn swallows_sentinels() {
        let fx = Fixture::new(WorkflowCatalog::new().with(StepGraph::new("w", "a", "end")));
        let ctx = fx.ctx("end", "w");
        let end = ctx.end_child(&fx.root("a"), "end");

        let result = TerminalWorker.work_end(end, &ctx).await.unwrap();
        assert_eq!(result.outcome, Outcome::Success);
        assert!(result.next_tasks.is_empty());
    }
}
