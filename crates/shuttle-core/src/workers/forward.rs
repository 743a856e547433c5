//! ForwardWorker - passes every task on to the next step unchanged.

use async_trait::async_trait;

use super::{NEXT, WorkContext, Worker, WorkerError};
use crate::domain::{Task, TaskResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardWorker;

#[async_trait]
impl Worker for ForwardWorker {
    async fn work(&self, task: Task, ctx: &WorkContext) -> Result<TaskResult, WorkerError> {
        let params = task.params().cloned().unwrap_or_default();
        Ok(TaskResult::success_with(vec![ctx.child(&task, NEXT, params)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Params, StepGraph, WorkflowCatalog};
    use crate::workers::testing::Fixture;

    #[tokio::test]
    async fn forwards_params_and_sentinels() {
        let fx = Fixture::new(WorkflowCatalog::new().with(StepGraph::new("w", "forward", "end")));
        let ctx = fx.ctx("forward", "w");
        let root = fx.root("forward");
        let task = ctx.child(&root, "forward", Params::new().with("k", "v").unwrap());

        let result = ForwardWorker.work(task.clone(), &ctx).await.unwrap();
        assert_eq!(result.next_tasks.len(), 1);
        let next = &result.next_tasks[0];
        assert_eq!(next.worker(), NEXT);
        assert_eq!(next.parent_id(), Some(task.id()));
        assert_eq!(next.params(), task.params());

        let end = ctx.end_child(&root, "forward");
        let result = ForwardWorker.work_end(end, &ctx).await.unwrap();
        assert!(result.next_tasks[0].is_end());
    }
}
