//! Demo workers: split -> square x N -> join -> sum -> end.

use async_trait::async_trait;
use shuttle_core::{NEXT, Params, Task, TaskResult, WorkContext, Worker, WorkerError};
use tracing::info;

/// Blob cache key the sum worker writes its result to.
pub fn sum_key(workflow_id: impl std::fmt::Display) -> String {
    format!("sum/{workflow_id}")
}

/// Emits `count` tasks carrying `n = 0..count`; the join waits for all of them.
pub struct SplitWorker;

#[async_trait]
impl Worker for SplitWorker {
    async fn work(&self, task: Task, ctx: &WorkContext) -> Result<TaskResult, WorkerError> {
        let params = task
            .params()
            .ok_or_else(|| WorkerError::Argument("split needs a 'count' parameter".into()))?;
        let count = params.require_i64("count")?;
        if count <= 0 {
            return Err(WorkerError::Argument(format!("count must be positive, got {count}")));
        }
        let branches = (0..count)
            .map(|n| Params::new().with("n", n))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TaskResult::success_with(ctx.fan_out(&task, NEXT, branches)))
    }
}

/// Squares `n`, then closes its branch with an end sentinel.
pub struct SquareWorker;

#[async_trait]
impl Worker for SquareWorker {
    async fn work(&self, task: Task, ctx: &WorkContext) -> Result<TaskResult, WorkerError> {
        let n = task
            .params()
            .ok_or_else(|| WorkerError::Argument("square needs 'n'".into()))?
            .require_i64("n")?;
        let value = n
            .checked_mul(n)
            .ok_or_else(|| WorkerError::Business(format!("{n} squared overflows")))?;
        Ok(TaskResult::success_with(vec![
            ctx.child(&task, NEXT, Params::new().with("value", value)?),
            ctx.end_child(&task, NEXT),
        ]))
    }
}

/// Sums the joined `value` list and stores the result in the blob cache.
pub struct SumWorker;

#[async_trait]
impl Worker for SumWorker {
    async fn work(&self, task: Task, ctx: &WorkContext) -> Result<TaskResult, WorkerError> {
        let values = task
            .params()
            .ok_or_else(|| WorkerError::Argument("sum needs 'value'".into()))?
            .require_list("value")?;
        let total: i64 = values.iter().filter_map(|v| v.as_i64()).sum();
        ctx.blobs()
            .put(&sum_key(task.workflow_id()), total.to_string().into_bytes())
            .await?;
        info!(workflow_id = %task.workflow_id(), inputs = values.len(), total, "sum computed");
        Ok(TaskResult::success())
    }
}
