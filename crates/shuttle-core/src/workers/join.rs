//! JoinWorker - fan-in of parallel branches.
//!
//! データタスクは到着しても何も出力しません（履歴に残るだけ）。
//! end sentinel が届くたびに到着を repository に記録し、
//! 記録順で N 番目の sentinel を処理した呼び出しだけが合流タスクを出力します。
//!
//! N は sentinel に刻まれた fan-out の幅（[`WorkContext::fan_out`]）。
//! 幅が刻まれていなければ step graph の `joins.<tag>` を使います。
//! N を超えた sentinel はエラーで、workflow を失敗させます。
//!
//! 各ブランチはデータタスクを sentinel より先に publish するので、
//! N 番目の sentinel を見た時点で全ブランチのデータは履歴にあります。

use async_trait::async_trait;
use tracing::debug;

use super::{NEXT, WorkContext, Worker, WorkerError};
use crate::domain::{ParamValue, Params, Task, TaskResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct JoinWorker;

impl JoinWorker {
    /// Every parameter name becomes a list of the siblings' values, in
    /// sibling creation order.
    fn merge_params(siblings: &[Task]) -> Result<Params, WorkerError> {
        let mut merged: Vec<(String, Vec<ParamValue>)> = Vec::new();
        for params in siblings.iter().filter_map(Task::params) {
            for param in params {
                match merged.iter_mut().find(|(name, _)| *name == param.name) {
                    Some((_, values)) => values.push(param.value.clone()),
                    None => merged.push((param.name.clone(), vec![param.value.clone()])),
                }
            }
        }

        let mut params = Params::new();
        for (name, values) in merged {
            params.insert(name, ParamValue::List(values))?;
        }
        Ok(params)
    }
}

#[async_trait]
impl Worker for JoinWorker {
    async fn work(&self, _task: Task, _ctx: &WorkContext) -> Result<TaskResult, WorkerError> {
        Ok(TaskResult::success())
    }

    async fn work_end(&self, end: Task, ctx: &WorkContext) -> Result<TaskResult, WorkerError> {
        let expected = match end.fan_out_width() {
            Some(width) => width,
            None => ctx.graph().map_or(1, |g| g.join_inputs(ctx.tag())),
        };
        let arrivals = ctx
            .history()
            .record_join_arrival(end.workflow_id(), ctx.tag(), end.id())
            .await?;
        let position = arrivals
            .iter()
            .position(|id| *id == end.id())
            .map_or(0, |index| index + 1);

        if position > expected {
            return Err(WorkerError::Business(format!(
                "join '{}' received sentinel {position} but expects {expected}",
                ctx.tag()
            )));
        }
        if position < expected {
            debug!(
                worker = ctx.tag(),
                workflow_id = %end.workflow_id(),
                position,
                expected,
                "join waiting for more sentinels"
            );
            return Ok(TaskResult::success());
        }

        let siblings: Vec<Task> = ctx
            .history()
            .list_for_worker(end.workflow_id(), ctx.tag())
            .await?
            .into_iter()
            .filter(|task| !task.is_end())
            .collect();
        if siblings.is_empty() {
            return Err(WorkerError::Business(format!(
                "join '{}' has no upstream tasks",
                ctx.tag()
            )));
        }

        let params = Self::merge_params(&siblings)?;
        let joined_ids = siblings.iter().map(Task::id).collect();
        let joined = ctx.joined(&end, joined_ids, NEXT, params);
        let mut forwarded = ctx.end_child(&end, NEXT);
        forwarded.close_fan_out();
        debug!(
            worker = ctx.tag(),
            workflow_id = %end.workflow_id(),
            merged = siblings.len(),
            "join complete"
        );
        Ok(TaskResult::success_with(vec![joined, forwarded]))
    }
}
