//! Repository port - job / workflow / task の永続ストア
//!
//! Repository は以下を保持します：
//! - Job, WorkflowInstance, Task のレコード（id で上書き保存）
//! - out-of-line で保存された大きなパラメータ値
//! - join に到着した sentinel の記録
//! - fair-share scheduler が最後に計算した優先度テーブル
//!
//! トランザクションは要求しません。書き込み一回限りのフィールドは
//! ドメインモデル側の「未設定であること」のチェックで守ります。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    Job, JobId, ParamValue, Task, TaskId, ValueHandle, WorkflowId, WorkflowInstance,
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("record serialization failed: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("parameter value {0} is missing")]
    MissingValue(ValueHandle),
}

/// One row of a persisted fair-share table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityEntry {
    pub workflow_id: WorkflowId,
    pub workflow_name: String,
    pub weight: f64,
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn save_job(&self, job: &Job) -> Result<(), StorageError>;
    async fn load_job(&self, job_id: JobId) -> Result<Option<Job>, StorageError>;
    async fn list_jobs(&self) -> Result<Vec<JobId>, StorageError>;

    /// Pending jobs whose `start_after` is at or before `now`, oldest first.
    async fn list_jobs_due_to_start(&self, now: DateTime<Utc>) -> Result<Vec<Job>, StorageError>;

    async fn find_job_by_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<Job>, StorageError>;

    async fn save_workflow(&self, workflow: &WorkflowInstance) -> Result<(), StorageError>;
    async fn load_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<WorkflowInstance>, StorageError>;

    async fn save_task(&self, task: &Task) -> Result<(), StorageError>;
    async fn load_task(&self, task_id: TaskId) -> Result<Option<Task>, StorageError>;

    /// Every persisted task of the workflow, in creation order.
    async fn list_tasks_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<Task>, StorageError>;

    /// Persisted tasks of the workflow routed to `worker`, in creation order.
    async fn list_tasks_for_workflow_and_worker(
        &self,
        workflow_id: WorkflowId,
        worker: &str,
    ) -> Result<Vec<Task>, StorageError>;

    async fn save_parameter_value(
        &self,
        handle: ValueHandle,
        task_id: TaskId,
        name: &str,
        value: &ParamValue,
    ) -> Result<(), StorageError>;

    async fn load_parameter_value(
        &self,
        handle: ValueHandle,
    ) -> Result<Option<ParamValue>, StorageError>;

    /// Atomically record that the sentinel `task_id` reached join `worker`.
    ///
    /// Returns every recorded arrival in arrival order. Recording the same
    /// task twice does not change the list.
    async fn record_join_arrival(
        &self,
        workflow_id: WorkflowId,
        worker: &str,
        task_id: TaskId,
    ) -> Result<Vec<TaskId>, StorageError>;

    async fn save_priority_table(
        &self,
        tag: &str,
        entries: &[PriorityEntry],
    ) -> Result<(), StorageError>;

    async fn load_priority_tables(
        &self,
    ) -> Result<HashMap<String, Vec<PriorityEntry>>, StorageError>;
}
