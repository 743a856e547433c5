//! TaskHistory - 永続化されたタスク履歴
//!
//! Repository の上に薄く乗り、大きなパラメータ値を out-of-line で
//! 保存・復元します。worker から見える履歴は常に hydrate 済みです。
//!
//! タイムスタンプの更新（started/finished）は hydrate しない生レコードに
//! 対して行うので、保存済みの値を二重に書き出すことはありません。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{ParamValue, Task, TaskId, WorkflowId};
use crate::ports::{IdGenerator, Repository, StorageError};

#[derive(Clone)]
pub struct TaskHistory {
    repository: Arc<dyn Repository>,
    ids: Arc<dyn IdGenerator>,
    inline_limit: usize,
}

impl TaskHistory {
    pub fn new(repository: Arc<dyn Repository>, ids: Arc<dyn IdGenerator>, inline_limit: usize) -> Self {
        Self {
            repository,
            ids,
            inline_limit,
        }
    }

    /// Persist `task`, moving oversized parameter values out of line.
    pub async fn save(&self, task: &Task) -> Result<(), StorageError> {
        let mut stored = task.clone();
        if let Some(params) = stored.params_mut() {
            for param in params.values_mut() {
                if param.value.is_ref() || param.value.encoded_len() <= self.inline_limit {
                    continue;
                }
                let handle = self.ids.value_handle();
                self.repository
                    .save_parameter_value(handle, task.id(), &param.name, &param.value)
                    .await?;
                debug!(task_id = %task.id(), param = %param.name, %handle, "parameter stored out of line");
                param.value = ParamValue::Ref(handle);
            }
        }
        self.repository.save_task(&stored).await
    }

    pub async fn load(&self, task_id: TaskId) -> Result<Option<Task>, StorageError> {
        match self.repository.load_task(task_id).await? {
            Some(task) => Ok(Some(self.hydrate(task).await?)),
            None => Ok(None),
        }
    }

    pub async fn list_for_workflow(&self, workflow_id: WorkflowId) -> Result<Vec<Task>, StorageError> {
        let tasks = self.repository.list_tasks_for_workflow(workflow_id).await?;
        self.hydrate_all(tasks).await
    }

    /// Tasks of the workflow that were routed to `worker`, in creation order.
    pub async fn list_for_worker(
        &self,
        workflow_id: WorkflowId,
        worker: &str,
    ) -> Result<Vec<Task>, StorageError> {
        let tasks = self
            .repository
            .list_tasks_for_workflow_and_worker(workflow_id, worker)
            .await?;
        self.hydrate_all(tasks).await
    }

    pub async fn record_join_arrival(
        &self,
        workflow_id: WorkflowId,
        worker: &str,
        task_id: TaskId,
    ) -> Result<Vec<TaskId>, StorageError> {
        self.repository
            .record_join_arrival(workflow_id, worker, task_id)
            .await
    }

    /// Write `started_at` unless a previous delivery already did.
    pub async fn record_started(&self, task: &Task, now: DateTime<Utc>) -> Result<(), StorageError> {
        let mut stored = match self.repository.load_task(task.id()).await? {
            Some(stored) => stored,
            None => {
                self.save(task).await?;
                match self.repository.load_task(task.id()).await? {
                    Some(stored) => stored,
                    None => return Ok(()),
                }
            }
        };
        if stored.started_at().is_some() {
            debug!(task_id = %task.id(), "task redelivered, keeping first started_at");
            return Ok(());
        }
        if stored.mark_started(now).is_ok() {
            self.repository.save_task(&stored).await?;
        }
        Ok(())
    }

    /// Write `finished_at` unless it is already set.
    pub async fn record_finished(&self, task_id: TaskId, now: DateTime<Utc>) -> Result<(), StorageError> {
        let Some(mut stored) = self.repository.load_task(task_id).await? else {
            return Ok(());
        };
        if stored.finished_at().is_none() && stored.mark_finished(now).is_ok() {
            self.repository.save_task(&stored).await?;
        }
        Ok(())
    }

    async fn hydrate_all(&self, tasks: Vec<Task>) -> Result<Vec<Task>, StorageError> {
        let mut hydrated = Vec::with_capacity(tasks.len());
        for task in tasks {
            hydrated.push(self.hydrate(task).await?);
        }
        Ok(hydrated)
    }

    async fn hydrate(&self, mut task: Task) -> Result<Task, StorageError> {
        if let Some(params) = task.params_mut() {
            for param in params.values_mut() {
                if let ParamValue::Ref(handle) = param.value {
                    param.value = self
                        .repository
                        .load_parameter_value(handle)
                        .await?
                        .ok_or(StorageError::MissingValue(handle))?;
                }
            }
        }
        Ok(task)
    }
}
