//! InMemoryRepository - テスト用の正本ストア
//!
//! 全レコードを tokio::sync::RwLock の中の HashMap に持ちます。
//! 作成順を返す必要がある一覧（jobs, workflow ごとの tasks）は
//! 別に id の Vec を持って順序を保ちます。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{
    Job, JobId, JobState, ParamValue, Task, TaskId, ValueHandle, WorkflowId, WorkflowInstance,
};
use crate::ports::{PriorityEntry, Repository, StorageError};

#[derive(Debug, Clone)]
struct StoredParameter {
    task_id: TaskId,
    name: String,
    value: ParamValue,
}

#[derive(Default)]
struct RepositoryState {
    jobs: HashMap<JobId, Job>,
    job_order: Vec<JobId>,
    workflows: HashMap<WorkflowId, WorkflowInstance>,
    tasks: HashMap<TaskId, Task>,
    workflow_tasks: HashMap<WorkflowId, Vec<TaskId>>,
    parameters: HashMap<ValueHandle, StoredParameter>,
    join_arrivals: HashMap<(WorkflowId, String), Vec<TaskId>>,
    priority_tables: HashMap<String, Vec<PriorityEntry>>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<RepositoryState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task and parameter name an out-of-line value was stored for.
    pub async fn parameter_owner(&self, handle: ValueHandle) -> Option<(TaskId, String)> {
        self.state
            .read()
            .await
            .parameters
            .get(&handle)
            .map(|stored| (stored.task_id, stored.name.clone()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save_job(&self, job: &Job) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if state.jobs.insert(job.job_id(), job.clone()).is_none() {
            state.job_order.push(job.job_id());
        }
        Ok(())
    }

    async fn load_job(&self, job_id: JobId) -> Result<Option<Job>, StorageError> {
        Ok(self.state.read().await.jobs.get(&job_id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<JobId>, StorageError> {
        Ok(self.state.read().await.job_order.clone())
    }

    async fn list_jobs_due_to_start(&self, now: DateTime<Utc>) -> Result<Vec<Job>, StorageError> {
        let state = self.state.read().await;
        let mut due: Vec<Job> = state
            .job_order
            .iter()
            .filter_map(|id| state.jobs.get(id))
            .filter(|job| job.state() == JobState::Pending && job.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|job| job.start_after());
        Ok(due)
    }

    async fn find_job_by_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<Job>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .values()
            .find(|job| job.workflow_id() == Some(workflow_id))
            .cloned())
    }

    async fn save_workflow(&self, workflow: &WorkflowInstance) -> Result<(), StorageError> {
        self.state
            .write()
            .await
            .workflows
            .insert(workflow.workflow_id(), workflow.clone());
        Ok(())
    }

    async fn load_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<WorkflowInstance>, StorageError> {
        Ok(self.state.read().await.workflows.get(&workflow_id).cloned())
    }

    async fn save_task(&self, task: &Task) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if state.tasks.insert(task.id(), task.clone()).is_none() {
            state
                .workflow_tasks
                .entry(task.workflow_id())
                .or_default()
                .push(task.id());
        }
        Ok(())
    }

    async fn load_task(&self, task_id: TaskId) -> Result<Option<Task>, StorageError> {
        Ok(self.state.read().await.tasks.get(&task_id).cloned())
    }

    async fn list_tasks_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<Task>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .workflow_tasks
            .get(&workflow_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.tasks.get(id))
            .cloned()
            .collect())
    }

    async fn list_tasks_for_workflow_and_worker(
        &self,
        workflow_id: WorkflowId,
        worker: &str,
    ) -> Result<Vec<Task>, StorageError> {
        Ok(self
            .list_tasks_for_workflow(workflow_id)
            .await?
            .into_iter()
            .filter(|task| task.worker() == worker)
            .collect())
    }

    async fn save_parameter_value(
        &self,
        handle: ValueHandle,
        task_id: TaskId,
        name: &str,
        value: &ParamValue,
    ) -> Result<(), StorageError> {
        self.state.write().await.parameters.insert(
            handle,
            StoredParameter {
                task_id,
                name: name.to_string(),
                value: value.clone(),
            },
        );
        Ok(())
    }

    async fn load_parameter_value(
        &self,
        handle: ValueHandle,
    ) -> Result<Option<ParamValue>, StorageError> {
        Ok(self
            .state
            .read()
            .await
            .parameters
            .get(&handle)
            .map(|stored| stored.value.clone()))
    }

    async fn record_join_arrival(
        &self,
        workflow_id: WorkflowId,
        worker: &str,
        task_id: TaskId,
    ) -> Result<Vec<TaskId>, StorageError> {
        let mut state = self.state.write().await;
        let arrivals = state
            .join_arrivals
            .entry((workflow_id, worker.to_string()))
            .or_default();
        if !arrivals.contains(&task_id) {
            arrivals.push(task_id);
        }
        Ok(arrivals.clone())
    }

    async fn save_priority_table(
        &self,
        tag: &str,
        entries: &[PriorityEntry],
    ) -> Result<(), StorageError> {
        self.state
            .write()
            .await
            .priority_tables
            .insert(tag.to_string(), entries.to_vec());
        Ok(())
    }

    async fn load_priority_tables(
        &self,
    ) -> Result<HashMap<String, Vec<PriorityEntry>>, StorageError> {
        Ok(self.state.read().await.priority_tables.clone())
    }
}
