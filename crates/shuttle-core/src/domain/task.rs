//! Task model: start tasks, work tasks and the end-of-workflow sentinel.
//!
//! A `Task` always knows its workflow. The workflow id is fixed by the
//! constructor (copied from the parent, or given explicitly for roots) and has
//! no setter.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::ids::{TaskId, WorkflowId};
use super::params::Params;

/// Variant of a task. The serde tag is the stable discriminator persisted
/// with every record (`"start"`, `"task"`, `"end"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    /// Root of a workflow: carries the job's initial parameters.
    Start { params: Params },

    #[serde(rename = "task")]
    Work { params: Params },

    /// Sentinel signalling that the upstream branch is complete.
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    workflow_id: WorkflowId,
    parent_id: Option<TaskId>,

    /// Upstream tasks merged into this one by a join. Empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    joined_ids: Vec<TaskId>,

    /// Widths of the enclosing fan-outs, innermost last.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fan_out: Vec<usize>,

    /// Destination worker tag (symbolic until the publisher resolves it).
    worker: String,

    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    kind: TaskKind,
}

impl Task {
    fn build(
        id: TaskId,
        workflow_id: WorkflowId,
        parent_id: Option<TaskId>,
        worker: String,
        kind: TaskKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            workflow_id,
            parent_id,
            joined_ids: Vec::new(),
            fan_out: Vec::new(),
            worker,
            created_at: now,
            started_at: None,
            finished_at: None,
            kind,
        }
    }

    /// Root task of a workflow instance.
    pub fn start(
        id: TaskId,
        workflow_id: WorkflowId,
        worker: impl Into<String>,
        params: Params,
        now: DateTime<Utc>,
    ) -> Self {
        Self::build(
            id,
            workflow_id,
            None,
            worker.into(),
            TaskKind::Start { params },
            now,
        )
    }

    /// Work task caused by `parent`; inherits the parent's workflow.
    pub fn child(
        id: TaskId,
        parent: &Task,
        worker: impl Into<String>,
        params: Params,
        now: DateTime<Utc>,
    ) -> Self {
        let mut task = Self::build(
            id,
            parent.workflow_id,
            Some(parent.id),
            worker.into(),
            TaskKind::Work { params },
            now,
        );
        task.fan_out = parent.fan_out.clone();
        task
    }

    /// End-of-workflow sentinel caused by `parent`.
    pub fn end_child(id: TaskId, parent: &Task, worker: impl Into<String>, now: DateTime<Utc>) -> Self {
        let mut task = Self::build(
            id,
            parent.workflow_id,
            Some(parent.id),
            worker.into(),
            TaskKind::End,
            now,
        );
        task.fan_out = parent.fan_out.clone();
        task
    }

    /// Work task produced by a join, referencing every merged upstream task.
    /// The innermost fan-out is closed.
    pub fn joined(
        id: TaskId,
        parent: &Task,
        joined_ids: Vec<TaskId>,
        worker: impl Into<String>,
        params: Params,
        now: DateTime<Utc>,
    ) -> Self {
        let mut task = Self::child(id, parent, worker, params, now);
        task.joined_ids = joined_ids;
        task.close_fan_out();
        task
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    pub fn parent_id(&self) -> Option<TaskId> {
        self.parent_id
    }

    pub fn joined_ids(&self) -> &[TaskId] {
        &self.joined_ids
    }

    /// Branch count of the innermost fan-out this task belongs to.
    pub fn fan_out_width(&self) -> Option<usize> {
        self.fan_out.last().copied()
    }

    pub(crate) fn open_fan_out(&mut self, width: usize) {
        self.fan_out.push(width);
    }

    pub(crate) fn close_fan_out(&mut self) {
        self.fan_out.pop();
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Stable type name, same as the serde discriminator.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            TaskKind::Start { .. } => "start",
            TaskKind::Work { .. } => "task",
            TaskKind::End => "end",
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, TaskKind::End)
    }

    /// Parameters of a start or work task; `None` for the sentinel.
    pub fn params(&self) -> Option<&Params> {
        match &self.kind {
            TaskKind::Start { params } | TaskKind::Work { params } => Some(params),
            TaskKind::End => None,
        }
    }

    pub(crate) fn params_mut(&mut self) -> Option<&mut Params> {
        match &mut self.kind {
            TaskKind::Start { params } | TaskKind::Work { params } => Some(params),
            TaskKind::End => None,
        }
    }

    /// Replace the symbolic destination with the concrete worker tag.
    pub(crate) fn route_to(&mut self, worker: String) {
        self.worker = worker;
    }

    pub fn mark_started(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.started_at.is_some() {
            return Err(DomainError::already_set("task", "started_at"));
        }
        self.started_at = Some(now);
        Ok(())
    }

    pub fn mark_finished(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.started_at.is_none() {
            return Err(DomainError::OutOfOrder {
                entity: "task",
                field: "finished_at",
                required: "started_at",
            });
        }
        if self.finished_at.is_some() {
            return Err(DomainError::already_set("task", "finished_at"));
        }
        self.finished_at = Some(now);
        Ok(())
    }

    /// Time spent between lease and completion, once both are known.
    pub fn busy_time(&self) -> Option<Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn new_id() -> TaskId {
        TaskId::from_ulid(Ulid::new())
    }

    #[test]
    fn children_inherit_workflow_and_parent() {
        let wf = WorkflowId::from_ulid(Ulid::new());
        let root = Task::start(new_id(), wf, "split", Params::new(), t0());
        let child = Task::child(new_id(), &root, "next", Params::new(), t0());
        let end = Task::end_child(new_id(), &child, "next", t0());

        assert_eq!(root.parent_id(), None);
        assert_eq!(child.workflow_id(), wf);
        assert_eq!(child.parent_id(), Some(root.id()));
        assert_eq!(end.workflow_id(), wf);
        assert!(end.is_end());
        assert!(end.params().is_none());
    }

    #[test]
    fn fan_out_width_follows_the_branch_until_joined() {
        let wf = WorkflowId::from_ulid(Ulid::new());
        let root = Task::start(new_id(), wf, "split", Params::new(), t0());
        let mut outer = Task::child(new_id(), &root, "b", Params::new(), t0());
        outer.open_fan_out(4);
        let mut inner = Task::child(new_id(), &outer, "c", Params::new(), t0());
        inner.open_fan_out(2);

        let end = Task::end_child(new_id(), &inner, "d", t0());
        assert_eq!(root.fan_out_width(), None);
        assert_eq!(end.fan_out_width(), Some(2));

        // 内側の join を抜けると外側の幅に戻る
        let joined = Task::joined(new_id(), &end, vec![inner.id()], "e", Params::new(), t0());
        assert_eq!(joined.fan_out_width(), Some(4));
        let back: Task = serde_json::from_value(serde_json::to_value(&end).unwrap()).unwrap();
        assert_eq!(back.fan_out_width(), Some(2));
    }

    #[test]
    fn timestamps_are_write_once() {
        let wf = WorkflowId::from_ulid(Ulid::new());
        let mut task = Task::start(new_id(), wf, "split", Params::new(), t0());

        assert!(matches!(
            task.mark_finished(t0()),
            Err(DomainError::OutOfOrder { .. })
        ));

        task.mark_started(t0()).unwrap();
        let later = t0() + Duration::seconds(5);
        assert!(task.mark_started(later).is_err());
        assert_eq!(task.started_at(), Some(t0()));

        task.mark_finished(later).unwrap();
        assert!(task.mark_finished(later + Duration::seconds(1)).is_err());
        assert_eq!(task.finished_at(), Some(later));
        assert_eq!(task.busy_time(), Some(Duration::seconds(5)));
    }

    #[test]
    fn kind_is_serialized_as_stable_discriminator() {
        let wf = WorkflowId::from_ulid(Ulid::new());
        let root = Task::start(new_id(), wf, "split", Params::new(), t0());
        let work = Task::child(new_id(), &root, "b", Params::new().with("n", 2).unwrap(), t0());
        let end = Task::end_child(new_id(), &root, "b", t0());

        for (task, name) in [(&root, "start"), (&work, "task"), (&end, "end")] {
            let v = serde_json::to_value(task).unwrap();
            assert_eq!(v["type"], name);
            assert_eq!(task.kind_name(), name);
        }

        let back: Task = serde_json::from_value(serde_json::to_value(&work).unwrap()).unwrap();
        assert_eq!(back, work);
    }
}
