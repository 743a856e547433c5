//! TaskQueue port - lease ベースの作業キュー
//!
//! エントリは (payload, 宛先 worker tag, workflow id, eta) を持ちます。
//! lease は所有権の移転ではなく、期限までの排他的な取得権です。
//! delete されないまま lease が切れたエントリは再配送されます（at-least-once）。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{DomainError, EntryId, Task, TaskEnvelope, WorkflowId};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("task encoding failed: {0}")]
    Encode(#[from] DomainError),

    #[error("lease timeout {0:?} is out of range")]
    InvalidTimeout(Duration),

    #[error("queue operation failed: {0}")]
    OperationFailed(String),
}

/// An entry granted to one leaser until `leased_until`.
#[derive(Debug, Clone)]
pub struct LeasedEntry {
    pub handle: EntryId,
    pub tag: String,
    pub workflow_id: WorkflowId,
    pub eta: DateTime<Utc>,
    pub leased_until: DateTime<Utc>,
    /// When the entry was last leased before this grant; `Some` means redelivery.
    pub previous_lease: Option<DateTime<Utc>>,
    pub payload: Vec<u8>,
}

impl LeasedEntry {
    pub fn decode(&self) -> Result<Task, DomainError> {
        TaskEnvelope::decode(&self.payload).map(TaskEnvelope::into_task)
    }
}

/// TaskQueue は lease 付きのタスクキュー
///
/// # 設計原則
/// - `lease` はエントリ単位でアトミック（同じ世代の lease を二人に渡さない）
/// - 同じ tag / workflow の中では eta の古い順
/// - `delete` は冪等（二回目は false）
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue `task` for its destination worker, dispatchable now.
    async fn add(&self, task: &Task) -> Result<EntryId, QueueError>;

    /// Enqueue `task`, not dispatchable before `eta`.
    async fn add_at(&self, task: &Task, eta: DateTime<Utc>) -> Result<EntryId, QueueError>;

    /// Lease up to `limit` available entries for `tag` (and `workflow_id` if given).
    async fn lease(
        &self,
        timeout: Duration,
        limit: usize,
        tag: &str,
        workflow_id: Option<WorkflowId>,
    ) -> Result<Vec<LeasedEntry>, QueueError>;

    /// Remove an entry. Returns false if it was already gone.
    async fn delete(&self, handle: EntryId) -> Result<bool, QueueError>;

    /// Entries still queued (leased or not) for `tag`.
    async fn count(&self, tag: &str, workflow_id: Option<WorkflowId>) -> Result<usize, QueueError>;
}
