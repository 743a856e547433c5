//! InMemoryTaskQueue - 開発用・テスト用の lease キュー
//!
//! # 実装詳細
//! - HashMap<EntryId, QueuedEntry> を tokio::sync::Mutex で保護
//! - lease は「選択 → leased_until の更新」を同じロックの中で行う
//! - 時刻は Clock port から取るので、FixedClock で期限切れを再現できる

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{EntryId, Task, TaskEnvelope, WorkflowId};
use crate::ports::{Clock, IdGenerator, LeasedEntry, QueueError, TaskQueue};

#[derive(Debug, Clone)]
struct QueuedEntry {
    tag: String,
    workflow_id: WorkflowId,
    eta: DateTime<Utc>,
    /// 同じ eta の中での追加順
    seq: u64,
    leased_until: Option<DateTime<Utc>>,
    last_leased_at: Option<DateTime<Utc>>,
    payload: Vec<u8>,
}

impl QueuedEntry {
    fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.eta <= now && self.leased_until.is_none_or(|until| until <= now)
    }
}

#[derive(Default)]
struct QueueState {
    entries: HashMap<EntryId, QueuedEntry>,
    next_seq: u64,
}

pub struct InMemoryTaskQueue {
    state: Mutex<QueueState>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryTaskQueue {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            clock,
            ids,
        }
    }

    /// Total number of entries, leased or not.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn push(&self, task: &Task, eta: DateTime<Utc>) -> Result<EntryId, QueueError> {
        let payload = TaskEnvelope::new(task.clone()).encode()?;
        let handle = self.ids.entry_id();

        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            handle,
            QueuedEntry {
                tag: task.worker().to_string(),
                workflow_id: task.workflow_id(),
                eta,
                seq,
                leased_until: None,
                last_leased_at: None,
                payload,
            },
        );
        Ok(handle)
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn add(&self, task: &Task) -> Result<EntryId, QueueError> {
        self.push(task, self.clock.now()).await
    }

    async fn add_at(&self, task: &Task, eta: DateTime<Utc>) -> Result<EntryId, QueueError> {
        self.push(task, eta).await
    }

    async fn lease(
        &self,
        timeout: Duration,
        limit: usize,
        tag: &str,
        workflow_id: Option<WorkflowId>,
    ) -> Result<Vec<LeasedEntry>, QueueError> {
        let lease_for =
            chrono::Duration::from_std(timeout).map_err(|_| QueueError::InvalidTimeout(timeout))?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let leased_until = now + lease_for;

        let mut candidates: Vec<(DateTime<Utc>, u64, EntryId)> = state
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.tag == tag
                    && workflow_id.is_none_or(|wf| entry.workflow_id == wf)
                    && entry.is_available(now)
            })
            .map(|(handle, entry)| (entry.eta, entry.seq, *handle))
            .collect();
        candidates.sort_unstable();
        candidates.truncate(limit);

        let mut leased = Vec::with_capacity(candidates.len());
        for (_, _, handle) in candidates {
            if let Some(entry) = state.entries.get_mut(&handle) {
                entry.leased_until = Some(leased_until);
                let previous_lease = entry.last_leased_at.replace(now);
                leased.push(LeasedEntry {
                    handle,
                    tag: entry.tag.clone(),
                    workflow_id: entry.workflow_id,
                    eta: entry.eta,
                    leased_until,
                    previous_lease,
                    payload: entry.payload.clone(),
                });
            }
        }
        Ok(leased)
    }

    async fn delete(&self, handle: EntryId) -> Result<bool, QueueError> {
        Ok(self.state.lock().await.entries.remove(&handle).is_some())
    }

    async fn count(&self, tag: &str, workflow_id: Option<WorkflowId>) -> Result<usize, QueueError> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .values()
            .filter(|entry| entry.tag == tag && workflow_id.is_none_or(|wf| entry.workflow_id == wf))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;

    use super::*;
    use crate::domain::Params;
    use crate::ports::{FixedClock, UlidGenerator};

    fn fixture() -> (Arc<FixedClock>, Arc<InMemoryTaskQueue>, Arc<dyn IdGenerator>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));
        let queue = Arc::new(InMemoryTaskQueue::new(clock.clone(), ids.clone()));
        (clock, queue, ids)
    }

    fn task_for(ids: &dyn IdGenerator, workflow_id: WorkflowId, tag: &str, now: DateTime<Utc>) -> Task {
        Task::start(ids.task_id(), workflow_id, tag, Params::new(), now)
    }

    #[tokio::test]
    async fn lease_returns_decodable_payload() {
        let (clock, queue, ids) = fixture();
        let task = task_for(ids.as_ref(), ids.workflow_id(), "split", clock.now());
        let handle = queue.add(&task).await.unwrap();

        let leased = queue
            .lease(Duration::from_secs(10), 1, "split", None)
            .await
            .unwrap();
        assert_eq!(leased.len(), 1);
        assert_eq!(leased[0].handle, handle);
        assert_eq!(leased[0].tag, "split");
        assert_eq!(leased[0].decode().unwrap(), task);
    }

    #[tokio::test]
    async fn leased_entry_is_hidden_until_timeout_then_redelivered() {
        let (clock, queue, ids) = fixture();
        let task = task_for(ids.as_ref(), ids.workflow_id(), "square", clock.now());
        queue.add(&task).await.unwrap();

        let first = queue
            .lease(Duration::from_secs(10), 1, "square", None)
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].previous_lease, None);
        let first_lease_at = clock.now();

        clock.advance(chrono::Duration::seconds(5));
        let hidden = queue
            .lease(Duration::from_secs(10), 1, "square", None)
            .await
            .unwrap();
        assert!(hidden.is_empty());

        clock.advance(chrono::Duration::seconds(6));
        let again = queue
            .lease(Duration::from_secs(10), 1, "square", None)
            .await
            .unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].handle, first[0].handle);
        assert_eq!(again[0].previous_lease, Some(first_lease_at));
    }

    #[tokio::test]
    async fn concurrent_leases_never_share_an_entry() {
        let (clock, queue, ids) = fixture();
        let workflow_id = ids.workflow_id();
        for _ in 0..5 {
            let task = task_for(ids.as_ref(), workflow_id, "square", clock.now());
            queue.add(&task).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .lease(Duration::from_secs(30), 1, "square", None)
                    .await
                    .unwrap()
            }));
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for entry in handle.await.unwrap() {
                total += 1;
                seen.insert(entry.handle);
            }
        }
        assert_eq!(total, 5);
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn lease_respects_eta_order_and_limit() {
        let (clock, queue, ids) = fixture();
        let workflow_id = ids.workflow_id();
        let now = clock.now();

        let late = task_for(ids.as_ref(), workflow_id, "sum", now);
        let early = task_for(ids.as_ref(), workflow_id, "sum", now);
        let future = task_for(ids.as_ref(), workflow_id, "sum", now);
        queue.add_at(&late, now - chrono::Duration::seconds(1)).await.unwrap();
        queue.add_at(&early, now - chrono::Duration::seconds(2)).await.unwrap();
        queue.add_at(&future, now + chrono::Duration::seconds(60)).await.unwrap();

        let leased = queue
            .lease(Duration::from_secs(10), 5, "sum", None)
            .await
            .unwrap();
        let ids_in_order: Vec<_> = leased.iter().map(|e| e.decode().unwrap().id()).collect();
        assert_eq!(ids_in_order, vec![early.id(), late.id()]);
    }

    #[tokio::test]
    async fn lease_filters_by_tag_and_workflow() {
        let (clock, queue, ids) = fixture();
        let wf_a = ids.workflow_id();
        let wf_b = ids.workflow_id();
        queue.add(&task_for(ids.as_ref(), wf_a, "square", clock.now())).await.unwrap();
        queue.add(&task_for(ids.as_ref(), wf_b, "square", clock.now())).await.unwrap();
        queue.add(&task_for(ids.as_ref(), wf_b, "sum", clock.now())).await.unwrap();

        let leased = queue
            .lease(Duration::from_secs(10), 10, "square", Some(wf_b))
            .await
            .unwrap();
        assert_eq!(leased.len(), 1);
        assert_eq!(leased[0].workflow_id, wf_b);

        assert_eq!(queue.count("square", None).await.unwrap(), 2);
        assert_eq!(queue.count("square", Some(wf_a)).await.unwrap(), 1);
        assert_eq!(queue.count("sum", Some(wf_a)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (clock, queue, ids) = fixture();
        let handle = queue
            .add(&task_for(ids.as_ref(), ids.workflow_id(), "end", clock.now()))
            .await
            .unwrap();

        assert!(queue.delete(handle).await.unwrap());
        assert!(!queue.delete(handle).await.unwrap());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn zero_limit_leases_nothing() {
        let (clock, queue, ids) = fixture();
        queue
            .add(&task_for(ids.as_ref(), ids.workflow_id(), "split", clock.now()))
            .await
            .unwrap();
        let leased = queue
            .lease(Duration::from_secs(10), 0, "split", None)
            .await
            .unwrap();
        assert!(leased.is_empty());
        assert_eq!(queue.count("split", None).await.unwrap(), 1);
    }
}
