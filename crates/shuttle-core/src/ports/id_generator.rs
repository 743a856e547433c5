//! IdGenerator port - job / workflow / task / queue entry / 値ハンドルの採番

use crate::domain::ids::{EntryId, Id, IdMarker, JobId, TaskId, ValueHandle, WorkflowId};
use crate::ports::Clock;
use ulid::Ulid;

/// Shared by every loop of the engine, hence `Send + Sync`.
pub trait IdGenerator: Send + Sync {
    fn job_id(&self) -> JobId;
    fn workflow_id(&self) -> WorkflowId;
    fn task_id(&self) -> TaskId;
    fn entry_id(&self) -> EntryId;
    fn value_handle(&self) -> ValueHandle;
}

/// ULID whose timestamp part comes from `C`, so ids sort by engine time.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next<T: IdMarker>(&self) -> Id<T> {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Id::from_ulid(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn job_id(&self) -> JobId {
        self.next()
    }

    fn workflow_id(&self) -> WorkflowId {
        self.next()
    }

    fn task_id(&self) -> TaskId {
        self.next()
    }

    fn entry_id(&self) -> EntryId {
        self.next()
    }

    fn value_handle(&self) -> ValueHandle {
        self.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    #[test]
    fn ids_follow_the_clock() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(t0));
        let ids = UlidGenerator::new(clock.clone());

        let a = ids.task_id();
        let b = ids.task_id();
        // 同じミリ秒でもランダム部分で区別される
        assert_ne!(a, b);
        assert_eq!(a.as_ulid().timestamp_ms(), t0.timestamp_millis() as u64);

        clock.advance(Duration::milliseconds(1));
        let later = ids.task_id();
        assert!(later > a && later > b);
    }

    #[test]
    fn every_kind_has_its_prefix() {
        let ids = UlidGenerator::new(crate::ports::SystemClock);
        let rendered = [
            ids.job_id().to_string(),
            ids.workflow_id().to_string(),
            ids.task_id().to_string(),
            ids.entry_id().to_string(),
            ids.value_handle().to_string(),
        ];
        for (id, prefix) in rendered.iter().zip(["job-", "wf-", "task-", "entry-", "value-"]) {
            assert!(id.starts_with(prefix), "{id}");
        }
    }
}
