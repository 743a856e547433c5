//! TaskEnvelope - queue 上を流れるタスクの運搬用フォーマット
//!
//! バイナリのオブジェクト直列化ではなく、バージョン付きの JSON を使います。
//! 新しいコードは古いバージョンを読めますが、その逆は拒否します。

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::task::Task;

/// Current envelope schema version.
pub const ENVELOPE_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub version: u16,
    pub task: Task,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u16,
}

impl TaskEnvelope {
    pub fn new(task: Task) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            task,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self).map_err(|e| DomainError::Envelope(e.to_string()))
    }

    /// Decode an envelope, checking the version before the body.
    pub fn decode(bytes: &[u8]) -> Result<Self, DomainError> {
        let probe: VersionProbe =
            serde_json::from_slice(bytes).map_err(|e| DomainError::Envelope(e.to_string()))?;
        if probe.version > ENVELOPE_VERSION {
            return Err(DomainError::UnsupportedEnvelope {
                found: probe.version,
                supported: ENVELOPE_VERSION,
            });
        }
        serde_json::from_slice(bytes).map_err(|e| DomainError::Envelope(e.to_string()))
    }

    pub fn into_task(self) -> Task {
        self.task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Params, TaskId, WorkflowId};
    use chrono::Utc;
    use ulid::Ulid;

    fn sample() -> Task {
        Task::start(
            TaskId::from_ulid(Ulid::new()),
            WorkflowId::from_ulid(Ulid::new()),
            "split",
            Params::new().with("numbers", "1,2,3").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn rejects_newer_versions() {
        let mut v = serde_json::to_value(TaskEnvelope::new(sample())).unwrap();
        v["version"] = serde_json::json!(ENVELOPE_VERSION + 1);
        let bytes = serde_json::to_vec(&v).unwrap();

        let err = TaskEnvelope::decode(&bytes).unwrap_err();
        assert!(matches!(err, DomainError::UnsupportedEnvelope { .. }));
    }

    #[test]
    fn garbage_is_an_envelope_error() {
        let err = TaskEnvelope::decode(b"not json").unwrap_err();
        assert!(matches!(err, DomainError::Envelope(_)));
    }

    #[test]
    fn decodes_what_it_encodes() {
        let task = sample();
        let bytes = TaskEnvelope::new(task.clone()).encode().unwrap();
        assert_eq!(TaskEnvelope::decode(&bytes).unwrap().into_task(), task);
    }
}
