//! Status - ジョブの進捗ビュー
//!
//! worker tag ごとに「処理済み」と「キューで待っている」件数を返します。
//! done は履歴上のタスク数からキューに残っている件数を引いた値です。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{JobId, JobState, WorkflowId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerProgress {
    pub done: usize,
    pub waiting: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStats {
    pub job_id: JobId,
    pub workflow_id: Option<WorkflowId>,
    pub state: JobState,
    pub workers: BTreeMap<String, WorkerProgress>,
}

impl LiveStats {
    pub fn total_waiting(&self) -> usize {
        self.workers.values().map(|p| p.waiting).sum()
    }

    pub fn total_done(&self) -> usize {
        self.workers.values().map(|p| p.done).sum()
    }
}
