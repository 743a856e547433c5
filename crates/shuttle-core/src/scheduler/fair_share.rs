//! FairShareScheduler - worker tag ごとの workflow 優先度テーブル
//!
//! # 設計
//! - active な workflow の集合を持ち、開始・終了イベントのたびに
//!   全 tag のテーブルを作り直す（部分更新はしない）
//! - テーブルは tag の step を使う workflow だけを含む
//! - 作り直したテーブルは Repository に保存し、起動時に `restore` で読み戻す
//! - `pick` は同期で、テーブルの読み取りロックだけを取る

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::weight::WeightFunction;
use super::weighted::WeightedRoundRobin;
use crate::domain::{WorkflowCatalog, WorkflowId};
use crate::ports::{PriorityEntry, Repository, StorageError, WorkflowEvent, WorkflowObserver};

type Tables = HashMap<String, WeightedRoundRobin<PriorityEntry>>;

pub struct FairShareScheduler {
    catalog: Arc<WorkflowCatalog>,
    weights: Arc<dyn WeightFunction>,
    repository: Arc<dyn Repository>,
    /// workflow id -> workflow name
    active: Mutex<BTreeMap<WorkflowId, String>>,
    tables: RwLock<Tables>,
}

impl FairShareScheduler {
    pub fn new(
        catalog: Arc<WorkflowCatalog>,
        weights: Arc<dyn WeightFunction>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        Self {
            catalog,
            weights,
            repository,
            active: Mutex::new(BTreeMap::new()),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the active set from the last persisted tables.
    ///
    /// Returns the number of workflows restored.
    pub async fn restore(&self) -> Result<usize, StorageError> {
        let persisted = self.repository.load_priority_tables().await?;
        let mut active = self.active.lock().await;
        for entry in persisted.into_values().flatten() {
            if self.catalog.get(&entry.workflow_name).is_some() {
                active.insert(entry.workflow_id, entry.workflow_name);
            }
        }
        let restored = active.len();
        self.rebuild(&active).await;
        info!(restored, "fair-share tables restored");
        Ok(restored)
    }

    pub async fn workflow_started(&self, workflow_id: WorkflowId, name: &str) {
        let mut active = self.active.lock().await;
        active.insert(workflow_id, name.to_string());
        self.rebuild(&active).await;
    }

    pub async fn workflow_finished(&self, workflow_id: WorkflowId) {
        let mut active = self.active.lock().await;
        if active.remove(&workflow_id).is_some() {
            self.rebuild(&active).await;
        }
    }

    /// Drop active workflows the repository reports as finished or missing,
    /// then rebuild. Returns the number of dropped workflows.
    pub async fn reconcile(&self) -> Result<usize, StorageError> {
        let mut active = self.active.lock().await;
        let mut stale = Vec::new();
        for workflow_id in active.keys() {
            let alive = self
                .repository
                .load_workflow(*workflow_id)
                .await?
                .is_some_and(|wf| wf.is_active());
            if !alive {
                stale.push(*workflow_id);
            }
        }
        for workflow_id in &stale {
            active.remove(workflow_id);
        }
        self.rebuild(&active).await;
        if !stale.is_empty() {
            debug!(dropped = stale.len(), "dropped finished workflows from fair-share set");
        }
        Ok(stale.len())
    }

    /// Workflow to bias the next lease for `tag` towards, if any.
    pub fn pick(&self, tag: &str) -> Option<WorkflowId> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables
            .get(tag)
            .and_then(|table| table.get_next(&mut rand::thread_rng()))
            .map(|entry| entry.workflow_id)
    }

    /// Deterministic variant of [`pick`](Self::pick) for a given draw in [0, 1).
    pub fn pick_with(&self, tag: &str, draw: f64) -> Option<WorkflowId> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables
            .get(tag)
            .and_then(|table| table.get_next_with(draw))
            .map(|entry| entry.workflow_id)
    }

    pub async fn active_workflows(&self) -> Vec<WorkflowId> {
        self.active.lock().await.keys().copied().collect()
    }

    /// Current table entries for `tag`.
    pub fn table(&self, tag: &str) -> Vec<PriorityEntry> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables
            .get(tag)
            .map(|table| table.items().to_vec())
            .unwrap_or_default()
    }

    /// 全 tag のテーブルを作り直し、差し替えてから保存する
    async fn rebuild(&self, active: &BTreeMap<WorkflowId, String>) {
        let tags: BTreeSet<String> = self
            .catalog
            .graphs()
            .flat_map(|graph| graph.steps().into_iter().map(str::to_string))
            .collect();

        let mut rows: BTreeMap<String, Vec<PriorityEntry>> = BTreeMap::new();
        for tag in &tags {
            let entries = active
                .iter()
                .filter(|(_, name)| {
                    self.catalog
                        .get(name)
                        .is_some_and(|graph| graph.uses_step(tag))
                })
                .map(|(workflow_id, name)| PriorityEntry {
                    workflow_id: *workflow_id,
                    workflow_name: name.clone(),
                    weight: self.weights.weight(*workflow_id, name),
                })
                .collect();
            rows.insert(tag.clone(), entries);
        }

        let tables: Tables = rows
            .iter()
            .map(|(tag, entries)| {
                let table = WeightedRoundRobin::new(entries.iter().map(|e| (e.clone(), e.weight)));
                (tag.clone(), table)
            })
            .collect();
        *self.tables.write().unwrap_or_else(|e| e.into_inner()) = tables;
        debug!(active = active.len(), tags = rows.len(), "fair-share tables rebuilt");

        for (tag, entries) in &rows {
            if let Err(error) = self.repository.save_priority_table(tag, entries).await {
                warn!(%tag, %error, "failed to persist fair-share table");
            }
        }
    }
}

#[async_trait]
impl WorkflowObserver for FairShareScheduler {
    async fn on_workflow_event(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::Started { workflow_id, name } => {
                self.workflow_started(*workflow_id, name).await;
            }
            WorkflowEvent::Finished { workflow_id, .. } => {
                self.workflow_finished(*workflow_id).await;
            }
        }
    }
}
