//! EngineContext - 全ループに明示的に渡すサービス集
//!
//! グローバルなサービスロケータの代わりに、このコンテキストを
//! clone して各ループ・サービスに渡します。中身はすべて Arc です。

use std::sync::Arc;

use super::history::TaskHistory;
use crate::config::EngineSettings;
use crate::domain::WorkflowCatalog;
use crate::impls::{InMemoryBlobCache, InMemoryRepository, InMemoryTaskQueue};
use crate::ports::{BlobCache, Clock, IdGenerator, Repository, SystemClock, TaskQueue, UlidGenerator};
use crate::workers::WorkContext;

#[derive(Clone)]
pub struct EngineContext {
    pub repository: Arc<dyn Repository>,
    pub queue: Arc<dyn TaskQueue>,
    pub blobs: Arc<dyn BlobCache>,
    pub ids: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
    pub catalog: Arc<WorkflowCatalog>,
    pub history: TaskHistory,
    pub settings: EngineSettings,
}

impl EngineContext {
    pub fn new(
        repository: Arc<dyn Repository>,
        queue: Arc<dyn TaskQueue>,
        blobs: Arc<dyn BlobCache>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        catalog: WorkflowCatalog,
        settings: EngineSettings,
    ) -> Self {
        let history = TaskHistory::new(repository.clone(), ids.clone(), settings.inline_param_limit);
        Self {
            repository,
            queue,
            blobs,
            ids,
            clock,
            catalog: Arc::new(catalog),
            history,
            settings,
        }
    }

    /// Everything in process memory, driven by `clock`.
    pub fn in_memory_with_clock(
        catalog: WorkflowCatalog,
        settings: EngineSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));
        let queue = Arc::new(InMemoryTaskQueue::new(clock.clone(), ids.clone()));
        Self::new(
            Arc::new(InMemoryRepository::new()),
            queue,
            Arc::new(InMemoryBlobCache::new()),
            ids,
            clock,
            catalog,
            settings,
        )
    }

    pub fn in_memory(catalog: WorkflowCatalog, settings: EngineSettings) -> Self {
        Self::in_memory_with_clock(catalog, settings, Arc::new(SystemClock))
    }

    pub(crate) fn work_context(&self, tag: &str, workflow_name: &str) -> WorkContext {
        WorkContext::new(
            tag,
            workflow_name,
            self.catalog.clone(),
            self.history.clone(),
            self.blobs.clone(),
            self.ids.clone(),
            self.clock.clone(),
        )
    }
}
