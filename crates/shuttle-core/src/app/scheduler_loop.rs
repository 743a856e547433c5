//! SchedulerLoop - fair-share テーブルの定期的な整合
//!
//! 通常は開始・終了イベントでテーブルが更新されますが、通知を取りこぼした
//! workflow（別プロセスで終了した等）をここで掃除します。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::scheduler::FairShareScheduler;

pub struct SchedulerLoop {
    scheduler: Arc<FairShareScheduler>,
    interval: Duration,
}

impl SchedulerLoop {
    pub fn new(scheduler: Arc<FairShareScheduler>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(interval = ?self.interval, "scheduler loop started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => match self.scheduler.reconcile().await {
                    Ok(0) => {}
                    Ok(dropped) => debug!(dropped, "stale workflows dropped from priority tables"),
                    Err(error) => warn!(%error, "priority table reconcile failed"),
                },
            }
        }
        info!("scheduler loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StepGraph, WorkflowCatalog, WorkflowId};
    use crate::impls::InMemoryRepository;
    use crate::scheduler::UniformWeight;
    use ulid::Ulid;

    #[tokio::test]
    async fn drops_workflows_unknown_to_the_repository() {
        let catalog = Arc::new(WorkflowCatalog::new().with(StepGraph::new("squares", "split", "end")));
        let scheduler = Arc::new(FairShareScheduler::new(
            catalog,
            Arc::new(UniformWeight),
            Arc::new(InMemoryRepository::new()),
        ));
        scheduler
            .workflow_started(WorkflowId::from_ulid(Ulid::new()), "squares")
            .await;
        assert_eq!(scheduler.active_workflows().await.len(), 1);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            SchedulerLoop::new(scheduler.clone(), Duration::from_millis(5)).run(cancel.clone()),
        );
        for _ in 0..100 {
            if scheduler.active_workflows().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        handle.await.unwrap();

        assert!(scheduler.active_workflows().await.is_empty());
        assert!(scheduler.table("split").is_empty());
    }
}
