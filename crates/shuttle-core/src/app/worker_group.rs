use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::worker_loop::WorkerLoop;

/// Worker group handle.
/// - `request_shutdown()` で新しい lease を取らなくなる（実行中のタスクは最後まで走る）
/// - `shutdown_and_join()` で全ループの終了を待てる
pub struct WorkerGroup {
    tag: String,
    cancel: CancellationToken,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn one task per loop. All loops share `cancel`.
    pub fn spawn(
        tag: impl Into<String>,
        loops: impl IntoIterator<Item = WorkerLoop>,
        cancel: CancellationToken,
    ) -> Self {
        let tag = tag.into();
        let joins: Vec<_> = loops
            .into_iter()
            .map(|worker_loop| tokio::spawn(worker_loop.run(cancel.clone())))
            .collect();
        info!(worker = %tag, threads = joins.len(), "worker group spawned");
        Self { tag, cancel, joins }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn request_shutdown(&self) {
        self.cancel.cancel();
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            // panic は WorkerLoop 内で捕まえているので、ここに来るのは abort だけ
            if let Err(err) = join.await {
                warn!(worker = %self.tag, error = %err, "worker loop ended abnormally");
            }
        }
    }
}
