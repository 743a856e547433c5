//! BlobCache port - worker 間で大きなデータを受け渡すためのキャッシュ
//!
//! コアはこの port を使いません。worker 実装が WorkContext 経由で使います。
//! タスクのパラメータにはキーだけを載せ、本体はここに置きます。

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob key '{0}' already exists")]
    AlreadyExists(String),

    #[error("blob cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait BlobCache: Send + Sync {
    /// Store `bytes` under `key`. Keys are write-once.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Returns false if the key was not present.
    async fn delete(&self, key: &str) -> Result<bool, BlobError>;
}
