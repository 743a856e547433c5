//! InMemoryBlobCache - プロセス内の blob キャッシュ

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::ports::{BlobCache, BlobError};

#[derive(Default)]
pub struct InMemoryBlobCache {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobCache for InMemoryBlobCache {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(key) {
            return Err(BlobError::AlreadyExists(key.to_string()));
        }
        blobs.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool, BlobError> {
        Ok(self.blobs.write().await.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keys_are_write_once() {
        let cache = InMemoryBlobCache::new();
        cache.put("numbers/1", vec![1, 2, 3]).await.unwrap();

        let err = cache.put("numbers/1", vec![9]).await.unwrap_err();
        assert!(matches!(err, BlobError::AlreadyExists(key) if key == "numbers/1"));
        assert_eq!(cache.get("numbers/1").await.unwrap(), Some(vec![1, 2, 3]));

        assert!(cache.delete("numbers/1").await.unwrap());
        assert!(!cache.delete("numbers/1").await.unwrap());
        assert_eq!(cache.get("numbers/1").await.unwrap(), None);
    }
}
