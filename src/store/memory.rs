use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KvStore, StoreResult};

/// Hash-of-fields store kept in process memory.
///
/// Every mutation takes the single write lock, so compare-and-swap is atomic
/// with respect to all other writers.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    hashes: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn field_count(&self, hash: &str) -> usize {
        let hashes = self.hashes.read().await;
        hashes.get(hash).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn hget(&self, hash: &str, field: &str) -> StoreResult<Option<Vec<u8>>> {
        let hashes = self.hashes.read().await;
        Ok(hashes.get(hash).and_then(|fields| fields.get(field)).cloned())
    }

    async fn hset_nx(&self, hash: &str, field: &str, value: Vec<u8>) -> StoreResult<bool> {
        let mut hashes = self.hashes.write().await;
        let fields = hashes.entry(hash.to_string()).or_default();
        if fields.contains_key(field) {
            return Ok(false);
        }
        fields.insert(field.to_string(), value);
        Ok(true)
    }

    async fn hset(&self, hash: &str, field: &str, value: Vec<u8>) -> StoreResult<()> {
        let mut hashes = self.hashes.write().await;
        hashes
            .entry(hash.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn hcompare_and_swap(
        &self,
        hash: &str,
        field: &str,
        expected: &[u8],
        value: Vec<u8>,
    ) -> StoreResult<bool> {
        let mut hashes = self.hashes.write().await;
        let Some(current) = hashes.get_mut(hash).and_then(|fields| fields.get_mut(field)) else {
            return Ok(false);
        };
        if current.as_slice() != expected {
            return Ok(false);
        }
        *current = value;
        Ok(true)
    }

    async fn hdel(&self, hash: &str, field: &str) -> StoreResult<bool> {
        let mut hashes = self.hashes.write().await;
        Ok(hashes
            .get_mut(hash)
            .map(|fields| fields.remove(field).is_some())
            .unwrap_or(false))
    }

    async fn flush(&self) -> StoreResult<()> {
        self.hashes.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hset_nx_only_writes_once() {
        let store = InMemoryKvStore::new();
        assert!(store.hset_nx("plan", "a", b"1".to_vec()).await.unwrap());
        assert!(!store.hset_nx("plan", "a", b"2".to_vec()).await.unwrap());
        assert_eq!(store.hget("plan", "a").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn compare_and_swap_requires_matching_bytes() {
        let store = InMemoryKvStore::new();
        assert!(!store.hcompare_and_swap("plan", "a", b"x", b"y".to_vec()).await.unwrap());

        store.hset("plan", "a", b"x".to_vec()).await.unwrap();
        assert!(!store.hcompare_and_swap("plan", "a", b"z", b"y".to_vec()).await.unwrap());
        assert!(store.hcompare_and_swap("plan", "a", b"x", b"y".to_vec()).await.unwrap());
        assert_eq!(store.hget("plan", "a").await.unwrap(), Some(b"y".to_vec()));
    }

    #[tokio::test]
    async fn hashes_are_independent_and_flush_clears_all() {
        let store = InMemoryKvStore::new();
        store.hset("plan", "a", b"1".to_vec()).await.unwrap();
        store.hset("other", "a", b"2".to_vec()).await.unwrap();
        assert!(store.hdel("plan", "a").await.unwrap());
        assert!(!store.hdel("plan", "a").await.unwrap());
        assert!(store.hexists("other", "a").await.unwrap());

        store.flush().await.unwrap();
        assert_eq!(store.field_count("other").await, 0);
    }
}
