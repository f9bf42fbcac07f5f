//! Primary key-value store.
//!
//! The store is modelled as hashes of fields (one hash per entity kind),
//! with an atomic compare-and-swap primitive that the optimistic
//! concurrency layer in `accessor.rs` builds on.

mod accessor;
mod memory;

pub use accessor::{PlanStore, ReadOutcome, VersionToken, Versioned};
pub use memory::InMemoryKvStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::PlanError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for PlanError {
    fn from(err: StoreError) -> Self {
        PlanError::Store(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn hget(&self, hash: &str, field: &str) -> StoreResult<Option<Vec<u8>>>;

    async fn hexists(&self, hash: &str, field: &str) -> StoreResult<bool> {
        Ok(self.hget(hash, field).await?.is_some())
    }

    /// Sets the field only when it does not exist yet. Returns `true` when written.
    async fn hset_nx(&self, hash: &str, field: &str, value: Vec<u8>) -> StoreResult<bool>;

    async fn hset(&self, hash: &str, field: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Replaces the field only if its current bytes equal `expected`.
    /// Returns `false` when the field is absent or holds something else.
    async fn hcompare_and_swap(
        &self,
        hash: &str,
        field: &str,
        expected: &[u8],
        value: Vec<u8>,
    ) -> StoreResult<bool>;

    /// Returns `true` when a field was removed.
    async fn hdel(&self, hash: &str, field: &str) -> StoreResult<bool>;

    async fn flush(&self) -> StoreResult<()>;
}
