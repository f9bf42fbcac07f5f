//! Secondary search index holding the Plan join hierarchy.
//!
//! - `document.rs` - index documents, join roles and the join mapping
//! - `query.rs` - the small query language used by projection and deletion
//! - `memory.rs` - sharded, routing-aware in-memory index
//! - `projector.rs` - Plan -> routed documents
//! - `cascade.rs` - routing-aware cascade delete
//! - `consumer.rs` - change-event consumer driving the two above

mod cascade;
mod consumer;
mod document;
mod memory;
mod projector;
mod query;

pub use cascade::{CascadeDeleter, CascadeReport};
pub use consumer::{IndexCommand, IndexConsumer, ParkedEvent};
pub use document::{IndexDocument, JOIN_FIELD, JoinMapping, JoinRole};
pub use memory::InMemorySearchIndex;
pub use projector::{IndexProjector, project};
pub use query::Query;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::PlanError;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index '{0}' not found")]
    IndexNotFound(String),
    #[error("document '{id}' rejected: {reason}")]
    Rejected { id: String, reason: String },
    #[error("index unavailable: {0}")]
    Unavailable(String),
}

impl From<IndexError> for PlanError {
    fn from(err: IndexError) -> Self {
        PlanError::Index(err.to_string())
    }
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub routing: Option<String>,
    pub source: Value,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Creates the index if it does not exist. Existing indices are left as is.
    async fn create_index(&self, index: &str, mapping: JoinMapping) -> IndexResult<()>;

    /// Upserts by id within the shard selected by the routing key.
    async fn index(&self, index: &str, document: IndexDocument) -> IndexResult<()>;

    async fn get(&self, index: &str, id: &str, routing: Option<&str>) -> IndexResult<Option<Hit>>;

    /// Hits ordered by id. With a routing key only that key's shard is searched.
    async fn search(
        &self,
        index: &str,
        query: &Query,
        routing: Option<&str>,
        from: usize,
        size: usize,
    ) -> IndexResult<Vec<Hit>>;

    /// Returns the number of deleted documents.
    async fn delete_by_query(&self, index: &str, query: &Query, routing: Option<&str>) -> IndexResult<u64>;

    async fn count(&self, index: &str) -> IndexResult<usize>;
}
