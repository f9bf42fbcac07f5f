use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::document::{IndexDocument, JoinMapping};
use super::query::Query;
use super::{Hit, IndexError, IndexResult, SearchIndex};

#[derive(Debug, Clone)]
struct StoredDoc {
    routing: Option<String>,
    source: Value,
}

#[derive(Debug)]
struct IndexState {
    mapping: Option<JoinMapping>,
    shards: Vec<BTreeMap<String, StoredDoc>>,
}

impl IndexState {
    fn new(shard_count: usize, mapping: Option<JoinMapping>) -> Self {
        Self {
            mapping,
            shards: vec![BTreeMap::new(); shard_count],
        }
    }

    /// Shards a request touches: the routed shard only, or all of them.
    fn shard_ids(&self, routing: Option<&str>) -> Vec<usize> {
        match routing {
            Some(key) => vec![shard_for(key, self.shards.len())],
            None => (0..self.shards.len()).collect(),
        }
    }
}

fn shard_for(routing_key: &str, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    routing_key.hash(&mut hasher);
    (hasher.finish() % shard_count.max(1) as u64) as usize
}

/// Search index partitioned into shards by routing key (the document id
/// when no routing is given), enforcing the join mapping on writes.
#[derive(Debug)]
pub struct InMemorySearchIndex {
    shard_count: usize,
    indices: RwLock<HashMap<String, IndexState>>,
    failing_routes: RwLock<HashSet<String>>,
}

impl Default for InMemorySearchIndex {
    fn default() -> Self {
        Self::new(5)
    }
}

impl InMemorySearchIndex {
    pub fn new(shard_count: usize) -> Self {
        Self {
            shard_count: shard_count.max(1),
            indices: RwLock::new(HashMap::new()),
            failing_routes: RwLock::new(HashSet::new()),
        }
    }

    /// Makes every routed delete-by-query for `routing` fail until restored.
    pub async fn fail_deletes_routed_to(&self, routing: &str) {
        self.failing_routes.write().await.insert(routing.to_string());
    }

    pub async fn restore_deletes(&self) {
        self.failing_routes.write().await.clear();
    }

    /// Every stored document, ordered by id.
    pub async fn documents(&self, index: &str) -> Vec<Hit> {
        let indices = self.indices.read().await;
        let Some(state) = indices.get(index) else {
            return Vec::new();
        };
        let mut hits: Vec<Hit> = state
            .shards
            .iter()
            .flat_map(|shard| shard.iter().map(|(id, doc)| to_hit(id, doc)))
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        hits
    }

    fn check_join(mapping: &JoinMapping, document: &IndexDocument) -> IndexResult<()> {
        let rejected = |reason: String| IndexError::Rejected {
            id: document.id.clone(),
            reason,
        };
        let join = document
            .source
            .get(&mapping.join_field)
            .ok_or_else(|| rejected(format!("missing join field '{}'", mapping.join_field)))?;
        let role = join
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| rejected("join field has no name".to_string()))?;
        if !mapping.knows(role) {
            return Err(rejected(format!("unknown join role '{role}'")));
        }

        let parent = join.get("parent").and_then(Value::as_str);
        match (mapping.parent_of(role), parent) {
            (Some(_), None) => Err(rejected(format!("join role '{role}' requires a parent"))),
            (Some(_), Some(_)) if document.routing.is_none() => {
                Err(rejected("routing is required for child documents".to_string()))
            }
            (None, Some(_)) => Err(rejected(format!("join role '{role}' is a root"))),
            _ => Ok(()),
        }
    }
}

fn to_hit(id: &str, doc: &StoredDoc) -> Hit {
    Hit {
        id: id.to_string(),
        routing: doc.routing.clone(),
        source: doc.source.clone(),
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn create_index(&self, index: &str, mapping: JoinMapping) -> IndexResult<()> {
        let mut indices = self.indices.write().await;
        indices
            .entry(index.to_string())
            .or_insert_with(|| IndexState::new(self.shard_count, Some(mapping)));
        Ok(())
    }

    async fn index(&self, index: &str, document: IndexDocument) -> IndexResult<()> {
        let mut indices = self.indices.write().await;
        let state = indices
            .entry(index.to_string())
            .or_insert_with(|| IndexState::new(self.shard_count, None));
        if let Some(mapping) = &state.mapping {
            Self::check_join(mapping, &document)?;
        }

        let key = document.routing.as_deref().unwrap_or(&document.id);
        let shard = shard_for(key, state.shards.len());
        state.shards[shard].insert(
            document.id,
            StoredDoc {
                routing: document.routing,
                source: document.source,
            },
        );
        Ok(())
    }

    async fn get(&self, index: &str, id: &str, routing: Option<&str>) -> IndexResult<Option<Hit>> {
        let indices = self.indices.read().await;
        let state = indices
            .get(index)
            .ok_or_else(|| IndexError::IndexNotFound(index.to_string()))?;
        let shard = shard_for(routing.unwrap_or(id), state.shards.len());
        Ok(state.shards[shard].get(id).map(|doc| to_hit(id, doc)))
    }

    async fn search(
        &self,
        index: &str,
        query: &Query,
        routing: Option<&str>,
        from: usize,
        size: usize,
    ) -> IndexResult<Vec<Hit>> {
        let indices = self.indices.read().await;
        let state = indices
            .get(index)
            .ok_or_else(|| IndexError::IndexNotFound(index.to_string()))?;

        let mut hits: Vec<Hit> = state
            .shard_ids(routing)
            .into_iter()
            .flat_map(|shard| state.shards[shard].iter())
            .filter(|(id, doc)| query.matches(id, &doc.source))
            .map(|(id, doc)| to_hit(id, doc))
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits.into_iter().skip(from).take(size).collect())
    }

    async fn delete_by_query(&self, index: &str, query: &Query, routing: Option<&str>) -> IndexResult<u64> {
        if let Some(key) = routing {
            if self.failing_routes.read().await.contains(key) {
                return Err(IndexError::Unavailable(format!(
                    "shard for routing '{key}' is unavailable"
                )));
            }
        }

        let mut indices = self.indices.write().await;
        let state = indices
            .get_mut(index)
            .ok_or_else(|| IndexError::IndexNotFound(index.to_string()))?;

        let mut deleted = 0u64;
        for shard in state.shard_ids(routing) {
            let before = state.shards[shard].len();
            state.shards[shard].retain(|id, doc| !query.matches(id, &doc.source));
            deleted += (before - state.shards[shard].len()) as u64;
        }
        Ok(deleted)
    }

    async fn count(&self, index: &str) -> IndexResult<usize> {
        let indices = self.indices.read().await;
        let state = indices
            .get(index)
            .ok_or_else(|| IndexError::IndexNotFound(index.to_string()))?;
        Ok(state.shards.iter().map(BTreeMap::len).sum())
    }
}
