use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Level, event};

use super::KvStore;
use crate::core::{PlanError, Result, canonical_json_bytes, sha256_hex};
use crate::model::Plan;

/// Content-derived version of a stored document (the HTTP ETag).
///
/// It is the SHA-256 of the canonical serialization, so any process that
/// reads the same document computes the same token.
const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn of(value: &Value) -> Self {
        Self(sha256_hex(&canonical_json_bytes(value)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted strong validator, as sent in the `ETag` header.
    pub fn header_value(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Parses one entity tag, accepting quoted, unquoted and weak (`W/`) forms.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);
        let unquoted = trimmed.trim_matches('"').trim();
        if unquoted.is_empty() || unquoted == "*" {
            return None;
        }
        Some(Self(unquoted.to_string()))
    }

    /// Parses a comma separated `If-None-Match` list. A `*` entry becomes
    /// the wildcard, which matches any current version.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',')
            .filter_map(|item| {
                if item.trim() == WILDCARD {
                    Some(Self::wildcard())
                } else {
                    Self::parse(item)
                }
            })
            .collect()
    }

    pub fn wildcard() -> Self {
        Self(WILDCARD.to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }

    fn matches(&self, current: &VersionToken) -> bool {
        self.is_wildcard() || self == current
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub token: VersionToken,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The caller already holds the current version.
    Unchanged(VersionToken),
    Modified(Versioned<Plan>),
}

struct StoredPlan {
    raw: Vec<u8>,
    plan: Plan,
    token: VersionToken,
}

/// Plan access with content-hash versioning on top of a [`KvStore`].
#[derive(Clone)]
pub struct PlanStore {
    kv: Arc<dyn KvStore>,
    hash: String,
}

impl PlanStore {
    pub fn new(kv: Arc<dyn KvStore>, hash: impl Into<String>) -> Self {
        Self {
            kv,
            hash: hash.into(),
        }
    }

    pub fn hash_key(&self) -> &str {
        &self.hash
    }

    pub async fn create(&self, plan: &Plan) -> Result<VersionToken> {
        let value = plan.to_value()?;
        let written = self
            .kv
            .hset_nx(&self.hash, &plan.object_id, canonical_json_bytes(&value))
            .await?;
        if !written {
            return Err(PlanError::Conflict(plan.object_id.clone()));
        }
        event!(Level::DEBUG, object_id = %plan.object_id, "plan stored");
        Ok(VersionToken::of(&value))
    }

    pub async fn read(&self, object_id: &str) -> Result<Versioned<Plan>> {
        let stored = self.load(object_id).await?;
        Ok(Versioned {
            value: stored.plan,
            token: stored.token,
        })
    }

    /// Returns [`ReadOutcome::Unchanged`] when any of `client_tokens` is
    /// current or is the wildcard.
    pub async fn conditional_read(
        &self,
        object_id: &str,
        client_tokens: &[VersionToken],
    ) -> Result<ReadOutcome> {
        let current = self.read(object_id).await?;
        if client_tokens.iter().any(|token| token.matches(&current.token)) {
            return Ok(ReadOutcome::Unchanged(current.token));
        }
        Ok(ReadOutcome::Modified(current))
    }

    /// Replaces the stored plan only if it is still at version `expected`.
    ///
    /// A missing `expected` is rejected: updates must prove they read the
    /// current state first.
    pub async fn conditional_write(
        &self,
        object_id: &str,
        plan: &Plan,
        expected: Option<&VersionToken>,
    ) -> Result<VersionToken> {
        let Some(expected) = expected else {
            return Err(PlanError::PreconditionFailed(
                "an If-Match version token is required".to_string(),
            ));
        };
        if plan.object_id != object_id {
            return Err(PlanError::ImmutableField("objectId".to_string()));
        }

        let stored = self.load(object_id).await?;
        if &stored.token != expected {
            return Err(PlanError::PreconditionFailed(format!(
                "version {expected} is stale for plan '{object_id}'"
            )));
        }

        let value = plan.to_value()?;
        let swapped = self
            .kv
            .hcompare_and_swap(&self.hash, object_id, &stored.raw, canonical_json_bytes(&value))
            .await?;
        if !swapped {
            return Err(PlanError::PreconditionFailed(format!(
                "plan '{object_id}' was modified concurrently"
            )));
        }
        Ok(VersionToken::of(&value))
    }

    pub async fn delete(&self, object_id: &str) -> Result<()> {
        if !self.kv.hdel(&self.hash, object_id).await? {
            return Err(PlanError::NotFound(object_id.to_string()));
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        self.kv.flush().await?;
        Ok(())
    }

    async fn load(&self, object_id: &str) -> Result<StoredPlan> {
        let raw = self
            .kv
            .hget(&self.hash, object_id)
            .await?
            .ok_or_else(|| PlanError::NotFound(object_id.to_string()))?;
        let value: Value = serde_json::from_slice(&raw)
            .map_err(|err| PlanError::Store(format!("corrupt plan '{object_id}': {err}")))?;
        let token = VersionToken::of(&value);
        let plan = Plan::from_value(value)
            .map_err(|err| PlanError::Store(format!("corrupt plan '{object_id}': {err}")))?;
        Ok(StoredPlan { raw, plan, token })
    }
}
