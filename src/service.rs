//! Plan use cases: validate, version-check, merge, persist, then emit.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{Level, event};

use crate::core::{PlanError, Result};
use crate::events::{ChangeEvent, ChangeEventEmitter};
use crate::merge::merge;
use crate::model::Plan;
use crate::store::{PlanStore, ReadOutcome, VersionToken, Versioned};

/// Store mutations and their outbox records are appended under `commit`,
/// so events for the same plan leave in the order the store applied them.
#[derive(Clone)]
pub struct PlanService {
    store: PlanStore,
    emitter: Arc<ChangeEventEmitter>,
    commit: Arc<Mutex<()>>,
}

impl PlanService {
    pub fn new(store: PlanStore, emitter: Arc<ChangeEventEmitter>) -> Self {
        Self {
            store,
            emitter,
            commit: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &PlanStore {
        &self.store
    }

    pub async fn create(&self, body: Value) -> Result<Versioned<Plan>> {
        let plan = Plan::from_value(body)?;
        let change = ChangeEvent::created(&plan)?;
        let (token, outbox_id) = {
            let _commit = self.commit.lock().await;
            let token = self.store.create(&plan).await?;
            (token, self.emitter.enqueue(change).await)
        };
        self.emitter.deliver(outbox_id).await;

        event!(Level::INFO, object_id = %plan.object_id, "plan created");
        Ok(Versioned { value: plan, token })
    }

    pub async fn get(&self, object_id: &str, if_none_match: &[VersionToken]) -> Result<ReadOutcome> {
        self.store.conditional_read(object_id, if_none_match).await
    }

    /// Merges `patch` into the stored plan if `if_match` is its current version.
    ///
    /// Checks run in order: existence (404), version (412), merge and
    /// schema (400), then the conditional write (412 if another writer won).
    pub async fn patch(
        &self,
        object_id: &str,
        patch: &Value,
        if_match: Option<&VersionToken>,
    ) -> Result<Versioned<Plan>> {
        let current = self.store.read(object_id).await?;
        let Some(expected) = if_match else {
            return Err(PlanError::PreconditionFailed(
                "If-Match header is required to update a plan".to_string(),
            ));
        };
        if expected != &current.token {
            return Err(PlanError::PreconditionFailed(format!(
                "plan '{object_id}' has changed since version {expected}"
            )));
        }

        let merged = merge(&current.value, patch)?;
        let change = ChangeEvent::updated(&merged)?;
        let (token, outbox_id) = {
            let _commit = self.commit.lock().await;
            let token = self
                .store
                .conditional_write(object_id, &merged, Some(expected))
                .await?;
            (token, self.emitter.enqueue(change).await)
        };
        self.emitter.deliver(outbox_id).await;

        event!(Level::INFO, object_id = %object_id, "plan updated");
        Ok(Versioned { value: merged, token })
    }

    pub async fn delete(&self, object_id: &str) -> Result<()> {
        let outbox_id = {
            let _commit = self.commit.lock().await;
            self.store.delete(object_id).await?;
            self.emitter.enqueue(ChangeEvent::deleted(object_id)).await
        };
        self.emitter.deliver(outbox_id).await;

        event!(Level::INFO, object_id = %object_id, "plan deleted");
        Ok(())
    }
}
