use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tracing::{Instrument, Level, event, info_span};

use super::cascade::CascadeDeleter;
use super::document::JoinMapping;
use super::projector::IndexProjector;
use crate::core::{PlanError, Result, RetryPolicy};
use crate::events::{ChangeEvent, Operation, Subscription};
use crate::model::Plan;

/// What a change event asks the index to do.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexCommand {
    Upsert(Plan),
    Delete(String),
}

impl IndexCommand {
    /// Decodes and validates an envelope. Failures here are permanent.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let change = ChangeEvent::decode(payload)?;
        match change.operation {
            Operation::Create | Operation::Update => Ok(Self::Upsert(Plan::from_value(change.data)?)),
            Operation::Delete => change
                .data
                .get("objectId")
                .and_then(Value::as_str)
                .map(|id| Self::Delete(id.to_string()))
                .ok_or_else(|| PlanError::Validation("delete event without objectId".to_string())),
        }
    }

    pub fn object_id(&self) -> &str {
        match self {
            Self::Upsert(plan) => &plan.object_id,
            Self::Delete(id) => id,
        }
    }
}

/// A change event whose index work failed, kept for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ParkedEvent {
    pub command: IndexCommand,
    pub offset: u64,
    pub attempts: u32,
    pub last_error: String,
}

/// Applies change events to the search index.
///
/// Tolerates duplicate and replayed delivery: upserts overwrite by id and
/// cascade deletes are idempotent. An event that still fails after
/// `event_retry` is parked and replayed on the next tick; later events for
/// the same plan queue behind it so the index sees them in order.
pub struct IndexConsumer {
    projector: IndexProjector,
    deleter: CascadeDeleter,
    event_retry: RetryPolicy,
    parked: Mutex<Vec<ParkedEvent>>,
}

impl IndexConsumer {
    pub fn new(projector: IndexProjector, deleter: CascadeDeleter, event_retry: RetryPolicy) -> Self {
        Self {
            projector,
            deleter,
            event_retry,
            parked: Mutex::new(Vec::new()),
        }
    }

    pub async fn apply(&self, command: &IndexCommand) -> Result<()> {
        match command {
            IndexCommand::Upsert(plan) => self.projector.apply(plan).await.map(|_| ()),
            IndexCommand::Delete(plan_id) => self.deleter.delete_plan(plan_id).await.map(|_| ()),
        }
    }

    /// Decodes and applies one message, retrying the whole event on failure.
    pub async fn handle(&self, payload: &[u8]) -> Result<()> {
        let command = IndexCommand::decode(payload)?;
        self.apply_with_retry(&command).await
    }

    /// Handles one delivery. Malformed payloads are rejected; index failures
    /// park the event instead of surfacing an error.
    pub async fn process(&self, payload: &[u8], offset: u64) -> Result<()> {
        let command = IndexCommand::decode(payload)?;

        let mut parked = self.parked.lock().await;
        if parked
            .iter()
            .any(|queued| queued.command.object_id() == command.object_id())
        {
            event!(Level::WARN, offset, object_id = %command.object_id(), "change event queued behind a parked event");
            parked.push(ParkedEvent {
                command,
                offset,
                attempts: 0,
                last_error: "waiting for an earlier event".to_string(),
            });
            return Ok(());
        }
        drop(parked);

        if let Err(err) = self.apply_with_retry(&command).await {
            event!(Level::ERROR, offset, object_id = %command.object_id(), error = %err, "change event parked for replay");
            self.parked.lock().await.push(ParkedEvent {
                command,
                offset,
                attempts: self.event_retry.max_attempts.max(1),
                last_error: err.to_string(),
            });
        }
        Ok(())
    }

    /// Replays parked events in arrival order. Once an event for a plan
    /// fails again, the rest of that plan's events stay parked.
    /// Returns how many events were applied.
    pub async fn replay_parked(&self) -> usize {
        let queued = std::mem::take(&mut *self.parked.lock().await);
        if queued.is_empty() {
            return 0;
        }

        let mut blocked: HashSet<String> = HashSet::new();
        let mut still_parked = Vec::new();
        let mut applied = 0;
        for mut parked in queued {
            let object_id = parked.command.object_id().to_string();
            if blocked.contains(&object_id) {
                still_parked.push(parked);
                continue;
            }
            match self.apply(&parked.command).await {
                Ok(()) => applied += 1,
                Err(err) => {
                    parked.attempts += 1;
                    parked.last_error = err.to_string();
                    event!(Level::WARN, offset = parked.offset, object_id = %object_id, attempts = parked.attempts, error = %err, "parked change event failed again");
                    blocked.insert(object_id);
                    still_parked.push(parked);
                }
            }
        }

        // Events parked while this replay ran go after the survivors.
        let mut parked = self.parked.lock().await;
        still_parked.append(&mut parked);
        *parked = still_parked;
        if applied > 0 {
            event!(Level::INFO, applied, remaining = parked.len(), "parked change events replayed");
        }
        applied
    }

    pub async fn parked(&self) -> Vec<ParkedEvent> {
        self.parked.lock().await.clone()
    }

    /// Consumes `subscription` until it ends or `shutdown` flips to `true`,
    /// replaying parked events every `replay_interval`.
    pub async fn run(
        &self,
        mut subscription: Subscription,
        mut shutdown: watch::Receiver<bool>,
        replay_interval: Duration,
    ) {
        event!(Level::INFO, topic = subscription.topic(), "index consumer started");
        let mut ticker = tokio::time::interval(replay_interval);
        loop {
            tokio::select! {
                delivery = subscription.next() => {
                    let Some(delivery) = delivery else {
                        break;
                    };
                    let span = info_span!("index.consume", topic = %delivery.topic, offset = delivery.offset);
                    if let Err(err) = self.process(&delivery.payload, delivery.offset).instrument(span).await {
                        event!(Level::WARN, offset = delivery.offset, error = %err, "skipping malformed change event");
                    }
                }
                _ = ticker.tick() => {
                    self.replay_parked().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.replay_parked().await;
        let remaining = self.parked.lock().await.len();
        if remaining > 0 {
            event!(Level::ERROR, remaining, "index consumer stopped with parked change events");
        }
        event!(Level::INFO, "index consumer stopped");
    }

    pub fn mapping() -> JoinMapping {
        JoinMapping::plan_hierarchy()
    }

    async fn apply_with_retry(&self, command: &IndexCommand) -> Result<()> {
        self.event_retry
            .run("index.event", || self.apply(command))
            .await
    }
}
