use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{Level, event};
use uuid::Uuid;

use super::event::ChangeEvent;
use super::transport::EventTransport;
use crate::core::RetryPolicy;

/// A change event waiting for delivery (at-least-once).
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxRecord {
    pub outbox_id: Uuid,
    pub event: ChangeEvent,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Published,
    /// Delivery failed; the record stays queued for the relay.
    Deferred,
}

/// Publishes change events in commit order through an outbox.
///
/// Events are queued first and drained strictly in order, so a delete is
/// never delivered ahead of the create it follows. A failed publish leaves
/// the record (and everything behind it) queued for the next drain.
pub struct ChangeEventEmitter {
    transport: Arc<dyn EventTransport>,
    topic: String,
    retry: RetryPolicy,
    pending: Mutex<Vec<OutboxRecord>>,
    dispatch: Mutex<()>,
}

impl ChangeEventEmitter {
    pub fn new(transport: Arc<dyn EventTransport>, topic: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            topic: topic.into(),
            retry,
            pending: Mutex::new(Vec::new()),
            dispatch: Mutex::new(()),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Appends `change` to the outbox without delivering it. Records are
    /// delivered in the order they were enqueued.
    pub async fn enqueue(&self, change: ChangeEvent) -> Uuid {
        let record = OutboxRecord {
            outbox_id: Uuid::new_v4(),
            event: change,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
        };
        let outbox_id = record.outbox_id;
        self.pending.lock().await.push(record);
        outbox_id
    }

    /// Queues `event` and tries to deliver the queue. Never fails: the
    /// store mutation that produced the event is already committed.
    pub async fn emit(&self, change: ChangeEvent) -> EmitOutcome {
        let outbox_id = self.enqueue(change).await;
        self.deliver(outbox_id).await
    }

    /// Drains the outbox and reports whether `outbox_id` got out.
    pub async fn deliver(&self, outbox_id: Uuid) -> EmitOutcome {
        self.drain().await;

        let still_pending = self
            .pending
            .lock()
            .await
            .iter()
            .any(|record| record.outbox_id == outbox_id);
        if still_pending {
            EmitOutcome::Deferred
        } else {
            EmitOutcome::Published
        }
    }

    /// Delivers queued records in order, stopping at the first failure.
    /// Returns how many records were delivered.
    pub async fn drain(&self) -> usize {
        let _dispatch = self.dispatch.lock().await;
        let mut delivered = 0;

        loop {
            let Some(record) = self.pending.lock().await.first().cloned() else {
                break;
            };

            let payload = match record.event.encode() {
                Ok(payload) => payload,
                Err(err) => {
                    event!(Level::ERROR, outbox_id = %record.outbox_id, error = %err, "dropping unencodable change event");
                    self.remove(record.outbox_id).await;
                    continue;
                }
            };

            let published = self
                .retry
                .run("outbox.publish", || {
                    self.transport.publish(&self.topic, payload.clone())
                })
                .await;

            match published {
                Ok(offset) => {
                    self.remove(record.outbox_id).await;
                    delivered += 1;
                    event!(
                        Level::DEBUG,
                        outbox_id = %record.outbox_id,
                        operation = record.event.operation.as_str(),
                        object_id = record.event.object_id().unwrap_or_default(),
                        offset,
                        "change event published"
                    );
                }
                Err(err) => {
                    let mut pending = self.pending.lock().await;
                    if let Some(queued) = pending
                        .iter_mut()
                        .find(|queued| queued.outbox_id == record.outbox_id)
                    {
                        queued.attempts += self.retry.max_attempts.max(1);
                        queued.last_error = Some(err.to_string());
                    }
                    event!(
                        Level::WARN,
                        outbox_id = %record.outbox_id,
                        queued = pending.len(),
                        error = %err,
                        "change event delivery deferred"
                    );
                    break;
                }
            }
        }

        delivered
    }

    pub async fn pending(&self) -> Vec<OutboxRecord> {
        self.pending.lock().await.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Periodically drains the outbox until `shutdown` flips to `true`.
    pub fn spawn_relay(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if self.pending_count().await > 0 {
                            let delivered = self.drain().await;
                            if delivered > 0 {
                                event!(Level::INFO, delivered, "outbox relay delivered deferred events");
                            }
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            self.drain().await;
        })
    }

    async fn remove(&self, outbox_id: Uuid) {
        self.pending
            .lock()
            .await
            .retain(|record| record.outbox_id != outbox_id);
    }
}
