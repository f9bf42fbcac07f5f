use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use crate::core::PlanError;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    #[error("topic '{0}' already has a consumer")]
    AlreadySubscribed(String),
    #[error("broker closed")]
    Closed,
}

impl From<TransportError> for PlanError {
    fn from(err: TransportError) -> Self {
        PlanError::Transport(err.to_string())
    }
}

#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Publishes one message and returns its offset within the topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<u64, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub offset: u64,
    pub payload: Vec<u8>,
}

struct TopicChannel {
    sender: mpsc::UnboundedSender<Delivery>,
    receiver: Option<mpsc::UnboundedReceiver<Delivery>>,
    next_offset: u64,
}

impl TopicChannel {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
            next_offset: 0,
        }
    }
}

/// In-process topics with a single consumer group each.
///
/// Messages published before anyone subscribes are buffered and handed to
/// the first subscriber, so nothing is lost across startup ordering.
pub struct InMemoryBroker {
    topics: Mutex<HashMap<String, TopicChannel>>,
    available: AtomicBool,
    closed: AtomicBool,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// Simulates an outage: publishes fail while unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        let mut topics = self.topics.lock().await;
        let channel = topics
            .entry(topic.to_string())
            .or_insert_with(TopicChannel::new);
        let receiver = channel
            .receiver
            .take()
            .ok_or_else(|| TransportError::AlreadySubscribed(topic.to_string()))?;
        Ok(Subscription {
            topic: topic.to_string(),
            receiver,
        })
    }

    /// Ends every subscription once buffered messages are drained.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.topics.lock().await.clear();
    }
}

#[async_trait]
impl EventTransport for InMemoryBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<u64, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable(format!("cannot reach topic '{topic}'")));
        }

        let mut topics = self.topics.lock().await;
        let channel = topics
            .entry(topic.to_string())
            .or_insert_with(TopicChannel::new);
        let offset = channel.next_offset;
        channel
            .sender
            .send(Delivery {
                topic: topic.to_string(),
                offset,
                payload,
            })
            .map_err(|_| TransportError::Closed)?;
        channel.next_offset += 1;
        Ok(offset)
    }
}

pub struct Subscription {
    topic: String,
    receiver: mpsc::UnboundedReceiver<Delivery>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next message, or `None` once the broker is closed and drained.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    pub fn try_next(&mut self) -> Option<Delivery> {
        self.receiver.try_recv().ok()
    }
}
