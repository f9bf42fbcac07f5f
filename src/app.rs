//! Wiring and lifecycle of the service.
//!
//! Every collaborator (primary store, search index, message broker, token
//! verifier) is constructed here and injected; nothing is global. `open`
//! starts the background outbox relay and index consumer, `shutdown` stops
//! them and drains what is left.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::auth::{AllowAllVerifier, AuthVerifier, JwtVerifier};
use crate::config::{AppConfig, AuthMode};
use crate::events::{ChangeEventEmitter, InMemoryBroker};
use crate::index::{CascadeDeleter, InMemorySearchIndex, IndexConsumer, IndexProjector, SearchIndex};
use crate::service::PlanService;
use crate::store::{InMemoryKvStore, KvStore, PlanStore};
use crate::web::{AppState, build_router};

/// External collaborators the service runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub kv: Arc<dyn KvStore>,
    pub index: Arc<dyn SearchIndex>,
    pub broker: Arc<InMemoryBroker>,
    pub auth: Arc<dyn AuthVerifier>,
}

impl Collaborators {
    pub fn in_memory(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            kv: Arc::new(InMemoryKvStore::new()),
            index: Arc::new(InMemorySearchIndex::new(config.index_shards)),
            broker: Arc::new(InMemoryBroker::new()),
            auth: verifier_for(config)?,
        })
    }
}

pub fn verifier_for(config: &AppConfig) -> Result<Arc<dyn AuthVerifier>> {
    match config.auth.mode {
        AuthMode::Disabled => Ok(Arc::new(AllowAllVerifier)),
        AuthMode::Jwt => {
            let secret = config
                .auth
                .jwt_secret
                .as_deref()
                .context("AUTH_JWT_SECRET is required when AUTH_MODE=jwt")?;
            Ok(Arc::new(JwtVerifier::hs256(
                secret.as_bytes(),
                config.auth.jwt_issuer.as_deref(),
                config.auth.jwt_audience.as_deref(),
            )))
        }
    }
}

pub struct PlanApp {
    state: AppState,
    emitter: Arc<ChangeEventEmitter>,
    broker: Arc<InMemoryBroker>,
    shutdown: watch::Sender<bool>,
    relay: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl PlanApp {
    pub async fn open(config: &AppConfig) -> Result<Self> {
        Self::open_with(config, Collaborators::in_memory(config)?).await
    }

    pub async fn open_with(config: &AppConfig, collaborators: Collaborators) -> Result<Self> {
        let store = PlanStore::new(collaborators.kv.clone(), config.plan_hash_key.clone());
        if config.flush_store_on_startup {
            store.flush().await.context("failed to flush primary store")?;
            info!(hash = %config.plan_hash_key, "primary store flushed on startup");
        }

        collaborators
            .index
            .create_index(&config.index_name, IndexConsumer::mapping())
            .await
            .with_context(|| format!("failed to create index '{}'", config.index_name))?;

        let emitter = Arc::new(ChangeEventEmitter::new(
            collaborators.broker.clone(),
            config.events_topic.clone(),
            config.retry.clone(),
        ));

        let consumer = IndexConsumer::new(
            IndexProjector::new(collaborators.index.clone(), config.index_name.clone(), config.retry.clone()),
            CascadeDeleter::new(
                collaborators.index.clone(),
                config.index_name.clone(),
                config.retry.clone(),
                config.cascade_page_size,
            ),
            config.retry.clone(),
        );
        let subscription = collaborators
            .broker
            .subscribe(&config.events_topic)
            .await
            .context("failed to subscribe to change events")?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let relay = emitter.clone().spawn_relay(
            Duration::from_millis(config.outbox_relay_interval_ms.max(1)),
            shutdown_rx.clone(),
        );
        let replay_interval = Duration::from_millis(config.index_replay_interval_ms.max(1));
        let consumer_task = tokio::spawn(async move {
            consumer.run(subscription, shutdown_rx, replay_interval).await;
        });

        let state = AppState::new(PlanService::new(store, emitter.clone()), collaborators.auth);
        info!(
            index = %config.index_name,
            topic = %config.events_topic,
            "plan service opened"
        );

        Ok(Self {
            state,
            emitter,
            broker: collaborators.broker,
            shutdown,
            relay,
            consumer: consumer_task,
        })
    }

    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stops background work. Queued change events get a final delivery
    /// attempt and the consumer finishes what the broker already holds.
    pub async fn shutdown(self) {
        self.emitter.drain().await;
        self.broker.close().await;
        if let Err(err) = self.consumer.await {
            warn!(error = %err, "index consumer ended abnormally");
        }

        let _ = self.shutdown.send(true);
        if let Err(err) = self.relay.await {
            warn!(error = %err, "outbox relay ended abnormally");
        }
        info!("plan service stopped");
    }
}
