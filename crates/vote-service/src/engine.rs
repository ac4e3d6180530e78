//! Engine setup and initialization
//!
//! Wires the store, the optional Redis fan-out and the subscription bus
//! from an [`AppConfig`], and hands out one [`ServiceContext`] per session.

use std::sync::Arc;

use tracing::info;
use vote_cache::{
    PubSubChannel, Publisher, RedisEventSink, RedisPool, Subscriber, SubscriberConfig,
};
use vote_common::{AppConfig, AppError, VoteSettings};
use vote_core::{IdentityProvider, ReactionEventSink, ReactionStore};
use vote_db::{create_pool, run_migrations, MemoryReactionStore, PgReactionStore, PoolConfig};

use crate::bus::{EventRelay, SubscriptionBus};
use crate::services::ServiceContext;

/// Shared infrastructure behind every session's [`ServiceContext`]
pub struct Engine {
    store: Arc<dyn ReactionStore>,
    sink: Option<Arc<dyn ReactionEventSink>>,
    bus: SubscriptionBus,
    settings: VoteSettings,
    origin: String,
    relay: Option<EventRelay>,
    subscriber: Option<Subscriber>,
}

impl Engine {
    /// Connect to PostgreSQL, run migrations, and join the Redis fan-out
    /// when `config.redis` is set
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        config.votes.validate()?;

        info!("Connecting to PostgreSQL...");
        let pool = create_pool(&PoolConfig::from(&config.database))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        run_migrations(&pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        info!("PostgreSQL connection established");

        let mut engine = Self::with_store(Arc::new(PgReactionStore::new(pool)), config.votes.clone());

        if let Some(redis) = &config.redis {
            info!("Connecting to Redis...");
            let redis_pool = RedisPool::from_config(redis).map_err(|e| AppError::Cache(e.to_string()))?;
            redis_pool
                .health_check()
                .await
                .map_err(|e| AppError::Cache(e.to_string()))?;

            let sink = RedisEventSink::new(Publisher::new(redis_pool), engine.origin.clone());
            let subscriber =
                Subscriber::spawn(SubscriberConfig::from(redis), &[PubSubChannel::reactions()]);
            let relay = EventRelay::spawn(engine.bus.clone(), subscriber.receiver(), engine.origin.clone());

            engine.sink = Some(Arc::new(sink));
            engine.subscriber = Some(subscriber);
            engine.relay = Some(relay);
            info!(origin = %engine.origin, "Redis fan-out enabled");
        }

        Ok(engine)
    }

    /// Single-instance engine over an in-memory store
    pub fn in_memory(settings: VoteSettings) -> Self {
        Self::with_store(Arc::new(MemoryReactionStore::new()), settings)
    }

    /// Single-instance engine over any store
    pub fn with_store(store: Arc<dyn ReactionStore>, settings: VoteSettings) -> Self {
        Self {
            store,
            sink: None,
            bus: SubscriptionBus::new(),
            settings,
            origin: uuid::Uuid::new_v4().to_string(),
            relay: None,
            subscriber: None,
        }
    }

    /// Service context acting for one session
    pub fn context(&self, identity: Arc<dyn IdentityProvider>) -> Result<ServiceContext, AppError> {
        let mut builder = ServiceContext::builder()
            .store(Arc::clone(&self.store))
            .identity(identity)
            .bus(self.bus.clone())
            .settings(self.settings.clone());
        if let Some(sink) = &self.sink {
            builder = builder.sink(Arc::clone(sink));
        }
        builder.build().map_err(AppError::from)
    }

    pub fn bus(&self) -> &SubscriptionBus {
        &self.bus
    }

    /// Tag this instance puts on the events it publishes
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Whether committed events also go to other instances
    pub fn is_distributed(&self) -> bool {
        self.sink.is_some()
    }

    /// Stop the Redis relay and subscriber, if running
    pub async fn shutdown(&self) {
        if let Some(relay) = &self.relay {
            relay.abort();
        }
        if let Some(subscriber) = &self.subscriber {
            if let Err(e) = subscriber.shutdown().await {
                tracing::debug!(error = %e, "Subscriber already stopped");
            }
        }
        info!("Engine stopped");
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("origin", &self.origin)
            .field("distributed", &self.is_distributed())
            .field("bus", &self.bus)
            .finish()
    }
}
