//! Redis-backed event sink for the reaction service

use async_trait::async_trait;
use vote_core::{DomainError, DomainEvent, ReactionEventSink, RepoResult};

use crate::pubsub::Publisher;

/// Publishes committed domain events to Redis, tagged with this instance's
/// origin so its own relay can skip them.
#[derive(Debug, Clone)]
pub struct RedisEventSink {
    publisher: Publisher,
    origin: String,
}

impl RedisEventSink {
    pub fn new(publisher: Publisher, origin: impl Into<String>) -> Self {
        Self {
            publisher,
            origin: origin.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[async_trait]
impl ReactionEventSink for RedisEventSink {
    async fn publish(&self, event: &DomainEvent) -> RepoResult<()> {
        self.publisher
            .publish_domain_event(event, Some(&self.origin))
            .await
            .map(|_| ())
            .map_err(DomainError::from)
    }
}
