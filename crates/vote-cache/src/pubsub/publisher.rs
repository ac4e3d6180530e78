//! Redis Pub/Sub publisher.
//!
//! Publishes committed reaction events so that other instances can push
//! them to their local subscribers.

use crate::pool::{RedisPool, RedisResult};
use crate::pubsub::PubSubChannel;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use vote_core::DomainEvent;

/// Event wrapper for Pub/Sub messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubEvent {
    /// Event type name (e.g., "REACTION_CHANGED")
    pub event_type: String,
    /// Event payload
    pub data: serde_json::Value,
    /// Instance that committed the change, so it can skip its own echoes
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub origin: Option<String>,
}

impl PubSubEvent {
    /// Create a new event
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            origin: None,
        }
    }

    /// Wrap a domain event
    pub fn from_domain(event: &DomainEvent) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event.event_type(), serde_json::to_value(event)?))
    }

    /// Tag the event with the publishing instance
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Decode the payload as a domain event
    pub fn domain_event(&self) -> Result<DomainEvent, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }

    /// True if this event was published by `origin`
    #[must_use]
    pub fn is_from(&self, origin: &str) -> bool {
        self.origin.as_deref() == Some(origin)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Channels a domain event fans out to
#[must_use]
pub fn channels_for(event: &DomainEvent) -> Vec<PubSubChannel> {
    let mut channels = vec![
        PubSubChannel::reactions(),
        PubSubChannel::entity(event.entity_id().clone()),
    ];
    if let DomainEvent::ReactionChanged(changed) = event {
        channels.push(PubSubChannel::user(changed.event.user_id.clone()));
    }
    channels
}

/// Redis Pub/Sub publisher
#[derive(Clone, Debug)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    /// Create a new publisher
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Publish an event to a channel
    pub async fn publish(&self, channel: &PubSubChannel, event: &PubSubEvent) -> RedisResult<u32> {
        let mut conn = self.pool.get().await?;
        let channel_name = channel.name();
        let payload = event.to_json()?;

        let receivers: u32 = conn.publish(&channel_name, &payload).await?;

        tracing::debug!(
            channel = %channel_name,
            event_type = %event.event_type,
            receivers = receivers,
            "Published event"
        );

        Ok(receivers)
    }

    /// Publish to multiple channels over one connection
    pub async fn publish_many(
        &self,
        channels: &[PubSubChannel],
        event: &PubSubEvent,
    ) -> RedisResult<u32> {
        let payload = event.to_json()?;
        let mut total_receivers = 0;
        let mut conn = self.pool.get().await?;

        for channel in channels {
            let receivers: u32 = conn.publish(channel.name(), &payload).await?;
            total_receivers += receivers;
        }

        tracing::debug!(
            channels = channels.len(),
            event_type = %event.event_type,
            total_receivers = total_receivers,
            "Published event to multiple channels"
        );

        Ok(total_receivers)
    }

    /// Publish a committed domain event to every channel it concerns
    pub async fn publish_domain_event(
        &self,
        event: &DomainEvent,
        origin: Option<&str>,
    ) -> RedisResult<u32> {
        let mut wrapped = PubSubEvent::from_domain(event)?;
        if let Some(origin) = origin {
            wrapped = wrapped.with_origin(origin);
        }
        self.publish_many(&channels_for(event), &wrapped).await
    }
}
