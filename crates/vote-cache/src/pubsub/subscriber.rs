//! Redis Pub/Sub subscriber.
//!
//! Holds a dedicated Pub/Sub connection in a background task and fans
//! received messages out over a tokio broadcast channel. The task
//! reconnects and resubscribes after connection loss; messages published
//! while disconnected are lost, so consumers must tolerate gaps.

use crate::pool::redact_url;
use crate::pubsub::{PubSubChannel, PubSubEvent};
use futures_util::StreamExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use vote_core::DomainEvent;

/// Error type for subscriber operations
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to parse event: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Subscriber task has stopped")]
    ChannelClosed,
}

/// Result type for subscriber operations
pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// Message received from Pub/Sub
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Channel the message was received on
    pub channel: PubSubChannel,
    /// Parsed envelope (if valid JSON)
    pub event: Option<PubSubEvent>,
    /// Raw payload
    pub payload: String,
}

impl ReceivedMessage {
    fn from_redis(channel_name: &str, payload: String) -> Self {
        Self {
            channel: PubSubChannel::parse(channel_name),
            event: serde_json::from_str(&payload).ok(),
            payload,
        }
    }

    /// Decode the domain event carried by this message
    pub fn domain_event(&self) -> SubscriberResult<DomainEvent> {
        match &self.event {
            Some(envelope) => Ok(envelope.domain_event()?),
            None => Ok(serde_json::from_str::<PubSubEvent>(&self.payload)?.domain_event()?),
        }
    }

    /// Origin tag of the publishing instance, if any
    pub fn origin(&self) -> Option<&str> {
        self.event.as_ref().and_then(|e| e.origin.as_deref())
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Capacity of the local broadcast channel
    pub broadcast_buffer: usize,
    /// Delay before reconnecting after a connection error
    pub reconnect_delay: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl From<&vote_common::RedisConfig> for SubscriberConfig {
    fn from(config: &vote_common::RedisConfig) -> Self {
        Self {
            redis_url: config.url.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
enum Command {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Shutdown,
}

enum Exit {
    Shutdown,
    Reconnect,
}

/// Redis Pub/Sub subscriber
#[derive(Debug)]
pub struct Subscriber {
    channels: Arc<RwLock<BTreeSet<String>>>,
    messages: broadcast::Sender<ReceivedMessage>,
    control: mpsc::Sender<Command>,
}

impl Subscriber {
    /// Start the background listener, subscribed to `initial`
    pub fn spawn(config: SubscriberConfig, initial: &[PubSubChannel]) -> Self {
        let (messages, _) = broadcast::channel(config.broadcast_buffer.max(1));
        let (control, control_rx) = mpsc::channel(32);
        let channels: BTreeSet<String> = initial.iter().map(PubSubChannel::name).collect();
        let channels = Arc::new(RwLock::new(channels));

        tokio::spawn(run(config, channels.clone(), messages.clone(), control_rx));

        Self {
            channels,
            messages,
            control,
        }
    }

    /// Subscribe to more channels
    pub async fn subscribe(&self, channels: &[PubSubChannel]) -> SubscriberResult<()> {
        self.send(Command::Subscribe(channels.iter().map(PubSubChannel::name).collect()))
            .await
    }

    /// Unsubscribe from channels
    pub async fn unsubscribe(&self, channels: &[PubSubChannel]) -> SubscriberResult<()> {
        self.send(Command::Unsubscribe(channels.iter().map(PubSubChannel::name).collect()))
            .await
    }

    /// Receiver for messages arriving after this call
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<ReceivedMessage> {
        self.messages.subscribe()
    }

    /// Channels currently subscribed
    pub async fn subscribed_channels(&self) -> Vec<String> {
        self.channels.read().await.iter().cloned().collect()
    }

    /// Stop the background listener
    pub async fn shutdown(&self) -> SubscriberResult<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> SubscriberResult<()> {
        self.control
            .send(command)
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }
}

async fn run(
    config: SubscriberConfig,
    channels: Arc<RwLock<BTreeSet<String>>>,
    messages: broadcast::Sender<ReceivedMessage>,
    mut control: mpsc::Receiver<Command>,
) {
    loop {
        match listen(&config, &channels, &messages, &mut control).await {
            Ok(Exit::Shutdown) => {
                tracing::info!("Subscriber shutting down");
                return;
            }
            Ok(Exit::Reconnect) => {
                tracing::warn!("Pub/Sub stream ended, reconnecting");
            }
            Err(e) => {
                tracing::error!(error = %e, "Subscriber error, reconnecting");
            }
        }
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

async fn listen(
    config: &SubscriberConfig,
    channels: &RwLock<BTreeSet<String>>,
    messages: &broadcast::Sender<ReceivedMessage>,
    control: &mut mpsc::Receiver<Command>,
) -> SubscriberResult<Exit> {
    let client = redis::Client::open(config.redis_url.as_str())?;
    let mut pubsub = client.get_async_pubsub().await?;

    for channel in channels.read().await.iter() {
        pubsub.subscribe(channel).await?;
    }

    tracing::info!(url = %redact_url(&config.redis_url), "Subscriber connected to Redis");

    loop {
        let command = {
            let mut stream = pubsub.on_message();
            loop {
                tokio::select! {
                    msg = stream.next() => {
                        let Some(msg) = msg else {
                            return Ok(Exit::Reconnect);
                        };
                        let payload: String = msg.get_payload().unwrap_or_default();
                        let received = ReceivedMessage::from_redis(msg.get_channel_name(), payload);
                        tracing::trace!(channel = %received.channel, "Received Pub/Sub message");
                        // No local receivers is not an error
                        let _ = messages.send(received);
                    }
                    cmd = control.recv() => break cmd,
                }
            }
        };

        match command {
            Some(Command::Subscribe(names)) => {
                for name in names {
                    match pubsub.subscribe(&name).await {
                        Ok(()) => {
                            tracing::debug!(channel = %name, "Subscribed to channel");
                            channels.write().await.insert(name);
                        }
                        Err(e) => tracing::error!(channel = %name, error = %e, "Failed to subscribe"),
                    }
                }
            }
            Some(Command::Unsubscribe(names)) => {
                for name in names {
                    match pubsub.unsubscribe(&name).await {
                        Ok(()) => {
                            tracing::debug!(channel = %name, "Unsubscribed from channel");
                            channels.write().await.remove(&name);
                        }
                        Err(e) => {
                            tracing::error!(channel = %name, error = %e, "Failed to unsubscribe")
                        }
                    }
                }
            }
            Some(Command::Shutdown) | None => return Ok(Exit::Shutdown),
        }
    }
}
