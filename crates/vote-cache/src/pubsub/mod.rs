//! Redis Pub/Sub module.
//!
//! Distributes committed reaction events between service instances.

mod channels;
mod publisher;
mod subscriber;

pub use channels::{
    PubSubChannel, ENTITY_CHANNEL_PREFIX, REACTIONS_CHANNEL, USER_CHANNEL_PREFIX,
};
pub use publisher::{channels_for, PubSubEvent, Publisher};
pub use subscriber::{
    ReceivedMessage, Subscriber, SubscriberConfig, SubscriberError, SubscriberResult,
};
