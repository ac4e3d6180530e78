//! # vote-cache
//!
//! Redis pub/sub layer that spreads committed reaction events across
//! service instances.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Pub/Sub**: Entity, user and firehose channels for reaction events
//! - **Event Sink**: [`RedisEventSink`] plugs into the reaction service
//!
//! ## Example
//!
//! ```ignore
//! use vote_cache::{Publisher, RedisEventSink, RedisPool, RedisPoolConfig};
//!
//! let pool = RedisPool::new(&RedisPoolConfig::default())?;
//! let sink = RedisEventSink::new(Publisher::new(pool), "node-a");
//! ```

pub mod pool;
pub mod pubsub;
mod sink;

pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

pub use pubsub::{
    channels_for, PubSubChannel, PubSubEvent, Publisher, ReceivedMessage, Subscriber,
    SubscriberConfig, SubscriberError, SubscriberResult, ENTITY_CHANNEL_PREFIX,
    REACTIONS_CHANNEL, USER_CHANNEL_PREFIX,
};

pub use sink::RedisEventSink;
