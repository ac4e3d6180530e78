//! Pub/Sub channel definitions.
//!
//! Committed reaction events fan out on three kinds of channel: one per
//! entity (tally watchers), one per user (their own reactions), and a
//! single firehose that relays subscribe to.

use vote_core::{EntityId, UserId};

/// Channel prefix for per-entity events
pub const ENTITY_CHANNEL_PREFIX: &str = "entity:";
/// Channel prefix for per-user events
pub const USER_CHANNEL_PREFIX: &str = "user:";
/// Channel carrying every committed reaction event
pub const REACTIONS_CHANNEL: &str = "reactions";

/// Pub/Sub channel types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PubSubChannel {
    /// Events for one entity (tally changes)
    Entity(EntityId),
    /// Events for one user (their reaction changes)
    User(UserId),
    /// Every committed event
    Reactions,
    /// Custom channel name
    Custom(String),
}

impl PubSubChannel {
    #[must_use]
    pub fn entity(entity_id: EntityId) -> Self {
        Self::Entity(entity_id)
    }

    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self::User(user_id)
    }

    #[must_use]
    pub fn reactions() -> Self {
        Self::Reactions
    }

    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// Get the Redis channel name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Entity(id) => format!("{ENTITY_CHANNEL_PREFIX}{id}"),
            Self::User(id) => format!("{USER_CHANNEL_PREFIX}{id}"),
            Self::Reactions => REACTIONS_CHANNEL.to_string(),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Parse a channel name back to a `PubSubChannel`
    ///
    /// Names whose id part is not a valid identifier fall back to `Custom`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name == REACTIONS_CHANNEL {
            return Self::Reactions;
        }

        if let Some(id) = name
            .strip_prefix(ENTITY_CHANNEL_PREFIX)
            .and_then(|raw| EntityId::parse(raw).ok())
        {
            return Self::Entity(id);
        }

        if let Some(id) = name
            .strip_prefix(USER_CHANNEL_PREFIX)
            .and_then(|raw| UserId::parse(raw).ok())
        {
            return Self::User(id);
        }

        Self::Custom(name.to_string())
    }
}

impl std::fmt::Display for PubSubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        let entity_id = EntityId::parse("post-42").unwrap();
        let user_id = UserId::parse("alice").unwrap();

        assert_eq!(PubSubChannel::entity(entity_id).name(), "entity:post-42");
        assert_eq!(PubSubChannel::user(user_id).name(), "user:alice");
        assert_eq!(PubSubChannel::reactions().name(), "reactions");
        assert_eq!(PubSubChannel::custom("test").name(), "test");
    }

    #[test]
    fn test_channel_parse() {
        assert_eq!(
            PubSubChannel::parse("entity:post-42"),
            PubSubChannel::Entity(EntityId::parse("post-42").unwrap())
        );
        assert_eq!(
            PubSubChannel::parse("user:alice"),
            PubSubChannel::User(UserId::parse("alice").unwrap())
        );
        assert_eq!(PubSubChannel::parse("reactions"), PubSubChannel::Reactions);
        assert_eq!(
            PubSubChannel::parse("unknown:123"),
            PubSubChannel::Custom("unknown:123".to_string())
        );
    }

    #[test]
    fn test_channel_parse_rejects_invalid_ids() {
        assert_eq!(
            PubSubChannel::parse("entity:"),
            PubSubChannel::Custom("entity:".to_string())
        );
        assert_eq!(
            PubSubChannel::parse("user:.."),
            PubSubChannel::Custom("user:..".to_string())
        );
    }

    #[test]
    fn test_ids_with_colons_round_trip() {
        let channel = PubSubChannel::entity(EntityId::parse("forum:7").unwrap());
        assert_eq!(PubSubChannel::parse(&channel.name()), channel);
    }
}
