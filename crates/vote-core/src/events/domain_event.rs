//! Domain events - events emitted when domain state changes
//!
//! These events are used for:
//! - Pushing tally and per-user reaction updates to subscribers
//! - Relaying committed changes to other instances over pub/sub

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{ReactionKind, ReactionTransition, VoteTally};
use crate::value_objects::{EntityId, UserId};

/// All possible domain events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    EntityRegistered(EntityRegisteredEvent),
    ReactionChanged(ReactionChangedEvent),
    TallyRecounted(TallyRecountedEvent),
}

impl DomainEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::EntityRegistered(_) => "ENTITY_REGISTERED",
            Self::ReactionChanged(_) => "REACTION_CHANGED",
            Self::TallyRecounted(_) => "TALLY_RECOUNTED",
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::EntityRegistered(e) => e.timestamp,
            Self::ReactionChanged(e) => e.timestamp,
            Self::TallyRecounted(e) => e.timestamp,
        }
    }

    /// Entity the event concerns
    pub fn entity_id(&self) -> &EntityId {
        match self {
            Self::EntityRegistered(e) => &e.entity_id,
            Self::ReactionChanged(e) => &e.event.entity_id,
            Self::TallyRecounted(e) => &e.entity_id,
        }
    }

    /// Entity version the event was committed at
    pub fn version(&self) -> u64 {
        match self {
            Self::EntityRegistered(e) => e.version,
            Self::ReactionChanged(e) => e.version,
            Self::TallyRecounted(e) => e.version,
        }
    }

    /// Tally after the commit
    pub fn tally(&self) -> VoteTally {
        match self {
            Self::EntityRegistered(e) => e.tally,
            Self::ReactionChanged(e) => e.tally,
            Self::TallyRecounted(e) => e.tally,
        }
    }
}

// ============================================================================
// Event Structs
// ============================================================================

/// One user's reaction change on one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub entity_id: EntityId,
    pub user_id: UserId,
    pub previous_kind: Option<ReactionKind>,
    pub new_kind: Option<ReactionKind>,
}

impl ReactionEvent {
    pub fn new(entity_id: EntityId, user_id: UserId, transition: ReactionTransition) -> Self {
        Self {
            entity_id,
            user_id,
            previous_kind: transition.previous,
            new_kind: transition.next,
        }
    }

    pub fn transition(&self) -> ReactionTransition {
        ReactionTransition {
            previous: self.previous_kind,
            next: self.new_kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionChangedEvent {
    #[serde(flatten)]
    pub event: ReactionEvent,
    pub tally: VoteTally,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyRecountedEvent {
    pub entity_id: EntityId,
    pub previous: VoteTally,
    pub tally: VoteTally,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRegisteredEvent {
    pub entity_id: EntityId,
    pub tally: VoteTally,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}
