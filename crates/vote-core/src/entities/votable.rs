//! Votable entity - the aggregate that carries the tally

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reaction::{Reaction, ReactionKind};
use super::tally::VoteTally;
use crate::value_objects::EntityId;

/// A reactable entity and its denormalized tally
///
/// `version` is bumped by every committed write and orders everything
/// observers see for this entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Votable {
    pub id: EntityId,
    pub tally: VoteTally,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Votable {
    /// Create a fresh entity with a zero tally
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            tally: VoteTally::ZERO,
            version: 0,
            created_at: Utc::now(),
        }
    }
}

/// A value tagged with the entity version it was observed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

impl<T> Versioned<T> {
    pub const fn new(version: u64, value: T) -> Self {
        Self { version, value }
    }

    /// Map the value, keeping the version
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<U> {
        Versioned {
            version: self.version,
            value: f(self.value),
        }
    }

    /// True if `self` should replace `other` in an observer's view
    pub fn is_newer_than<U>(&self, other: &Versioned<U>) -> bool {
        self.version > other.version
    }
}

/// Consistent read of an entity and one user's reaction on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySnapshot {
    pub entity: Votable,
    pub reaction: Option<Reaction>,
}

impl EntitySnapshot {
    /// Kind currently held by the user, if any
    pub fn previous_kind(&self) -> Option<ReactionKind> {
        self.reaction.as_ref().map(|r| r.kind)
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.entity.version
    }
}
