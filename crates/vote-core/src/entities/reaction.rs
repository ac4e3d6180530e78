//! Reaction entity - one user's stance on one entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;
use crate::value_objects::{EntityId, UserId};

/// Kind of reaction a user can hold on an entity
///
/// Mutually exclusive: a user holds at most one reaction per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Up,
    Down,
}

impl ReactionKind {
    /// Wire name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// The opposite stance
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts both vote vocabulary (`up`/`down`) and post vocabulary
/// (`like`/`dislike`), case-insensitively.
impl FromStr for ReactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "upvote" | "like" => Ok(Self::Up),
            "down" | "downvote" | "dislike" => Ok(Self::Down),
            _ => Err(DomainError::InvalidReactionKind(s.to_string())),
        }
    }
}

/// Reaction record, keyed by (entity_id, user_id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub entity_id: EntityId,
    pub user_id: UserId,
    pub kind: ReactionKind,
    pub cast_at: DateTime<Utc>,
}

impl Reaction {
    /// Create a new reaction cast now
    pub fn new(entity_id: EntityId, user_id: UserId, kind: ReactionKind) -> Self {
        Self {
            entity_id,
            user_id,
            kind,
            cast_at: Utc::now(),
        }
    }

    /// Check if reaction is of a specific kind
    #[inline]
    pub fn is_kind(&self, kind: ReactionKind) -> bool {
        self.kind == kind
    }
}

/// State change of one (entity, user) reaction slot
///
/// `None` on either side means "no reaction".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTransition {
    pub previous: Option<ReactionKind>,
    pub next: Option<ReactionKind>,
}

impl ReactionTransition {
    /// Apply the cast rule: requesting the kind already held retracts it,
    /// anything else casts or switches to the requested kind.
    pub fn for_cast(previous: Option<ReactionKind>, requested: ReactionKind) -> Self {
        let next = if previous == Some(requested) {
            None
        } else {
            Some(requested)
        };
        Self { previous, next }
    }

    /// Counter deltas as `(upvotes, downvotes)`
    pub fn deltas(&self) -> (i64, i64) {
        let mut up = 0;
        let mut down = 0;
        match self.previous {
            Some(ReactionKind::Up) => up -= 1,
            Some(ReactionKind::Down) => down -= 1,
            None => {}
        }
        match self.next {
            Some(ReactionKind::Up) => up += 1,
            Some(ReactionKind::Down) => down += 1,
            None => {}
        }
        (up, down)
    }

    pub fn is_retraction(&self) -> bool {
        self.previous.is_some() && self.next.is_none()
    }

    pub fn is_switch(&self) -> bool {
        matches!((self.previous, self.next), (Some(a), Some(b)) if a != b)
    }

    pub fn is_new_cast(&self) -> bool {
        self.previous.is_none() && self.next.is_some()
    }
}
