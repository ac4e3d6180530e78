//! Domain errors - error types for the domain layer

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::entities::ReactionKind;
use crate::value_objects::{EntityId, IdParseError};

/// Caller-facing error classification
///
/// Every error type in the workspace maps onto exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// No signed-in user
    Unauthorized,
    /// Entity does not exist
    NotFound,
    /// Transient write collision; retried before it ever reaches a caller
    Conflict,
    /// Retry ceiling exceeded or store unreachable
    Unavailable,
    /// Malformed input
    Invalid,
    /// Broken invariant
    Internal,
}

impl ErrorKind {
    /// Whether retrying the same request later may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict | Self::Unavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
            Self::Invalid => "invalid",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid {what} id: {source}")]
    InvalidId {
        what: &'static str,
        #[source]
        source: IdParseError,
    },

    #[error("Invalid reaction kind: {0:?}")]
    InvalidReactionKind(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Session did not resolve in time")]
    AuthNotReady,

    // =========================================================================
    // Concurrency Errors
    // =========================================================================
    #[error("Concurrent write on entity {0}")]
    WriteConflict(EntityId),

    #[error("Gave up on entity {entity_id} after {attempts} attempts")]
    RetriesExhausted { entity_id: EntityId, attempts: u32 },

    // =========================================================================
    // Invariant Violations
    // =========================================================================
    #[error("Counter for {kind} would drop below zero")]
    CounterUnderflow { kind: ReactionKind },

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Wrap an entity id parse failure
    pub fn invalid_entity_id(source: IdParseError) -> Self {
        Self::InvalidId {
            what: "entity",
            source,
        }
    }

    /// Wrap a user id parse failure
    pub fn invalid_user_id(source: IdParseError) -> Self {
        Self::InvalidId {
            what: "user",
            source,
        }
    }

    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::EntityNotFound(_) => "UNKNOWN_ENTITY",

            Self::InvalidId { .. } => "INVALID_ID",
            Self::InvalidReactionKind(_) => "INVALID_REACTION_KIND",
            Self::ValidationError(_) => "VALIDATION_ERROR",

            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::AuthNotReady => "AUTH_NOT_READY",

            Self::WriteConflict(_) => "WRITE_CONFLICT",
            Self::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",

            Self::CounterUnderflow { .. } => "COUNTER_UNDERFLOW",

            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Classify into the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EntityNotFound(_) => ErrorKind::NotFound,
            Self::InvalidId { .. } | Self::InvalidReactionKind(_) | Self::ValidationError(_) => {
                ErrorKind::Invalid
            }
            Self::Unauthenticated => ErrorKind::Unauthorized,
            Self::WriteConflict(_) => ErrorKind::Conflict,
            Self::AuthNotReady | Self::RetriesExhausted { .. } | Self::StoreUnavailable(_) => {
                ErrorKind::Unavailable
            }
            Self::CounterUnderflow { .. }
            | Self::DatabaseError(_)
            | Self::CacheError(_)
            | Self::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Invalid
    }

    /// Check if this is a write collision that the retry loop should absorb
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::WriteConflict(_))
    }
}
