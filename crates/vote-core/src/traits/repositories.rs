//! Repository traits (ports) - define the interface for data access
//!
//! The store is a document store with one primitive that matters: a
//! version-conditioned commit touching one entity and one reaction record
//! atomically. Everything the coordinator guarantees is built on it.

use async_trait::async_trait;

use crate::entities::{EntitySnapshot, Reaction, Votable, VoteTally};
use crate::error::DomainError;
use crate::value_objects::{EntityId, UserId};

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

/// What to do with the (entity, user) reaction record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordWrite {
    /// Create or replace the record
    Upsert(Reaction),
    /// Remove the record if present
    Delete,
}

/// One atomic unit: the reaction record write plus the new tally,
/// applied only if the entity is still at `expected_version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionCommit {
    pub entity_id: EntityId,
    pub user_id: UserId,
    pub expected_version: u64,
    pub record: RecordWrite,
    pub tally: VoteTally,
}

#[async_trait]
pub trait ReactionStore: Send + Sync {
    /// Create the entity with a zero tally; returns the stored entity
    /// unchanged if it already exists
    async fn register(&self, entity_id: &EntityId) -> RepoResult<Votable>;

    /// Find entity by ID
    async fn find_entity(&self, entity_id: &EntityId) -> RepoResult<Option<Votable>>;

    /// Read the entity and the user's reaction as of one version
    ///
    /// Returns `None` if the entity does not exist.
    async fn read_snapshot(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
    ) -> RepoResult<Option<EntitySnapshot>>;

    /// Apply a commit, returning the entity's new version
    ///
    /// # Errors
    /// `WriteConflict` if the entity moved past `expected_version`,
    /// `EntityNotFound` if it vanished.
    async fn commit(&self, commit: &ReactionCommit) -> RepoResult<u64>;

    /// Overwrite the tally alone, conditioned on `expected_version`
    async fn commit_tally(
        &self,
        entity_id: &EntityId,
        expected_version: u64,
        tally: VoteTally,
    ) -> RepoResult<u64>;

    /// Find the reaction by entity and user
    async fn find_reaction(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
    ) -> RepoResult<Option<Reaction>>;

    /// Get the user's reactions among the given entities
    async fn find_reactions_by_user(
        &self,
        user_id: &UserId,
        entity_ids: &[EntityId],
    ) -> RepoResult<Vec<Reaction>>;

    /// Count reaction records by kind for an entity
    async fn count_by_kind(&self, entity_id: &EntityId) -> RepoResult<VoteTally>;
}
