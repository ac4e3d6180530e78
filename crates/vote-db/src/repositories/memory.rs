//! In-memory implementation of ReactionStore
//!
//! Same commit contract as the PostgreSQL store: a commit applies only if
//! the entity is still at the expected version. Every read and commit
//! yields to the scheduler first, so concurrent tasks interleave between a
//! coordinator's read and its commit the way they do against a remote store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use vote_core::entities::{EntitySnapshot, Reaction, Votable, VoteTally};
use vote_core::error::DomainError;
use vote_core::traits::{ReactionCommit, ReactionStore, RecordWrite, RepoResult};
use vote_core::value_objects::{EntityId, UserId};

use super::error::entity_not_found;

#[derive(Debug, Clone)]
struct EntityRow {
    votable: Votable,
    reactions: HashMap<UserId, Reaction>,
}

/// In-memory ReactionStore; clones share the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryReactionStore {
    rows: Arc<RwLock<HashMap<EntityId, EntityRow>>>,
}

impl MemoryReactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite an entity's tally without touching its records or version
    ///
    /// Test hook for simulating a drifted counter.
    pub fn corrupt_tally(&self, entity_id: &EntityId, tally: VoteTally) -> RepoResult<()> {
        let mut rows = self.rows.write();
        let row = rows
            .get_mut(entity_id)
            .ok_or_else(|| entity_not_found(entity_id))?;
        row.votable.tally = tally;
        Ok(())
    }

    /// Advance an entity's version as if another writer had committed
    ///
    /// Test hook for forcing the next conditional commit to conflict.
    pub fn bump_version(&self, entity_id: &EntityId) -> RepoResult<u64> {
        let mut rows = self.rows.write();
        let row = rows
            .get_mut(entity_id)
            .ok_or_else(|| entity_not_found(entity_id))?;
        row.votable.version += 1;
        Ok(row.votable.version)
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn check_version(row: &EntityRow, entity_id: &EntityId, expected: u64) -> RepoResult<()> {
        if row.votable.version == expected {
            Ok(())
        } else {
            debug!(
                entity_id = %entity_id,
                expected,
                actual = row.votable.version,
                "Stale version on commit"
            );
            Err(DomainError::WriteConflict(entity_id.clone()))
        }
    }
}

#[async_trait]
impl ReactionStore for MemoryReactionStore {
    #[instrument(skip(self))]
    async fn register(&self, entity_id: &EntityId) -> RepoResult<Votable> {
        tokio::task::yield_now().await;
        let mut rows = self.rows.write();
        let row = rows.entry(entity_id.clone()).or_insert_with(|| EntityRow {
            votable: Votable::new(entity_id.clone()),
            reactions: HashMap::new(),
        });
        Ok(row.votable.clone())
    }

    async fn find_entity(&self, entity_id: &EntityId) -> RepoResult<Option<Votable>> {
        tokio::task::yield_now().await;
        Ok(self.rows.read().get(entity_id).map(|row| row.votable.clone()))
    }

    async fn read_snapshot(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
    ) -> RepoResult<Option<EntitySnapshot>> {
        tokio::task::yield_now().await;
        Ok(self.rows.read().get(entity_id).map(|row| EntitySnapshot {
            entity: row.votable.clone(),
            reaction: row.reactions.get(user_id).cloned(),
        }))
    }

    #[instrument(skip(self, commit), fields(entity_id = %commit.entity_id, user_id = %commit.user_id))]
    async fn commit(&self, commit: &ReactionCommit) -> RepoResult<u64> {
        tokio::task::yield_now().await;
        let mut rows = self.rows.write();
        let row = rows
            .get_mut(&commit.entity_id)
            .ok_or_else(|| entity_not_found(&commit.entity_id))?;

        Self::check_version(row, &commit.entity_id, commit.expected_version)?;

        match &commit.record {
            RecordWrite::Upsert(reaction) => {
                row.reactions.insert(commit.user_id.clone(), reaction.clone());
            }
            RecordWrite::Delete => {
                row.reactions.remove(&commit.user_id);
            }
        }
        row.votable.tally = commit.tally;
        row.votable.version += 1;
        Ok(row.votable.version)
    }

    #[instrument(skip(self))]
    async fn commit_tally(
        &self,
        entity_id: &EntityId,
        expected_version: u64,
        tally: VoteTally,
    ) -> RepoResult<u64> {
        tokio::task::yield_now().await;
        let mut rows = self.rows.write();
        let row = rows
            .get_mut(entity_id)
            .ok_or_else(|| entity_not_found(entity_id))?;

        Self::check_version(row, entity_id, expected_version)?;

        row.votable.tally = tally;
        row.votable.version += 1;
        Ok(row.votable.version)
    }

    async fn find_reaction(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
    ) -> RepoResult<Option<Reaction>> {
        tokio::task::yield_now().await;
        Ok(self
            .rows
            .read()
            .get(entity_id)
            .and_then(|row| row.reactions.get(user_id).cloned()))
    }

    async fn find_reactions_by_user(
        &self,
        user_id: &UserId,
        entity_ids: &[EntityId],
    ) -> RepoResult<Vec<Reaction>> {
        tokio::task::yield_now().await;
        let rows = self.rows.read();
        Ok(entity_ids
            .iter()
            .filter_map(|id| rows.get(id))
            .filter_map(|row| row.reactions.get(user_id).cloned())
            .collect())
    }

    async fn count_by_kind(&self, entity_id: &EntityId) -> RepoResult<VoteTally> {
        tokio::task::yield_now().await;
        let rows = self.rows.read();
        let row = rows
            .get(entity_id)
            .ok_or_else(|| entity_not_found(entity_id))?;
        Ok(VoteTally::from_kinds(row.reactions.values().map(|r| r.kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vote_core::ReactionKind;

    fn ids() -> (EntityId, UserId) {
        (EntityId::parse("p1").unwrap(), UserId::parse("alice").unwrap())
    }

    fn upsert(entity_id: &EntityId, user_id: &UserId, version: u64, kind: ReactionKind) -> ReactionCommit {
        ReactionCommit {
            entity_id: entity_id.clone(),
            user_id: user_id.clone(),
            expected_version: version,
            record: RecordWrite::Upsert(Reaction::new(entity_id.clone(), user_id.clone(), kind)),
            tally: VoteTally::from_kinds([kind]),
        }
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let store = MemoryReactionStore::new();
        let (entity_id, user_id) = ids();

        let first = store.register(&entity_id).await.unwrap();
        store.commit(&upsert(&entity_id, &user_id, 0, ReactionKind::Up)).await.unwrap();
        let second = store.register(&entity_id).await.unwrap();

        assert_eq!(first.version, 0);
        assert_eq!(second.version, 1);
        assert_eq!(second.tally, VoteTally::new(1, 0));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_bumps_version_and_writes_record() {
        let store = MemoryReactionStore::new();
        let (entity_id, user_id) = ids();
        store.register(&entity_id).await.unwrap();

        let version = store
            .commit(&upsert(&entity_id, &user_id, 0, ReactionKind::Down))
            .await
            .unwrap();
        assert_eq!(version, 1);

        let snapshot = store.read_snapshot(&entity_id, &user_id).await.unwrap().unwrap();
        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.previous_kind(), Some(ReactionKind::Down));
        assert_eq!(snapshot.entity.tally, VoteTally::new(0, 1));
    }

    #[tokio::test]
    async fn test_stale_commit_conflicts() {
        let store = MemoryReactionStore::new();
        let (entity_id, user_id) = ids();
        store.register(&entity_id).await.unwrap();
        store.commit(&upsert(&entity_id, &user_id, 0, ReactionKind::Up)).await.unwrap();

        let err = store
            .commit(&upsert(&entity_id, &user_id, 0, ReactionKind::Down))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Losing commit left nothing behind
        let reaction = store.find_reaction(&entity_id, &user_id).await.unwrap().unwrap();
        assert_eq!(reaction.kind, ReactionKind::Up);
    }

    #[tokio::test]
    async fn test_missing_entity() {
        let store = MemoryReactionStore::new();
        let (entity_id, user_id) = ids();

        assert!(store.read_snapshot(&entity_id, &user_id).await.unwrap().is_none());
        let err = store
            .commit(&upsert(&entity_id, &user_id, 0, ReactionKind::Up))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.count_by_kind(&entity_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let store = MemoryReactionStore::new();
        let (entity_id, alice) = ids();
        let bob = UserId::parse("bob").unwrap();
        store.register(&entity_id).await.unwrap();

        store.commit(&upsert(&entity_id, &alice, 0, ReactionKind::Up)).await.unwrap();
        store.commit(&upsert(&entity_id, &bob, 1, ReactionKind::Up)).await.unwrap();
        assert_eq!(store.count_by_kind(&entity_id).await.unwrap(), VoteTally::new(2, 0));

        store
            .commit(&ReactionCommit {
                entity_id: entity_id.clone(),
                user_id: alice.clone(),
                expected_version: 2,
                record: RecordWrite::Delete,
                tally: VoteTally::new(1, 0),
            })
            .await
            .unwrap();
        assert_eq!(store.count_by_kind(&entity_id).await.unwrap(), VoteTally::new(1, 0));
        assert!(store.find_reaction(&entity_id, &alice).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_reactions_by_user() {
        let store = MemoryReactionStore::new();
        let alice = UserId::parse("alice").unwrap();
        let p1 = EntityId::parse("p1").unwrap();
        let p2 = EntityId::parse("p2").unwrap();
        let missing = EntityId::parse("p3").unwrap();
        store.register(&p1).await.unwrap();
        store.register(&p2).await.unwrap();
        store.commit(&upsert(&p2, &alice, 0, ReactionKind::Down)).await.unwrap();

        let found = store
            .find_reactions_by_user(&alice, &[p1, p2.clone(), missing])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity_id, p2);
    }

    #[tokio::test]
    async fn test_commit_tally_and_corruption_hook() {
        let store = MemoryReactionStore::new();
        let (entity_id, _) = ids();
        store.register(&entity_id).await.unwrap();

        store.corrupt_tally(&entity_id, VoteTally::new(5, 5)).unwrap();
        let entity = store.find_entity(&entity_id).await.unwrap().unwrap();
        assert_eq!(entity.tally, VoteTally::new(5, 5));
        assert_eq!(entity.version, 0);

        let version = store.commit_tally(&entity_id, 0, VoteTally::ZERO).await.unwrap();
        assert_eq!(version, 1);
        assert!(store
            .commit_tally(&entity_id, 0, VoteTally::ZERO)
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[tokio::test]
    async fn test_bump_version_forces_conflict() {
        let store = MemoryReactionStore::new();
        let (entity_id, user_id) = ids();
        store.register(&entity_id).await.unwrap();

        assert_eq!(store.bump_version(&entity_id).unwrap(), 1);
        let err = store
            .commit(&upsert(&entity_id, &user_id, 0, ReactionKind::Up))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::WriteConflict(_)));

        let entity = store.find_entity(&entity_id).await.unwrap().unwrap();
        assert_eq!(entity.tally, VoteTally::ZERO);
        assert!(store.bump_version(&EntityId::parse("missing").unwrap()).is_err());
    }
}
