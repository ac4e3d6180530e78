//! PostgreSQL implementation of ReactionStore
//!
//! Conditional commits: the votables row is updated only while its
//! `version` still equals the one the caller read. The UPDATE takes the
//! row lock, so a concurrent writer that lost the race re-evaluates the
//! WHERE clause against the new version and matches zero rows.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use vote_core::entities::{EntitySnapshot, Reaction, Votable, VoteTally};
use vote_core::traits::{ReactionCommit, ReactionStore, RecordWrite, RepoResult};
use vote_core::value_objects::{EntityId, UserId};

use crate::mappers::{from_db_count, snapshot_from_model, tally_from_counts, ReactionUpsert, TallyUpdate};
use crate::models::{KindCountModel, ReactionModel, SnapshotModel, VotableModel};

use super::error::{entity_not_found, map_commit_error, map_db_error};

/// PostgreSQL implementation of ReactionStore
#[derive(Clone)]
pub struct PgReactionStore {
    pool: PgPool,
}

impl PgReactionStore {
    /// Create a new PgReactionStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Bump the version and set the tally if the entity is still at `expected`
    ///
    /// Distinguishes a lost race (`WriteConflict`) from a missing row.
    async fn conditional_update(
        tx: &mut Transaction<'_, Postgres>,
        entity_id: &EntityId,
        expected: u64,
        tally: VoteTally,
    ) -> RepoResult<u64> {
        let update = TallyUpdate::new(tally, expected)?;

        let new_version = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE votables
            SET upvotes = $2, downvotes = $3, version = version + 1
            WHERE id = $1 AND version = $4
            RETURNING version
            "#,
        )
        .bind(entity_id.as_str())
        .bind(update.upvotes)
        .bind(update.downvotes)
        .bind(update.expected_version)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_commit_error(entity_id))?;

        match new_version {
            Some(version) => from_db_count(version),
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM votables WHERE id = $1)",
                )
                .bind(entity_id.as_str())
                .fetch_one(&mut **tx)
                .await
                .map_err(map_db_error)?;

                if exists {
                    debug!(entity_id = %entity_id, expected, "Stale version on commit");
                    Err(vote_core::DomainError::WriteConflict(entity_id.clone()))
                } else {
                    Err(entity_not_found(entity_id))
                }
            }
        }
    }
}

#[async_trait]
impl ReactionStore for PgReactionStore {
    #[instrument(skip(self))]
    async fn register(&self, entity_id: &EntityId) -> RepoResult<Votable> {
        sqlx::query(
            r#"
            INSERT INTO votables (id, upvotes, downvotes, version, created_at)
            VALUES ($1, 0, 0, 0, NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(entity_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        self.find_entity(entity_id)
            .await?
            .ok_or_else(|| entity_not_found(entity_id))
    }

    #[instrument(skip(self))]
    async fn find_entity(&self, entity_id: &EntityId) -> RepoResult<Option<Votable>> {
        let result = sqlx::query_as::<_, VotableModel>(
            r#"
            SELECT id, upvotes, downvotes, version, created_at
            FROM votables
            WHERE id = $1
            "#,
        )
        .bind(entity_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Votable::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn read_snapshot(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
    ) -> RepoResult<Option<EntitySnapshot>> {
        // One statement, one MVCC snapshot: tally, version and record agree
        let result = sqlx::query_as::<_, SnapshotModel>(
            r#"
            SELECT v.id, v.upvotes, v.downvotes, v.version, v.created_at,
                   r.kind, r.cast_at
            FROM votables v
            LEFT JOIN reactions r ON r.entity_id = v.id AND r.user_id = $2
            WHERE v.id = $1
            "#,
        )
        .bind(entity_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result
            .map(|model| snapshot_from_model(model, user_id))
            .transpose()
    }

    #[instrument(skip(self, commit), fields(entity_id = %commit.entity_id, user_id = %commit.user_id))]
    async fn commit(&self, commit: &ReactionCommit) -> RepoResult<u64> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let version = Self::conditional_update(
            &mut tx,
            &commit.entity_id,
            commit.expected_version,
            commit.tally,
        )
        .await?;

        match &commit.record {
            RecordWrite::Upsert(reaction) => {
                let row = ReactionUpsert::new(reaction);
                sqlx::query(
                    r#"
                    INSERT INTO reactions (entity_id, user_id, kind, cast_at)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (entity_id, user_id)
                    DO UPDATE SET kind = EXCLUDED.kind, cast_at = EXCLUDED.cast_at
                    "#,
                )
                .bind(row.entity_id)
                .bind(row.user_id)
                .bind(row.kind)
                .bind(row.cast_at)
                .execute(&mut *tx)
                .await
                .map_err(map_commit_error(&commit.entity_id))?;
            }
            RecordWrite::Delete => {
                sqlx::query("DELETE FROM reactions WHERE entity_id = $1 AND user_id = $2")
                    .bind(commit.entity_id.as_str())
                    .bind(commit.user_id.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(map_commit_error(&commit.entity_id))?;
            }
        }

        tx.commit()
            .await
            .map_err(map_commit_error(&commit.entity_id))?;

        Ok(version)
    }

    #[instrument(skip(self))]
    async fn commit_tally(
        &self,
        entity_id: &EntityId,
        expected_version: u64,
        tally: VoteTally,
    ) -> RepoResult<u64> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;
        let version = Self::conditional_update(&mut tx, entity_id, expected_version, tally).await?;
        tx.commit().await.map_err(map_commit_error(entity_id))?;
        Ok(version)
    }

    #[instrument(skip(self))]
    async fn find_reaction(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
    ) -> RepoResult<Option<Reaction>> {
        let result = sqlx::query_as::<_, ReactionModel>(
            r#"
            SELECT entity_id, user_id, kind, cast_at
            FROM reactions
            WHERE entity_id = $1 AND user_id = $2
            "#,
        )
        .bind(entity_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Reaction::try_from).transpose()
    }

    #[instrument(skip(self, entity_ids), fields(count = entity_ids.len()))]
    async fn find_reactions_by_user(
        &self,
        user_id: &UserId,
        entity_ids: &[EntityId],
    ) -> RepoResult<Vec<Reaction>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = entity_ids.iter().map(EntityId::as_str).collect();
        let results = sqlx::query_as::<_, ReactionModel>(
            r#"
            SELECT entity_id, user_id, kind, cast_at
            FROM reactions
            WHERE user_id = $1 AND entity_id = ANY($2)
            "#,
        )
        .bind(user_id.as_str())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        results.into_iter().map(Reaction::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn count_by_kind(&self, entity_id: &EntityId) -> RepoResult<VoteTally> {
        let results = sqlx::query_as::<_, KindCountModel>(
            r#"
            SELECT kind, COUNT(*) AS count
            FROM reactions
            WHERE entity_id = $1
            GROUP BY kind
            "#,
        )
        .bind(entity_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        tally_from_counts(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PgReactionStore>();
    }
}
