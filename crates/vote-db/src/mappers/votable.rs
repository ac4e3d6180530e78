//! Votable entity <-> model mapper

use vote_core::entities::{EntitySnapshot, Reaction, Votable, VoteTally};
use vote_core::traits::RepoResult;
use vote_core::value_objects::{EntityId, UserId};

use crate::models::{SnapshotModel, VotableModel};
use crate::repositories::corrupt_row;

/// Convert an unsigned domain counter to a BIGINT
pub fn to_db_count(value: u64) -> RepoResult<i64> {
    i64::try_from(value).map_err(|_| corrupt_row("counter", value))
}

/// Convert a BIGINT column to an unsigned domain counter
pub fn from_db_count(value: i64) -> RepoResult<u64> {
    u64::try_from(value).map_err(|_| corrupt_row("counter", value))
}

fn parse_entity_id(raw: &str) -> RepoResult<EntityId> {
    EntityId::parse(raw).map_err(|e| corrupt_row("entity id", e))
}

impl TryFrom<VotableModel> for Votable {
    type Error = vote_core::DomainError;

    fn try_from(model: VotableModel) -> RepoResult<Self> {
        Ok(Votable {
            id: parse_entity_id(&model.id)?,
            tally: VoteTally::new(from_db_count(model.upvotes)?, from_db_count(model.downvotes)?),
            version: from_db_count(model.version)?,
            created_at: model.created_at,
        })
    }
}

/// Convert a joined snapshot row for `user_id`
pub fn snapshot_from_model(model: SnapshotModel, user_id: &UserId) -> RepoResult<EntitySnapshot> {
    let entity = Votable {
        id: parse_entity_id(&model.id)?,
        tally: VoteTally::new(from_db_count(model.upvotes)?, from_db_count(model.downvotes)?),
        version: from_db_count(model.version)?,
        created_at: model.created_at,
    };

    let reaction = match (model.kind, model.cast_at) {
        (Some(kind), Some(cast_at)) => Some(Reaction {
            entity_id: entity.id.clone(),
            user_id: user_id.clone(),
            kind: kind.parse().map_err(|_| corrupt_row("reaction kind", &kind))?,
            cast_at,
        }),
        _ => None,
    };

    Ok(EntitySnapshot { entity, reaction })
}

/// Tally values prepared for a conditional UPDATE
pub struct TallyUpdate {
    pub upvotes: i64,
    pub downvotes: i64,
    pub expected_version: i64,
}

impl TallyUpdate {
    pub fn new(tally: VoteTally, expected_version: u64) -> RepoResult<Self> {
        Ok(Self {
            upvotes: to_db_count(tally.upvotes)?,
            downvotes: to_db_count(tally.downvotes)?,
            expected_version: to_db_count(expected_version)?,
        })
    }
}
