//! Reaction entity <-> model mapper

use vote_core::entities::{Reaction, ReactionKind, VoteTally};
use vote_core::traits::RepoResult;
use vote_core::value_objects::{EntityId, UserId};

use super::votable::from_db_count;
use crate::models::{KindCountModel, ReactionModel};
use crate::repositories::corrupt_row;

/// Stored spelling of a kind
pub fn kind_to_str(kind: ReactionKind) -> &'static str {
    kind.as_str()
}

impl TryFrom<ReactionModel> for Reaction {
    type Error = vote_core::DomainError;

    fn try_from(model: ReactionModel) -> RepoResult<Self> {
        Ok(Reaction {
            entity_id: EntityId::parse(&model.entity_id).map_err(|e| corrupt_row("entity id", e))?,
            user_id: UserId::parse(&model.user_id).map_err(|e| corrupt_row("user id", e))?,
            kind: model
                .kind
                .parse()
                .map_err(|_| corrupt_row("reaction kind", &model.kind))?,
            cast_at: model.cast_at,
        })
    }
}

/// Fold `GROUP BY kind` rows into a tally
pub fn tally_from_counts(rows: Vec<KindCountModel>) -> RepoResult<VoteTally> {
    let mut tally = VoteTally::ZERO;
    for row in rows {
        let count = from_db_count(row.count)?;
        match row
            .kind
            .parse::<ReactionKind>()
            .map_err(|_| corrupt_row("reaction kind", &row.kind))?
        {
            ReactionKind::Up => tally.upvotes = count,
            ReactionKind::Down => tally.downvotes = count,
        }
    }
    Ok(tally)
}

/// Reaction values prepared for database upsert
pub struct ReactionUpsert<'a> {
    pub entity_id: &'a str,
    pub user_id: &'a str,
    pub kind: &'static str,
    pub cast_at: chrono::DateTime<chrono::Utc>,
}

impl<'a> ReactionUpsert<'a> {
    pub fn new(reaction: &'a Reaction) -> Self {
        Self {
            entity_id: reaction.entity_id.as_str(),
            user_id: reaction.user_id.as_str(),
            kind: kind_to_str(reaction.kind),
            cast_at: reaction.cast_at,
        }
    }
}
