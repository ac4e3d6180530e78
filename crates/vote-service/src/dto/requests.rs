//! Request DTOs
//!
//! All request DTOs implement `Deserialize` and `Validate` for input validation,
//! then parse into domain ids.

use serde::Deserialize;
use validator::Validate;
use vote_core::{DomainError, EntityId, ReactionKind};

use crate::services::ServiceResult;

/// Most entities a single batch lookup may name
pub const MAX_BATCH_ENTITIES: usize = 100;

fn parse_entity_id(raw: &str) -> ServiceResult<EntityId> {
    EntityId::parse(raw)
        .map_err(DomainError::invalid_entity_id)
        .map_err(Into::into)
}

/// Cast, switch or retract a reaction
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CastReactionRequest {
    #[validate(length(min = 1, max = 128, message = "Entity id must be 1-128 characters"))]
    pub entity_id: String,

    /// `up`/`down`, or `like`/`dislike`
    #[validate(length(min = 1, max = 16, message = "Reaction kind must be 1-16 characters"))]
    pub kind: String,
}

impl CastReactionRequest {
    /// Validate and parse into domain values
    pub fn parse(&self) -> ServiceResult<(EntityId, ReactionKind)> {
        self.validate()?;
        Ok((parse_entity_id(&self.entity_id)?, self.kind.parse()?))
    }
}

/// Look up the current user's reactions on a page of entities
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserReactionsRequest {
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 entity ids"))]
    pub entity_ids: Vec<String>,
}

impl UserReactionsRequest {
    pub fn parse(&self) -> ServiceResult<Vec<EntityId>> {
        self.validate()?;
        self.entity_ids.iter().map(|raw| parse_entity_id(raw)).collect()
    }
}
