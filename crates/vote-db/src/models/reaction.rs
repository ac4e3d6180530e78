//! Reaction database models

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for reactions table
#[derive(Debug, Clone, FromRow)]
pub struct ReactionModel {
    pub entity_id: String,
    pub user_id: String,
    pub kind: String,
    pub cast_at: DateTime<Utc>,
}

/// Aggregated reaction count (from query)
#[derive(Debug, Clone, FromRow)]
pub struct KindCountModel {
    pub kind: String,
    pub count: i64,
}
