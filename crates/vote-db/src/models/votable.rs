//! Votable database models

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for votables table
#[derive(Debug, Clone, FromRow)]
pub struct VotableModel {
    pub id: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// Votable row left-joined with one user's reaction
#[derive(Debug, Clone, FromRow)]
pub struct SnapshotModel {
    pub id: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub kind: Option<String>,
    pub cast_at: Option<DateTime<Utc>>,
}
