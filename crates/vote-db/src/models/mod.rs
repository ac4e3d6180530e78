//! Database models - SQLx-compatible structs for PostgreSQL tables

mod reaction;
mod votable;

pub use reaction::{KindCountModel, ReactionModel};
pub use votable::{SnapshotModel, VotableModel};
