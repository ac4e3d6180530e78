//! # vote-client
//!
//! Client side of the reaction engine: a per-user cache with optimistic
//! casts, and a client that keeps it in line with the coordinator, the
//! subscription bus, and the session.

pub mod cache;
mod client;

pub use cache::{Confirmed, LocalVoteState, ReactionCache};
pub use client::{EntityWatch, VoteClient};
