//! Request DTOs for raw client input
//!
//! Requests carry strings as a client sends them; `parse` validates them
//! and turns them into domain values.

pub mod requests;

pub use requests::{CastReactionRequest, UserReactionsRequest, MAX_BATCH_ENTITIES};
