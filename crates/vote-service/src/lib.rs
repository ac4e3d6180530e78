//! # vote-service
//!
//! Application layer of the reaction engine: the transaction coordinator
//! that keeps tallies consistent with reaction records, the subscription
//! bus that pushes committed changes, and validated request DTOs for raw
//! client input.

pub mod bus;
pub mod dto;
mod engine;
pub mod services;

pub use bus::{EventRelay, Subscription, SubscriptionBus, TallyUpdate, UserReactionUpdate};
pub use engine::Engine;
pub use services::{
    CastOutcome, ReactionService, RecountOutcome, ServiceContext, ServiceContextBuilder,
    ServiceError, ServiceResult, VoteState,
};
