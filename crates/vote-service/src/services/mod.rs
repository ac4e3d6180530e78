//! Business logic services
//!
//! The reaction service is the transaction coordinator; the context
//! carries its dependencies.

pub mod context;
pub mod error;
pub mod reaction;

pub use context::{ServiceContext, ServiceContextBuilder};
pub use error::{ServiceError, ServiceResult};
pub use reaction::{CastOutcome, ReactionService, RecountOutcome, VoteState};
