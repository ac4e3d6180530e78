//! Ports - interfaces the domain needs from infrastructure

mod identity;
mod publisher;
mod repositories;

pub use identity::IdentityProvider;
pub use publisher::ReactionEventSink;
pub use repositories::{ReactionCommit, ReactionStore, RecordWrite, RepoResult};
