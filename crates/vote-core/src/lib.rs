//! # vote-core
//!
//! Domain layer for the reaction engine: reaction records, vote tallies,
//! commit snapshots, domain events, and the ports (store, identity, event sink)
//! that the infrastructure crates implement.
//! This crate has zero dependencies on infrastructure (database, cache, runtime).

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    EntitySnapshot, Reaction, ReactionKind, ReactionTransition, Versioned, Votable, VoteTally,
};
pub use error::{DomainError, ErrorKind};
pub use events::{
    DomainEvent, EntityRegisteredEvent, ReactionChangedEvent, ReactionEvent, TallyRecountedEvent,
};
pub use traits::{
    IdentityProvider, ReactionCommit, ReactionEventSink, ReactionStore, RecordWrite, RepoResult,
};
pub use value_objects::{EntityId, IdParseError, UserId};
