//! Domain entities - reaction records and the aggregate they feed

mod reaction;
mod tally;
mod votable;

pub use reaction::{Reaction, ReactionKind, ReactionTransition};
pub use tally::VoteTally;
pub use votable::{EntitySnapshot, Versioned, Votable};
