//! Entity to model mappers
//!
//! Conversions between domain entities (vote-core) and database models.
//! Rows are checked on the way in: ids are re-validated and counters must
//! fit the domain's unsigned types.

mod reaction;
mod votable;

pub use reaction::{kind_to_str, tally_from_counts, ReactionUpsert};
pub use votable::{from_db_count, snapshot_from_model, to_db_count, TallyUpdate};
