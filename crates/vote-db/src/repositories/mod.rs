//! Store implementations
//!
//! PostgreSQL and in-memory implementations of the `ReactionStore` port
//! defined in vote-core.

mod error;
mod memory;
mod reaction;

pub use error::{map_commit_error, map_db_error};
pub(crate) use error::corrupt_row;
pub use memory::MemoryReactionStore;
pub use reaction::PgReactionStore;
