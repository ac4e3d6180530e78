//! # vote-db
//!
//! Storage layer implementing the `ReactionStore` port.
//!
//! ## Overview
//!
//! - `PgReactionStore`: PostgreSQL via SQLx; version-conditioned commits in one transaction
//! - `MemoryReactionStore`: in-process store with the same commit contract
//! - Connection pool management and schema migrations
//! - Entity ↔ model mappers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vote_db::{create_pool, run_migrations, PgReactionStore, PoolConfig};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&PoolConfig::default()).await?;
//!     run_migrations(&pool).await?;
//!     let store = PgReactionStore::new(pool);
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, run_migrations, PgPool, PoolConfig};
pub use repositories::{map_commit_error, map_db_error, MemoryReactionStore, PgReactionStore};
