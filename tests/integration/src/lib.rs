//! Integration test utilities for the reaction engine
//!
//! This crate provides a harness over the in-memory store, a store wrapper
//! that forces write conflicts, and checks for the PostgreSQL and Redis
//! environment used by the infrastructure-backed tests.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
