//! Test fixtures and data generators

use std::sync::atomic::{AtomicU64, Ordering};

use vote_core::{EntityId, UserId};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Parse a fixed entity id
pub fn entity(id: &str) -> EntityId {
    EntityId::parse(id).expect("valid entity id")
}

/// Parse a fixed user id
pub fn user(id: &str) -> UserId {
    UserId::parse(id).expect("valid user id")
}

/// Entity id no other test uses; keeps shared databases apart
pub fn unique_entity() -> EntityId {
    entity(&format!("post-{}-{}", std::process::id(), unique_suffix()))
}

/// `count` distinct users
pub fn users(count: usize) -> Vec<UserId> {
    let suffix = unique_suffix();
    (0..count)
        .map(|i| user(&format!("user-{suffix}-{i}")))
        .collect()
}
