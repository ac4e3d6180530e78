//! Test helpers for integration tests
//!
//! Provides a harness over the in-memory store, a store wrapper that loses
//! commit races on demand, and environment checks for the PostgreSQL and
//! Redis backed tests.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use vote_common::{try_init_tracing, AppConfig, SessionIdentity, VoteSettings};
use vote_core::{
    EntityId, EntitySnapshot, Reaction, ReactionCommit, ReactionStore, RepoResult, UserId,
    Votable, VoteTally,
};
use vote_db::MemoryReactionStore;
use vote_service::{Engine, ServiceContext};

/// Settings for tests: short backoff, generous attempts
pub fn test_settings() -> VoteSettings {
    VoteSettings {
        max_attempts: 20,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        backoff_multiplier: 2.0,
        auth_ready_timeout_ms: 500,
    }
}

/// Store wrapper that loses the next `n` commit races
///
/// Before each armed commit the entity's version is bumped under the store
/// lock, so the real commit fails with `WriteConflict` exactly as it would
/// under contention. Every armed token yields one conflict.
#[derive(Debug, Clone, Default)]
pub struct ContendedStore {
    inner: MemoryReactionStore,
    armed: Arc<AtomicU32>,
    injected: Arc<AtomicU32>,
}

impl ContendedStore {
    pub fn new(inner: MemoryReactionStore) -> Self {
        Self {
            inner,
            armed: Arc::default(),
            injected: Arc::default(),
        }
    }

    /// Make the next `n` commits conflict
    pub fn contend(&self, n: u32) {
        self.armed.fetch_add(n, Ordering::SeqCst);
    }

    /// Conflicts injected so far
    pub fn injected(&self) -> u32 {
        self.injected.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryReactionStore {
        &self.inner
    }

    fn interfere(&self, entity_id: &EntityId) -> RepoResult<()> {
        let armed = self
            .armed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            self.inner.bump_version(entity_id)?;
            self.injected.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl ReactionStore for ContendedStore {
    async fn register(&self, entity_id: &EntityId) -> RepoResult<Votable> {
        self.inner.register(entity_id).await
    }

    async fn find_entity(&self, entity_id: &EntityId) -> RepoResult<Option<Votable>> {
        self.inner.find_entity(entity_id).await
    }

    async fn read_snapshot(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
    ) -> RepoResult<Option<EntitySnapshot>> {
        self.inner.read_snapshot(entity_id, user_id).await
    }

    async fn commit(&self, commit: &ReactionCommit) -> RepoResult<u64> {
        self.interfere(&commit.entity_id)?;
        self.inner.commit(commit).await
    }

    async fn commit_tally(
        &self,
        entity_id: &EntityId,
        expected_version: u64,
        tally: VoteTally,
    ) -> RepoResult<u64> {
        self.interfere(entity_id)?;
        self.inner.commit_tally(entity_id, expected_version, tally).await
    }

    async fn find_reaction(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
    ) -> RepoResult<Option<Reaction>> {
        self.inner.find_reaction(entity_id, user_id).await
    }

    async fn find_reactions_by_user(
        &self,
        user_id: &UserId,
        entity_ids: &[EntityId],
    ) -> RepoResult<Vec<Reaction>> {
        self.inner.find_reactions_by_user(user_id, entity_ids).await
    }

    async fn count_by_kind(&self, entity_id: &EntityId) -> RepoResult<VoteTally> {
        self.inner.count_by_kind(entity_id).await
    }
}

/// Single-instance engine over a [`ContendedStore`]
pub struct Harness {
    pub engine: Engine,
    pub store: ContendedStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: VoteSettings) -> Self {
        try_init_tracing();
        let store = ContendedStore::new(MemoryReactionStore::new());
        let engine = Engine::with_store(Arc::new(store.clone()), settings);
        Self { engine, store }
    }

    /// Register a fresh entity
    pub async fn entity(&self) -> Result<EntityId> {
        let entity_id = crate::fixtures::unique_entity();
        self.store.register(&entity_id).await?;
        Ok(entity_id)
    }

    /// Context for a session signed in as `user`
    pub fn session(&self, user: &UserId) -> Result<ServiceContext> {
        self.context(SessionIdentity::signed_in(user.clone()))
    }

    pub fn context(&self, session: SessionIdentity) -> Result<ServiceContext> {
        Ok(self.engine.context(Arc::new(session))?)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Check the stored tally matches the reaction records
pub async fn assert_consistent(store: &dyn ReactionStore, entity_id: &EntityId) -> Result<VoteTally> {
    let entity = store
        .find_entity(entity_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("entity {entity_id} missing"))?;
    let counted = store.count_by_kind(entity_id).await?;
    anyhow::ensure!(
        entity.tally == counted,
        "stored tally {:?} does not match records {:?}",
        entity.tally,
        counted
    );
    Ok(entity.tally)
}

/// Poll `check` until it holds or `timeout` passes
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(timeout, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

/// Create a test configuration from the environment
pub fn test_config() -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    let mut config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("Config error: {e}"))?;
    config.votes = test_settings();
    Ok(config)
}

/// Helper to check if a PostgreSQL test database is available
pub fn check_test_env() -> bool {
    dotenvy::dotenv().ok();
    for var in ["DATABASE_URL", "JWT_SECRET"] {
        if std::env::var(var).is_err() {
            eprintln!("Skipping test: {var} not set");
            return false;
        }
    }
    true
}

/// Helper to check if Redis is available too
pub fn check_redis_env() -> bool {
    if !check_test_env() {
        return false;
    }
    if std::env::var("REDIS_URL").is_err() {
        eprintln!("Skipping test: REDIS_URL not set");
        return false;
    }
    true
}
