//! PostgreSQL and Redis backed tests
//!
//! These tests require:
//! - Running PostgreSQL instance
//! - Running Redis instance (fan-out tests only)
//! - Environment variables: DATABASE_URL, JWT_SECRET, REDIS_URL
//!
//! Run with: cargo test -p integration-tests --test store_tests

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use integration_tests::{
    assert_consistent, check_redis_env, check_test_env, test_config, unique_entity, user, users,
};
use vote_common::SessionIdentity;
use vote_core::{ReactionKind, VoteTally};
use vote_service::{Engine, ReactionService};

use ReactionKind::{Down, Up};

async fn pg_engine() -> Engine {
    let mut config = test_config().expect("test config");
    config.redis = None;
    Engine::connect(&config).await.expect("Failed to connect")
}

#[tokio::test]
async fn test_pg_scenario() {
    if !check_test_env() {
        return;
    }
    let engine = pg_engine().await;
    let p1 = unique_entity();
    let a = engine.context(Arc::new(SessionIdentity::signed_in(user("a")))).unwrap();
    let b = engine.context(Arc::new(SessionIdentity::signed_in(user("b")))).unwrap();

    let registered = ReactionService::new(&a).register_entity(&p1).await.unwrap();
    assert_eq!(registered.tally, VoteTally::ZERO);

    let service_a = ReactionService::new(&a);
    assert_eq!(service_a.cast_reaction(&p1, Up).await.unwrap().tally, VoteTally::new(1, 0));
    assert_eq!(service_a.cast_reaction(&p1, Down).await.unwrap().tally, VoteTally::new(0, 1));
    let outcome = ReactionService::new(&b).cast_reaction(&p1, Up).await.unwrap();
    assert_eq!(outcome.tally, VoteTally::new(1, 1));
    let outcome = service_a.cast_reaction(&p1, Down).await.unwrap();
    assert_eq!(outcome.tally, VoteTally::new(1, 0));
    assert_eq!(outcome.new_kind, None);

    let state = ReactionService::new(&b).get_vote_state(&p1).await.unwrap();
    assert_eq!(state.user_kind, Some(Up));
    assert_eq!(state.version, outcome.version);
}

#[tokio::test]
async fn test_pg_concurrent_users_converge() {
    if !check_test_env() {
        return;
    }
    let engine = pg_engine().await;
    let entity_id = unique_entity();
    let admin = engine.context(Arc::new(SessionIdentity::signed_out())).unwrap();
    ReactionService::new(&admin).register_entity(&entity_id).await.unwrap();

    let voters = users(16);
    let mut tasks = Vec::new();
    for voter in &voters {
        let ctx = engine.context(Arc::new(SessionIdentity::signed_in(voter.clone()))).unwrap();
        let entity_id = entity_id.clone();
        tasks.push(tokio::spawn(async move {
            ReactionService::new(&ctx).cast_reaction(&entity_id, Up).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let tally = assert_consistent(admin.store(), &entity_id).await.unwrap();
    assert_eq!(tally, VoteTally::new(16, 0));
    let recount = ReactionService::new(&admin).recount(&entity_id).await.unwrap();
    assert!(!recount.repaired);
}

#[tokio::test]
async fn test_redis_relay_reaches_other_instance() {
    if !check_redis_env() {
        return;
    }
    let config = test_config().expect("test config");
    let writer = Engine::connect(&config).await.expect("writer");
    let reader = Engine::connect(&config).await.expect("reader");
    assert!(writer.is_distributed() && reader.is_distributed());

    let entity_id = unique_entity();
    let writer_ctx = engine_session(&writer, "relay-writer");
    ReactionService::new(&writer_ctx).register_entity(&entity_id).await.unwrap();

    let reader_ctx = reader.context(Arc::new(SessionIdentity::signed_out())).unwrap();
    let mut subscription = ReactionService::new(&reader_ctx)
        .subscribe(&entity_id)
        .await
        .unwrap();
    assert_eq!(subscription.next().await.unwrap().value, VoteTally::ZERO);

    // Give the reader's Redis subscription time to attach
    tokio::time::sleep(Duration::from_millis(200)).await;
    let outcome = ReactionService::new(&writer_ctx)
        .cast_reaction(&entity_id, Down)
        .await
        .unwrap();

    let pushed = tokio::time::timeout(Duration::from_secs(5), subscription.next())
        .await
        .expect("relay never delivered")
        .unwrap();
    assert_eq!(pushed.value, VoteTally::new(0, 1));
    assert_eq!(pushed.version, outcome.version);

    writer.shutdown().await;
    reader.shutdown().await;
}

fn engine_session(engine: &Engine, name: &str) -> vote_service::ServiceContext {
    engine
        .context(Arc::new(SessionIdentity::signed_in(user(name))))
        .unwrap()
}
