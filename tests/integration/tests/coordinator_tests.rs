//! Transaction coordinator properties and scenarios
//!
//! Run against the in-memory store; no external services needed.
//!
//! Run with: cargo test -p integration-tests --test coordinator_tests

use std::collections::HashMap;
use std::time::Duration;

use futures_util::StreamExt;
use integration_tests::{assert_consistent, user, users, Harness};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vote_common::{SessionIdentity, VoteSettings};
use vote_core::{DomainError, ErrorKind, ReactionKind, ReactionStore, VoteTally};
use vote_service::ReactionService;

use ReactionKind::{Down, Up};

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_p1_scenario() {
    let harness = Harness::new();
    let p1 = harness.entity().await.unwrap();
    let a = harness.session(&user("a")).unwrap();
    let b = harness.session(&user("b")).unwrap();

    let outcome = ReactionService::new(&a).cast_reaction(&p1, Up).await.unwrap();
    assert_eq!(outcome.tally, VoteTally::new(1, 0));
    assert_eq!(outcome.new_kind, Some(Up));

    let outcome = ReactionService::new(&a).cast_reaction(&p1, Down).await.unwrap();
    assert_eq!(outcome.tally, VoteTally::new(0, 1));
    assert_eq!(outcome.new_kind, Some(Down));

    let outcome = ReactionService::new(&b).cast_reaction(&p1, Up).await.unwrap();
    assert_eq!(outcome.tally, VoteTally::new(1, 1));

    let outcome = ReactionService::new(&a).cast_reaction(&p1, Down).await.unwrap();
    assert_eq!(outcome.tally, VoteTally::new(1, 0));
    assert_eq!(outcome.new_kind, None);
    assert_eq!(outcome.version, 4);

    assert_consistent(&harness.store, &p1).await.unwrap();
    let state = ReactionService::new(&b).get_vote_state(&p1).await.unwrap();
    assert_eq!(state.user_kind, Some(Up));
}

#[tokio::test]
async fn test_unauthenticated_cast_leaves_store_untouched() {
    let harness = Harness::new();
    let p1 = harness.entity().await.unwrap();
    let ctx = harness.context(SessionIdentity::signed_out()).unwrap();

    let err = ReactionService::new(&ctx).cast_reaction(&p1, Up).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let entity = harness.store.find_entity(&p1).await.unwrap().unwrap();
    assert_eq!(entity.version, 0);
    assert_eq!(entity.tally, VoteTally::ZERO);
    assert_eq!(harness.store.count_by_kind(&p1).await.unwrap(), VoteTally::ZERO);
}

#[tokio::test]
async fn test_cast_waits_for_session() {
    let harness = Harness::new();
    let p1 = harness.entity().await.unwrap();
    let session = SessionIdentity::new();
    let ctx = harness.context(session.clone()).unwrap();

    let cast = tokio::spawn(async move { ReactionService::new(&ctx).cast_reaction(&p1, Down).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!cast.is_finished());

    session.sign_in(user("late"));
    let outcome = cast.await.unwrap().unwrap();
    assert_eq!(outcome.tally, VoteTally::new(0, 1));
    assert_eq!(outcome.event.user_id, user("late"));
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_idempotent_toggle() {
    let harness = Harness::new();
    let entity_id = harness.entity().await.unwrap();
    for (i, other) in users(3).iter().enumerate() {
        let kind = if i % 2 == 0 { Up } else { Down };
        let ctx = harness.session(other).unwrap();
        ReactionService::new(&ctx).cast_reaction(&entity_id, kind).await.unwrap();
    }
    let before = harness.store.find_entity(&entity_id).await.unwrap().unwrap().tally;

    let ctx = harness.session(&user("toggler")).unwrap();
    let service = ReactionService::new(&ctx);
    for kind in [Up, Down] {
        service.cast_reaction(&entity_id, kind).await.unwrap();
        let outcome = service.cast_reaction(&entity_id, kind).await.unwrap();
        assert_eq!(outcome.new_kind, None);
        assert_eq!(outcome.tally, before);
    }
    assert_consistent(&harness.store, &entity_id).await.unwrap();
}

#[tokio::test]
async fn test_switch_conservation() {
    let harness = Harness::new();
    let switched = harness.entity().await.unwrap();
    let direct = harness.entity().await.unwrap();
    let ctx = harness.session(&user("switcher")).unwrap();
    let service = ReactionService::new(&ctx);

    service.cast_reaction(&switched, Up).await.unwrap();
    let via_switch = service.cast_reaction(&switched, Down).await.unwrap();
    let via_direct = service.cast_reaction(&direct, Down).await.unwrap();

    assert_eq!(via_switch.tally, via_direct.tally);
    assert_eq!(via_switch.tally.total(), 1);
    assert_eq!(via_switch.new_kind, via_direct.new_kind);
}

#[tokio::test]
async fn test_random_sequence_keeps_counters_matching_records() {
    let harness = Harness::new();
    let entities = [
        harness.entity().await.unwrap(),
        harness.entity().await.unwrap(),
        harness.entity().await.unwrap(),
    ];
    let voters = users(5);
    let contexts: Vec<_> = voters.iter().map(|u| harness.session(u).unwrap()).collect();

    let mut rng = StdRng::seed_from_u64(7);
    let mut expected: HashMap<(usize, usize), ReactionKind> = HashMap::new();

    for step in 0..200 {
        let e = rng.gen_range(0..entities.len());
        let u = rng.gen_range(0..voters.len());
        let kind = if rng.gen_bool(0.5) { Up } else { Down };
        if step % 25 == 0 {
            harness.store.contend(2);
        }

        let outcome = ReactionService::new(&contexts[u])
            .cast_reaction(&entities[e], kind)
            .await
            .unwrap();

        if expected.get(&(e, u)) == Some(&kind) {
            expected.remove(&(e, u));
        } else {
            expected.insert((e, u), kind);
        }
        assert_eq!(outcome.new_kind, expected.get(&(e, u)).copied());

        let tally = assert_consistent(&harness.store, &entities[e]).await.unwrap();
        let model = VoteTally::from_kinds(
            expected
                .iter()
                .filter(|((entity, _), _)| *entity == e)
                .map(|(_, kind)| *kind),
        );
        assert_eq!(tally, model, "step {step}");
    }
    assert!(harness.store.injected() > 0);
}

#[tokio::test]
async fn test_concurrent_disjoint_users_converge() {
    let harness = Harness::new();
    let entity_id = harness.entity().await.unwrap();
    let voters = users(32);
    harness.store.contend(20);

    let mut tasks = Vec::new();
    for voter in &voters {
        let ctx = harness.session(voter).unwrap();
        let entity_id = entity_id.clone();
        tasks.push(tokio::spawn(async move {
            ReactionService::new(&ctx).cast_reaction(&entity_id, Up).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let tally = assert_consistent(&harness.store, &entity_id).await.unwrap();
    assert_eq!(tally, VoteTally::new(32, 0));
    assert_eq!(harness.store.injected(), 20);
}

#[tokio::test]
async fn test_retries_exhausted_is_unavailable() {
    let harness = Harness::with_settings(VoteSettings {
        max_attempts: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 2,
        ..VoteSettings::default()
    });
    let entity_id = harness.entity().await.unwrap();
    let ctx = harness.session(&user("unlucky")).unwrap();
    let service = ReactionService::new(&ctx);

    harness.store.contend(3);
    let err = service.cast_reaction(&entity_id, Up).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(matches!(
        err.as_domain(),
        Some(DomainError::RetriesExhausted { attempts: 3, .. })
    ));
    assert_eq!(
        harness.store.count_by_kind(&entity_id).await.unwrap(),
        VoteTally::ZERO
    );

    let outcome = service.cast_reaction(&entity_id, Up).await.unwrap();
    assert_eq!(outcome.tally, VoteTally::new(1, 0));
}

// ============================================================================
// Reads, subscriptions, repair
// ============================================================================

#[tokio::test]
async fn test_subscriber_sees_increasing_versions() {
    let harness = Harness::new();
    let entity_id = harness.entity().await.unwrap();
    let observer = harness.context(SessionIdentity::signed_out()).unwrap();
    let mut subscription = ReactionService::new(&observer)
        .subscribe(&entity_id)
        .await
        .unwrap();

    let voters = users(10);
    harness.store.contend(5);
    for voter in &voters {
        let ctx = harness.session(voter).unwrap();
        let entity_id = entity_id.clone();
        tokio::spawn(async move { ReactionService::new(&ctx).cast_reaction(&entity_id, Down).await });
    }

    let mut last = None;
    loop {
        let update = tokio::time::timeout(Duration::from_secs(2), subscription.next())
            .await
            .expect("subscription stalled")
            .expect("subscription closed");
        if let Some(previous) = last {
            assert!(update.version > previous, "version went from {previous} to {}", update.version);
        }
        last = Some(update.version);
        if update.value == VoteTally::new(0, 10) {
            break;
        }
    }
}

#[tokio::test]
async fn test_user_reactions_batch() {
    let harness = Harness::new();
    let first = harness.entity().await.unwrap();
    let second = harness.entity().await.unwrap();
    let untouched = harness.entity().await.unwrap();
    let ctx = harness.session(&user("reader")).unwrap();
    let service = ReactionService::new(&ctx);

    service.cast_reaction(&first, Up).await.unwrap();
    service.cast_reaction(&second, Down).await.unwrap();

    let reactions = service
        .get_user_reactions(&[first.clone(), second.clone(), untouched.clone()])
        .await
        .unwrap();
    assert_eq!(reactions.len(), 2);
    assert_eq!(reactions[&first], Up);
    assert_eq!(reactions[&second], Down);
    assert!(!reactions.contains_key(&untouched));
}

#[tokio::test]
async fn test_recount_repairs_drift_and_notifies() {
    let harness = Harness::new();
    let entity_id = harness.entity().await.unwrap();
    for voter in users(3) {
        let ctx = harness.session(&voter).unwrap();
        ReactionService::new(&ctx).cast_reaction(&entity_id, Up).await.unwrap();
    }
    harness
        .store
        .inner()
        .corrupt_tally(&entity_id, VoteTally::new(7, 2))
        .unwrap();

    let observer = harness.context(SessionIdentity::signed_out()).unwrap();
    let service = ReactionService::new(&observer);
    let mut subscription = service.subscribe(&entity_id).await.unwrap();
    let seeded = subscription.next().await.unwrap();
    assert_eq!(seeded.value, VoteTally::new(7, 2));

    harness.store.contend(1);
    let outcome = service.recount(&entity_id).await.unwrap();
    assert!(outcome.repaired);
    assert_eq!(outcome.previous, VoteTally::new(7, 2));
    assert_eq!(outcome.tally, VoteTally::new(3, 0));

    let pushed = subscription.next().await.unwrap();
    assert_eq!(pushed.value, VoteTally::new(3, 0));
    assert_eq!(pushed.version, outcome.version);

    let again = service.recount(&entity_id).await.unwrap();
    assert!(!again.repaired);
}
