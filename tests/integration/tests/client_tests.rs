//! Client reaction cache against a live engine
//!
//! Run with: cargo test -p integration-tests --test client_tests

use std::time::Duration;

use integration_tests::{eventually, user, Harness};
use vote_common::{SessionIdentity, VoteSettings};
use vote_core::{ErrorKind, ReactionKind, VoteTally};
use vote_client::{LocalVoteState, VoteClient};

use ReactionKind::{Down, Up};

#[tokio::test]
async fn test_two_clients_see_each_other() {
    let harness = Harness::new();
    let entity_id = harness.entity().await.unwrap();
    let alice = VoteClient::new(harness.session(&user("alice")).unwrap());
    let bob = VoteClient::new(harness.session(&user("bob")).unwrap());

    let mut alice_view = alice.watch(&entity_id).await.unwrap();
    let bob_view = bob.watch(&entity_id).await.unwrap();

    alice.cast(&entity_id, Up).await.unwrap();
    bob.cast(&entity_id, Down).await.unwrap();

    let expected = VoteTally::new(1, 1);
    let mut state = alice_view.state();
    while state.map(|s| s.tally) != Some(expected) {
        state = tokio::time::timeout(Duration::from_secs(1), alice_view.changed())
            .await
            .expect("alice never saw bob's cast");
    }
    assert_eq!(state.unwrap().user_kind, Some(Up));

    let bob_view = &bob_view;
    assert!(
        eventually(Duration::from_secs(1), || async move {
            bob_view.state()
                == Some(LocalVoteState {
                    tally: expected,
                    user_kind: Some(Down),
                })
        })
        .await
    );
}

#[tokio::test]
async fn test_failed_cast_returns_to_confirmed_state() {
    let harness = Harness::with_settings(VoteSettings {
        max_attempts: 2,
        initial_backoff_ms: 1,
        max_backoff_ms: 1,
        ..VoteSettings::default()
    });
    let entity_id = harness.entity().await.unwrap();
    let client = VoteClient::new(harness.session(&user("carol")).unwrap());

    client.cast(&entity_id, Up).await.unwrap();
    let confirmed = client.state(&entity_id);

    harness.store.contend(2);
    let err = client.cast(&entity_id, Down).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(client.state(&entity_id), confirmed);
    assert!(!client.is_pending(&entity_id));
}

#[tokio::test]
async fn test_load_for_signed_out_session() {
    let harness = Harness::new();
    let entity_id = harness.entity().await.unwrap();
    let voter = VoteClient::new(harness.session(&user("dave")).unwrap());
    voter.cast(&entity_id, Down).await.unwrap();

    let anonymous = VoteClient::new(harness.context(SessionIdentity::signed_out()).unwrap());
    let state = anonymous.load(&entity_id).await.unwrap();
    assert_eq!(state.tally, VoteTally::new(0, 1));
    assert_eq!(state.user_kind, None);

    let err = anonymous.cast(&entity_id, Up).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(anonymous.state(&entity_id), Some(state));
}

#[tokio::test]
async fn test_watch_follows_user_change() {
    let harness = Harness::new();
    let entity_id = harness.entity().await.unwrap();
    let erin = VoteClient::new(harness.session(&user("erin")).unwrap());
    erin.cast(&entity_id, Up).await.unwrap();

    let session = SessionIdentity::signed_out();
    let client = VoteClient::new(harness.context(session.clone()).unwrap());
    let follower = client.follow_session(session.watch());
    let view = client.watch(&entity_id).await.unwrap();
    let view = &view;

    session.sign_in(user("erin"));
    assert!(
        eventually(Duration::from_secs(1), || async move {
            view.state().and_then(|s| s.user_kind) == Some(Up)
        })
        .await
    );

    // Erin retracts from another device; the rebound feed reports it
    erin.cast(&entity_id, Up).await.unwrap();
    assert!(
        eventually(Duration::from_secs(1), || async move {
            view.state()
                == Some(LocalVoteState {
                    tally: VoteTally::ZERO,
                    user_kind: None,
                })
        })
        .await
    );

    follower.abort();
}
