//! In-process subscription bus
//!
//! One `watch` channel per observed key holds the newest versioned value.
//! Publishing only replaces the held value with a strictly newer version,
//! which gives every observer a monotonic view no matter how local commits
//! and relayed remote events interleave.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use vote_core::{DomainEvent, EntityId, ReactionKind, UserId, Versioned, VoteTally};

use super::subscription::{ReleaseGuard, Subscription};

/// Tally push: `{ upvotes, downvotes }` at an entity version
pub type TallyUpdate = Versioned<VoteTally>;

/// One user's reaction on an entity at an entity version
pub type UserReactionUpdate = Versioned<Option<ReactionKind>>;

type Slot<T> = watch::Sender<Option<Versioned<T>>>;

struct Channels<K, T> {
    slots: DashMap<K, Slot<T>>,
}

impl<K, T> Channels<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    fn watch(self: &Arc<Self>, key: K, observer_id: u64) -> Subscription<T> {
        let receiver = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| watch::Sender::new(None))
            .subscribe();

        let channels = Arc::clone(self);
        let guard = ReleaseGuard::new(move || {
            channels
                .slots
                .remove_if(&key, |_, slot| slot.receiver_count() == 0);
        });

        Subscription::new(observer_id, receiver, guard)
    }

    fn publish(&self, key: &K, update: Versioned<T>) -> bool {
        let Some(slot) = self.slots.get(key) else {
            return false;
        };
        slot.send_if_modified(|held| match held {
            Some(current) if !update.is_newer_than(current) => false,
            _ => {
                *held = Some(update);
                true
            }
        })
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn observers(&self, key: &K) -> usize {
        self.slots.get(key).map_or(0, |slot| slot.receiver_count())
    }
}

struct Inner {
    tallies: Arc<Channels<EntityId, VoteTally>>,
    reactions: Arc<Channels<(EntityId, UserId), Option<ReactionKind>>>,
    next_observer: AtomicU64,
}

/// Fan-out point for committed tally and reaction changes
#[derive(Clone)]
pub struct SubscriptionBus {
    inner: Arc<Inner>,
}

impl Default for SubscriptionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tallies: Arc::new(Channels::new()),
                reactions: Arc::new(Channels::new()),
                next_observer: AtomicU64::new(1),
            }),
        }
    }

    fn next_observer_id(&self) -> u64 {
        self.inner.next_observer.fetch_add(1, Ordering::Relaxed)
    }

    /// Register an observer of an entity's tally
    ///
    /// The subscription yields nothing until a value is published; seed it
    /// from the store after registering so no commit can fall in between.
    pub fn watch_tally(&self, entity_id: &EntityId) -> Subscription<VoteTally> {
        let observer_id = self.next_observer_id();
        tracing::trace!(entity_id = %entity_id, observer_id, "Tally observer registered");
        self.inner.tallies.watch(entity_id.clone(), observer_id)
    }

    /// Register an observer of one user's reaction on an entity
    pub fn watch_user_reaction(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
    ) -> Subscription<Option<ReactionKind>> {
        let observer_id = self.next_observer_id();
        tracing::trace!(
            entity_id = %entity_id,
            user_id = %user_id,
            observer_id,
            "Reaction observer registered"
        );
        self.inner
            .reactions
            .watch((entity_id.clone(), user_id.clone()), observer_id)
    }

    /// Offer a tally; returns true if observers were notified
    pub fn publish_tally(&self, entity_id: &EntityId, update: TallyUpdate) -> bool {
        self.inner.tallies.publish(entity_id, update)
    }

    /// Offer a user's reaction; returns true if observers were notified
    pub fn publish_user_reaction(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
        update: UserReactionUpdate,
    ) -> bool {
        self.inner
            .reactions
            .publish(&(entity_id.clone(), user_id.clone()), update)
    }

    /// Route a committed domain event to its observers
    pub fn publish_event(&self, event: &DomainEvent) {
        let entity_id = event.entity_id();
        let version = event.version();
        self.publish_tally(entity_id, Versioned::new(version, event.tally()));

        if let DomainEvent::ReactionChanged(changed) = event {
            self.publish_user_reaction(
                entity_id,
                &changed.event.user_id,
                Versioned::new(version, changed.event.new_kind),
            );
        }
    }

    /// Number of live tally observers for an entity
    pub fn tally_observers(&self, entity_id: &EntityId) -> usize {
        self.inner.tallies.observers(entity_id)
    }

    /// Number of entities with at least one tally observer
    pub fn watched_entities(&self) -> usize {
        self.inner.tallies.len()
    }

    /// Number of (entity, user) pairs with at least one reaction observer
    pub fn watched_reactions(&self) -> usize {
        self.inner.reactions.len()
    }
}

impl std::fmt::Debug for SubscriptionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionBus")
            .field("watched_entities", &self.watched_entities())
            .field("watched_reactions", &self.watched_reactions())
            .finish()
    }
}
