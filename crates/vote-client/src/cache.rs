//! Client-side reaction cache
//!
//! Holds what one signed-in user sees: per entity, the tally and the
//! user's own reaction. A cast is applied optimistically before the
//! coordinator answers; the pre-cast state is kept so a failed cast can be
//! rolled back. Confirmed values (cast outcomes, initial reads, bus pushes)
//! always overwrite optimistic ones, and are themselves gated by entity
//! version so an older push never replaces a newer one.

use std::collections::HashMap;

use vote_core::{EntityId, ReactionKind, ReactionTransition, UserId, VoteTally};
use vote_service::{TallyUpdate, UserReactionUpdate};

/// What the user sees for one entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalVoteState {
    pub tally: VoteTally,
    pub user_kind: Option<ReactionKind>,
}

/// An authoritative value from the coordinator or the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmed {
    /// Tally push
    Tally(TallyUpdate),
    /// One user's reaction push
    UserReaction {
        user_id: UserId,
        update: UserReactionUpdate,
    },
    /// Full state for the cache's user (cast outcome or initial read)
    State {
        version: u64,
        tally: VoteTally,
        user_kind: Option<ReactionKind>,
    },
}

#[derive(Debug, Clone, Default)]
struct Entry {
    state: LocalVoteState,
    tally_version: Option<u64>,
    kind_version: Option<u64>,
    /// State before the oldest unconfirmed optimistic cast
    before_optimistic: Option<LocalVoteState>,
}

fn is_newer(held: Option<u64>, version: u64) -> bool {
    held.map_or(true, |held| version > held)
}

impl Entry {
    /// A confirmed tally also becomes the rollback target's tally
    fn accept_tally(&mut self, version: u64, tally: VoteTally) -> bool {
        if !is_newer(self.tally_version, version) {
            return false;
        }
        self.tally_version = Some(version);
        self.state.tally = tally;
        if let Some(before) = &mut self.before_optimistic {
            before.tally = tally;
        }
        true
    }

    /// A confirmed kind settles the pending cast
    fn accept_kind(&mut self, version: u64, kind: Option<ReactionKind>) -> bool {
        if !is_newer(self.kind_version, version) {
            return false;
        }
        self.kind_version = Some(version);
        self.state.user_kind = kind;
        self.before_optimistic = None;
        true
    }
}

/// Per-user view of entities with optimistic updates
#[derive(Debug, Default)]
pub struct ReactionCache {
    user: Option<UserId>,
    entries: HashMap<EntityId, Entry>,
}

impl ReactionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(user: Option<UserId>) -> Self {
        Self {
            user,
            entries: HashMap::new(),
        }
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    /// Switch users; returns true (and forgets everything) if it changed
    pub fn set_user(&mut self, user: Option<UserId>) -> bool {
        if self.user == user {
            return false;
        }
        self.user = user;
        self.entries.clear();
        true
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<LocalVoteState> {
        self.entries.get(entity_id).map(|entry| entry.state)
    }

    /// Entities currently held
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entries.keys().cloned().collect()
    }

    /// Whether an optimistic cast awaits confirmation
    pub fn is_pending(&self, entity_id: &EntityId) -> bool {
        self.entries
            .get(entity_id)
            .is_some_and(|entry| entry.before_optimistic.is_some())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Apply a cast locally using the toggle rule
    ///
    /// Only the state before the first unconfirmed cast is remembered, so a
    /// rollback after several quick casts returns to the last confirmed view.
    pub fn apply_optimistic(
        &mut self,
        entity_id: &EntityId,
        user_id: &UserId,
        kind: ReactionKind,
    ) -> LocalVoteState {
        if self.user.as_ref() != Some(user_id) {
            self.set_user(Some(user_id.clone()));
        }

        let entry = self.entries.entry(entity_id.clone()).or_default();
        entry.before_optimistic.get_or_insert(entry.state);

        let transition = ReactionTransition::for_cast(entry.state.user_kind, kind);
        entry.state.tally = entry.state.tally.apply_saturating(transition);
        entry.state.user_kind = transition.next;
        entry.state
    }

    /// Adopt a confirmed value; returns false if it was stale or foreign
    ///
    /// A pending cast stays pending until the user's own kind is confirmed.
    /// Tally pushes in the meantime replace the shown tally and the tally a
    /// rollback would restore, but keep the kind to roll back to.
    pub fn reconcile(&mut self, entity_id: &EntityId, confirmed: Confirmed) -> bool {
        if let Confirmed::UserReaction { user_id, .. } = &confirmed {
            if self.user.as_ref() != Some(user_id) {
                return false;
            }
        }

        let entry = self.entries.entry(entity_id.clone()).or_default();
        let accepted = match confirmed {
            Confirmed::Tally(update) => entry.accept_tally(update.version, update.value),
            Confirmed::UserReaction { update, .. } => {
                entry.accept_kind(update.version, update.value)
            }
            Confirmed::State {
                version,
                tally,
                user_kind,
            } => {
                let tally_accepted = entry.accept_tally(version, tally);
                let kind_accepted = entry.accept_kind(version, user_kind);
                tally_accepted || kind_accepted
            }
        };

        accepted
    }

    /// Undo unconfirmed optimistic casts; returns true if anything changed
    pub fn rollback(&mut self, entity_id: &EntityId) -> bool {
        let Some(entry) = self.entries.get_mut(entity_id) else {
            return false;
        };
        match entry.before_optimistic.take() {
            Some(before) => {
                entry.state = before;
                true
            }
            None => false,
        }
    }
}
