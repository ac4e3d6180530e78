//! Aggregate vote counter stored on each entity

use serde::{Deserialize, Serialize};

use super::reaction::{ReactionKind, ReactionTransition};
use crate::error::DomainError;

/// Denormalized per-entity counts of `Up` and `Down` reaction records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteTally {
    pub upvotes: u64,
    pub downvotes: u64,
}

impl VoteTally {
    pub const ZERO: Self = Self::new(0, 0);

    pub const fn new(upvotes: u64, downvotes: u64) -> Self {
        Self { upvotes, downvotes }
    }

    /// Count for one kind
    pub const fn count(&self, kind: ReactionKind) -> u64 {
        match kind {
            ReactionKind::Up => self.upvotes,
            ReactionKind::Down => self.downvotes,
        }
    }

    pub const fn total(&self) -> u64 {
        self.upvotes.saturating_add(self.downvotes)
    }

    /// Net score (`upvotes - downvotes`)
    pub fn score(&self) -> i64 {
        i64::try_from(self.upvotes).unwrap_or(i64::MAX)
            - i64::try_from(self.downvotes).unwrap_or(i64::MAX)
    }

    /// Apply a transition's deltas
    ///
    /// # Errors
    /// Returns `CounterUnderflow` if a decrement would take a count below zero,
    /// which means the stored tally no longer matches its records.
    pub fn apply(self, transition: ReactionTransition) -> Result<Self, DomainError> {
        let mut next = self;
        if let Some(kind) = transition.previous {
            let slot = next.slot_mut(kind);
            *slot = slot
                .checked_sub(1)
                .ok_or(DomainError::CounterUnderflow { kind })?;
        }
        if let Some(kind) = transition.next {
            let slot = next.slot_mut(kind);
            *slot = slot.saturating_add(1);
        }
        Ok(next)
    }

    /// Apply a transition clamping at zero
    ///
    /// Used for optimistic local state, where the tally may lag the store.
    pub fn apply_saturating(self, transition: ReactionTransition) -> Self {
        let mut next = self;
        if let Some(kind) = transition.previous {
            let slot = next.slot_mut(kind);
            *slot = slot.saturating_sub(1);
        }
        if let Some(kind) = transition.next {
            let slot = next.slot_mut(kind);
            *slot = slot.saturating_add(1);
        }
        next
    }

    /// Build a tally by counting reaction kinds
    pub fn from_kinds<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = ReactionKind>,
    {
        kinds.into_iter().fold(Self::ZERO, |mut tally, kind| {
            let slot = tally.slot_mut(kind);
            *slot = slot.saturating_add(1);
            tally
        })
    }

    fn slot_mut(&mut self, kind: ReactionKind) -> &mut u64 {
        match kind {
            ReactionKind::Up => &mut self.upvotes,
            ReactionKind::Down => &mut self.downvotes,
        }
    }
}
