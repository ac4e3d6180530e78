//! Reaction service - the transaction coordinator
//!
//! Every cast is one read-modify-write against the store: read the entity
//! and the user's record, apply the toggle rule, and commit the record
//! write plus the new tally conditioned on the version that was read. A
//! stale version means another writer got in first; the whole cycle is
//! retried under the context's [`RetryPolicy`](vote_common::RetryPolicy).

use std::collections::HashMap;
use std::future::Future;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn, Instrument};
use vote_core::{
    DomainError, DomainEvent, EntityId, EntityRegisteredEvent, Reaction, ReactionChangedEvent,
    ReactionCommit, ReactionEvent, ReactionKind, ReactionTransition, RecordWrite, RepoResult,
    TallyRecountedEvent, UserId, Versioned, Votable, VoteTally,
};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use crate::bus::{Subscription, TallyUpdate};

/// Result of a committed cast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CastOutcome {
    /// Kind the user holds after the cast; `None` after a retraction
    pub new_kind: Option<ReactionKind>,
    pub tally: VoteTally,
    pub version: u64,
    pub event: ReactionEvent,
}

/// Tally of an entity plus the current user's reaction on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteState {
    pub entity_id: EntityId,
    pub tally: VoteTally,
    pub version: u64,
    /// `None` when signed out or not reacted
    pub user_kind: Option<ReactionKind>,
}

/// Result of a tally audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecountOutcome {
    pub entity_id: EntityId,
    /// Stored tally before the audit
    pub previous: VoteTally,
    /// Tally counted from the records
    pub tally: VoteTally,
    pub version: u64,
    /// Whether the stored tally had drifted and was rewritten
    pub repaired: bool,
}

/// Reaction service
pub struct ReactionService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ReactionService<'a> {
    /// Create a new ReactionService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Cast, switch or retract the signed-in user's reaction
    ///
    /// Waits for an unresolved session first; fails with `Unauthenticated`
    /// before touching the store if nobody is signed in.
    #[instrument(skip(self))]
    pub async fn cast_reaction(
        &self,
        entity_id: &EntityId,
        kind: ReactionKind,
    ) -> ServiceResult<CastOutcome> {
        let user_id = self.require_user().await?;
        self.cast_reaction_as(entity_id, &user_id, kind).await
    }

    /// Cast on behalf of `user_id`
    ///
    /// The cast runs on its own task: dropping the returned future does not
    /// stop a commit that is already under way, nor the pushes after it.
    #[instrument(skip(self))]
    pub async fn cast_reaction_as(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
        kind: ReactionKind,
    ) -> ServiceResult<CastOutcome> {
        let ctx = self.ctx.clone();
        let entity_id = entity_id.clone();
        let user_id = user_id.clone();

        let task = tokio::spawn(
            async move {
                ReactionService::new(&ctx)
                    .run_cast(&entity_id, &user_id, kind)
                    .await
            }
            .in_current_span(),
        );

        task.await
            .map_err(|e| ServiceError::internal(format!("cast task failed: {e}")))?
    }

    async fn run_cast(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
        kind: ReactionKind,
    ) -> ServiceResult<CastOutcome> {
        let outcome = self
            .retry_on_conflict(entity_id, || self.attempt_cast(entity_id, user_id, kind))
            .await?;

        info!(
            entity_id = %entity_id,
            user_id = %user_id,
            previous = ?outcome.event.previous_kind,
            new_kind = ?outcome.new_kind,
            version = outcome.version,
            "Reaction committed"
        );

        let event = DomainEvent::ReactionChanged(ReactionChangedEvent {
            event: outcome.event.clone(),
            tally: outcome.tally,
            version: outcome.version,
            timestamp: Utc::now(),
        });
        self.dispatch(&event).await;

        Ok(outcome)
    }

    async fn attempt_cast(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
        kind: ReactionKind,
    ) -> RepoResult<CastOutcome> {
        let store = self.ctx.store();
        let snapshot = store
            .read_snapshot(entity_id, user_id)
            .await?
            .ok_or_else(|| DomainError::EntityNotFound(entity_id.clone()))?;

        let transition = ReactionTransition::for_cast(snapshot.previous_kind(), kind);
        let tally = snapshot.entity.tally.apply(transition)?;
        let record = match transition.next {
            Some(next) => {
                RecordWrite::Upsert(Reaction::new(entity_id.clone(), user_id.clone(), next))
            }
            None => RecordWrite::Delete,
        };

        let version = store
            .commit(&ReactionCommit {
                entity_id: entity_id.clone(),
                user_id: user_id.clone(),
                expected_version: snapshot.version(),
                record,
                tally,
            })
            .await?;

        Ok(CastOutcome {
            new_kind: transition.next,
            tally,
            version,
            event: ReactionEvent::new(entity_id.clone(), user_id.clone(), transition),
        })
    }

    /// Run `attempt` until it commits, retrying only on write conflicts
    async fn retry_on_conflict<T, F, Fut>(
        &self,
        entity_id: &EntityId,
        mut attempt: F,
    ) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RepoResult<T>>,
    {
        let policy = self.ctx.retry_policy();
        let mut attempts = 0;
        loop {
            attempts += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_conflict() && policy.should_retry(attempts) => {
                    let delay = policy.jittered_delay(attempts - 1);
                    debug!(
                        entity_id = %entity_id,
                        attempt = attempts,
                        delay_us = delay.as_micros() as u64,
                        "Write conflict, retrying"
                    );
                    if delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) if err.is_conflict() => {
                    warn!(entity_id = %entity_id, attempts, "Retry ceiling reached");
                    return Err(DomainError::RetriesExhausted {
                        entity_id: entity_id.clone(),
                        attempts,
                    }
                    .into());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Push a committed event to local observers and, if configured, to
    /// other instances. A failed remote publish is logged, never returned.
    async fn dispatch(&self, event: &DomainEvent) {
        self.ctx.bus().publish_event(event);

        if let Some(sink) = self.ctx.sink() {
            if let Err(e) = sink.publish(event).await {
                warn!(
                    entity_id = %event.entity_id(),
                    version = event.version(),
                    error = %e,
                    "Failed to publish event to other instances"
                );
            }
        }
    }

    // === Session ===

    async fn resolved_user(&self) -> ServiceResult<Option<UserId>> {
        let identity = self.ctx.identity();
        if !identity.is_resolved() {
            debug!("Waiting for session to resolve");
            tokio::time::timeout(self.ctx.auth_ready_timeout(), identity.wait_until_resolved())
                .await
                .map_err(|_| DomainError::AuthNotReady)?;
        }
        Ok(identity.current_user())
    }

    async fn require_user(&self) -> ServiceResult<UserId> {
        self.resolved_user()
            .await?
            .ok_or_else(|| DomainError::Unauthenticated.into())
    }

    // === Reads ===

    /// Tally of an entity plus the signed-in user's reaction
    #[instrument(skip(self))]
    pub async fn get_vote_state(&self, entity_id: &EntityId) -> ServiceResult<VoteState> {
        let store = self.ctx.store();
        let not_found = || DomainError::EntityNotFound(entity_id.clone());

        let (entity, user_kind) = match self.resolved_user().await? {
            Some(user_id) => {
                let snapshot = store
                    .read_snapshot(entity_id, &user_id)
                    .await?
                    .ok_or_else(not_found)?;
                let kind = snapshot.previous_kind();
                (snapshot.entity, kind)
            }
            None => (store.find_entity(entity_id).await?.ok_or_else(not_found)?, None),
        };

        Ok(VoteState {
            entity_id: entity.id,
            tally: entity.tally,
            version: entity.version,
            user_kind,
        })
    }

    /// Current tally of an entity
    #[instrument(skip(self))]
    pub async fn get_tally(&self, entity_id: &EntityId) -> ServiceResult<TallyUpdate> {
        let entity = self
            .ctx
            .store()
            .find_entity(entity_id)
            .await?
            .ok_or_else(|| DomainError::EntityNotFound(entity_id.clone()))?;
        Ok(Versioned::new(entity.version, entity.tally))
    }

    /// The signed-in user's reactions among `entity_ids`
    ///
    /// Entities without a reaction are absent from the map; a signed-out
    /// session gets an empty map.
    #[instrument(skip(self, entity_ids), fields(count = entity_ids.len()))]
    pub async fn get_user_reactions(
        &self,
        entity_ids: &[EntityId],
    ) -> ServiceResult<HashMap<EntityId, ReactionKind>> {
        let Some(user_id) = self.resolved_user().await? else {
            return Ok(HashMap::new());
        };
        if entity_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let reactions = self
            .ctx
            .store()
            .find_reactions_by_user(&user_id, entity_ids)
            .await?;
        Ok(reactions
            .into_iter()
            .map(|reaction| (reaction.entity_id, reaction.kind))
            .collect())
    }

    // === Writes ===

    /// Create an entity with a zero tally; no-op if it exists
    #[instrument(skip(self))]
    pub async fn register_entity(&self, entity_id: &EntityId) -> ServiceResult<Votable> {
        let entity = self.ctx.store().register(entity_id).await?;
        debug!(entity_id = %entity_id, version = entity.version, "Entity registered");

        self.dispatch(&DomainEvent::EntityRegistered(EntityRegisteredEvent {
            entity_id: entity.id.clone(),
            tally: entity.tally,
            version: entity.version,
            timestamp: Utc::now(),
        }))
        .await;

        Ok(entity)
    }

    /// Recount the tally from the reaction records and repair drift
    #[instrument(skip(self))]
    pub async fn recount(&self, entity_id: &EntityId) -> ServiceResult<RecountOutcome> {
        let outcome = self
            .retry_on_conflict(entity_id, || self.attempt_recount(entity_id))
            .await?;

        if outcome.repaired {
            warn!(
                entity_id = %entity_id,
                stored = ?outcome.previous,
                counted = ?outcome.tally,
                version = outcome.version,
                "Tally drift repaired"
            );
            self.dispatch(&DomainEvent::TallyRecounted(TallyRecountedEvent {
                entity_id: entity_id.clone(),
                previous: outcome.previous,
                tally: outcome.tally,
                version: outcome.version,
                timestamp: Utc::now(),
            }))
            .await;
        } else {
            debug!(entity_id = %entity_id, "Tally matches records");
        }

        Ok(outcome)
    }

    async fn attempt_recount(&self, entity_id: &EntityId) -> RepoResult<RecountOutcome> {
        let store = self.ctx.store();
        // Entity first: any record change after this read bumps the version
        // and fails the conditional write below.
        let entity = store
            .find_entity(entity_id)
            .await?
            .ok_or_else(|| DomainError::EntityNotFound(entity_id.clone()))?;
        let counted = store.count_by_kind(entity_id).await?;

        if counted == entity.tally {
            return Ok(RecountOutcome {
                entity_id: entity.id,
                previous: entity.tally,
                tally: counted,
                version: entity.version,
                repaired: false,
            });
        }

        let version = store
            .commit_tally(entity_id, entity.version, counted)
            .await?;
        Ok(RecountOutcome {
            entity_id: entity.id,
            previous: entity.tally,
            tally: counted,
            version,
            repaired: true,
        })
    }

    // === Subscriptions ===

    /// Live tally of an entity, starting with the current value
    ///
    /// Registers with the bus before reading the store, so a commit landing
    /// between the two is either in the read or pushed after it.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, entity_id: &EntityId) -> ServiceResult<Subscription<VoteTally>> {
        let bus = self.ctx.bus();
        let subscription = bus.watch_tally(entity_id);

        let entity = self
            .ctx
            .store()
            .find_entity(entity_id)
            .await?
            .ok_or_else(|| DomainError::EntityNotFound(entity_id.clone()))?;
        bus.publish_tally(entity_id, Versioned::new(entity.version, entity.tally));

        debug!(
            entity_id = %entity_id,
            observer_id = subscription.observer_id(),
            version = entity.version,
            "Tally subscription started"
        );
        Ok(subscription)
    }

    /// Live view of the signed-in user's reaction on an entity
    #[instrument(skip(self))]
    pub async fn subscribe_user_reaction(
        &self,
        entity_id: &EntityId,
    ) -> ServiceResult<Subscription<Option<ReactionKind>>> {
        let user_id = self.require_user().await?;
        self.subscribe_user_reaction_as(entity_id, &user_id).await
    }

    /// Live view of `user_id`'s reaction on an entity
    #[instrument(skip(self))]
    pub async fn subscribe_user_reaction_as(
        &self,
        entity_id: &EntityId,
        user_id: &UserId,
    ) -> ServiceResult<Subscription<Option<ReactionKind>>> {
        let bus = self.ctx.bus();
        let subscription = bus.watch_user_reaction(entity_id, user_id);

        let snapshot = self
            .ctx
            .store()
            .read_snapshot(entity_id, user_id)
            .await?
            .ok_or_else(|| DomainError::EntityNotFound(entity_id.clone()))?;
        bus.publish_user_reaction(
            entity_id,
            user_id,
            Versioned::new(snapshot.version(), snapshot.previous_kind()),
        );

        Ok(subscription)
    }
}
