//! Session-bound vote client
//!
//! Wraps the coordinator for one session: casts are shown optimistically
//! and confirmed or rolled back when the coordinator answers, live pushes
//! keep the view fresh, and a change of signed-in user drops everything
//! the previous user saw.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use vote_common::SessionState;
use vote_core::{EntityId, ReactionKind, UserId};
use vote_service::dto::{CastReactionRequest, UserReactionsRequest};
use vote_service::{CastOutcome, ReactionService, ServiceContext, ServiceResult};

use crate::cache::{Confirmed, LocalVoteState, ReactionCache};

type View = watch::Sender<Option<LocalVoteState>>;

/// Cache plus the live views fed from it
#[derive(Default)]
struct Shared {
    cache: ReactionCache,
    views: HashMap<EntityId, View>,
}

impl Shared {
    fn publish(&self, entity_id: &EntityId) {
        if let Some(view) = self.views.get(entity_id) {
            view.send_replace(self.cache.get(entity_id));
        }
    }

    fn publish_all(&self) {
        for (entity_id, view) in &self.views {
            view.send_replace(self.cache.get(entity_id));
        }
    }
}

struct Inner {
    shared: Mutex<Shared>,
    /// User the cache belongs to; watch tasks re-subscribe on change
    users: watch::Sender<Option<UserId>>,
}

/// Client view of reactions for one session
#[derive(Clone)]
pub struct VoteClient {
    ctx: ServiceContext,
    inner: Arc<Inner>,
}

impl std::fmt::Debug for VoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("VoteClient")
            .field("user", &shared.cache.user())
            .field("entities", &shared.cache.entity_ids().len())
            .field("views", &shared.views.len())
            .finish()
    }
}

impl VoteClient {
    pub fn new(ctx: ServiceContext) -> Self {
        let user = ctx.identity().current_user();
        let (users, _) = watch::channel(user.clone());
        Self {
            ctx,
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    cache: ReactionCache::for_user(user),
                    views: HashMap::new(),
                }),
                users,
            }),
        }
    }

    /// Cached state of an entity, if loaded
    pub fn state(&self, entity_id: &EntityId) -> Option<LocalVoteState> {
        self.inner.shared.lock().cache.get(entity_id)
    }

    /// Whether a cast on the entity awaits confirmation
    pub fn is_pending(&self, entity_id: &EntityId) -> bool {
        self.inner.shared.lock().cache.is_pending(entity_id)
    }

    pub fn user(&self) -> Option<UserId> {
        self.inner.shared.lock().cache.user().cloned()
    }

    /// Fetch the entity's state from the coordinator into the cache
    pub async fn load(&self, entity_id: &EntityId) -> ServiceResult<LocalVoteState> {
        let state = ReactionService::new(&self.ctx)
            .get_vote_state(entity_id)
            .await?;
        self.switch_user(self.ctx.identity().current_user());

        let mut shared = self.inner.shared.lock();
        shared.cache.reconcile(
            entity_id,
            Confirmed::State {
                version: state.version,
                tally: state.tally,
                user_kind: state.user_kind,
            },
        );
        shared.publish(entity_id);
        Ok(shared.cache.get(entity_id).unwrap_or_default())
    }

    /// Cast through the coordinator, showing the result immediately
    ///
    /// The local view flips before the commit. On failure it is put back
    /// and the error is returned; on success the committed values replace
    /// the optimistic ones.
    pub async fn cast(&self, entity_id: &EntityId, kind: ReactionKind) -> ServiceResult<CastOutcome> {
        if let Some(user_id) = self.ctx.identity().current_user() {
            let mut shared = self.inner.shared.lock();
            let switched = shared.cache.user() != Some(&user_id);
            shared.cache.apply_optimistic(entity_id, &user_id, kind);
            if switched {
                shared.publish_all();
                self.inner.users.send_replace(Some(user_id));
            } else {
                shared.publish(entity_id);
            }
        }

        match ReactionService::new(&self.ctx).cast_reaction(entity_id, kind).await {
            Ok(outcome) => {
                self.switch_user(Some(outcome.event.user_id.clone()));
                let mut shared = self.inner.shared.lock();
                shared.cache.reconcile(
                    entity_id,
                    Confirmed::State {
                        version: outcome.version,
                        tally: outcome.tally,
                        user_kind: outcome.new_kind,
                    },
                );
                shared.publish(entity_id);
                Ok(outcome)
            }
            Err(e) => {
                let mut shared = self.inner.shared.lock();
                if shared.cache.rollback(entity_id) {
                    debug!(entity_id = %entity_id, error = %e, "Optimistic cast rolled back");
                    shared.publish(entity_id);
                }
                Err(e)
            }
        }
    }

    /// Cast from raw input, e.g. `{"entity_id": "p1", "kind": "like"}`
    ///
    /// Malformed input fails with `Invalid` before anything is shown.
    pub async fn cast_request(&self, request: &CastReactionRequest) -> ServiceResult<CastOutcome> {
        let (entity_id, kind) = request.parse()?;
        self.cast(&entity_id, kind).await
    }

    /// The signed-in user's reactions on a page of entities
    ///
    /// Entities without a reaction are absent from the result. The cache is
    /// left alone: the batch read carries no versions to order it by.
    pub async fn user_reactions(
        &self,
        request: &UserReactionsRequest,
    ) -> ServiceResult<HashMap<EntityId, ReactionKind>> {
        let entity_ids = request.parse()?;
        let reactions = ReactionService::new(&self.ctx)
            .get_user_reactions(&entity_ids)
            .await?;
        debug!(requested = entity_ids.len(), found = reactions.len(), "User reactions loaded");
        Ok(reactions)
    }

    /// Live view of an entity
    ///
    /// Starts from the stored values, then follows tally pushes and, while
    /// signed in, the user's own reaction pushes. Dropping the handle stops
    /// the feed.
    pub async fn watch(&self, entity_id: &EntityId) -> ServiceResult<EntityWatch> {
        let mut users = self.inner.users.subscribe();
        let user = users.borrow_and_update().clone();
        let updates = self.updates(entity_id, user).await?;

        let receiver = {
            let mut shared = self.inner.shared.lock();
            let initial = shared.cache.get(entity_id);
            let view = shared
                .views
                .entry(entity_id.clone())
                .or_insert_with(|| watch::channel(initial).0);
            view.subscribe()
        };

        let client = self.clone();
        let entity = entity_id.clone();
        let task = tokio::spawn(
            async move { client.follow_entity(entity, updates, users).await }.in_current_span(),
        );

        Ok(EntityWatch {
            entity_id: entity_id.clone(),
            receiver,
            task,
            inner: Arc::clone(&self.inner),
        })
    }

    /// Keep the cache bound to the session's user
    ///
    /// While the session is resolving nothing changes. Once it settles on a
    /// different user the cache is cleared and every previously held entity
    /// is loaded again for the new user.
    pub fn follow_session(&self, mut session: watch::Receiver<SessionState>) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(
            async move {
                loop {
                    let state = session.borrow_and_update().clone();
                    if state.is_resolved() {
                        client.on_session(state.user().cloned()).await;
                    }
                    if session.changed().await.is_err() {
                        break;
                    }
                }
            }
            .in_current_span(),
        )
    }

    async fn on_session(&self, user: Option<UserId>) {
        let reload = {
            let shared = self.inner.shared.lock();
            if shared.cache.user() == user.as_ref() {
                return;
            }
            let mut ids = shared.cache.entity_ids();
            ids.extend(shared.views.keys().cloned());
            ids.sort();
            ids.dedup();
            ids
        };

        self.switch_user(user.clone());
        info!(user_id = ?user, entities = reload.len(), "Session user changed");

        for entity_id in reload {
            if let Err(e) = self.load(&entity_id).await {
                warn!(entity_id = %entity_id, error = %e, "Failed to reload entity");
            }
        }
    }

    /// Rebind the cache; returns true if the user changed
    fn switch_user(&self, user: Option<UserId>) -> bool {
        let mut shared = self.inner.shared.lock();
        if !shared.cache.set_user(user.clone()) {
            return false;
        }
        shared.publish_all();
        self.inner.users.send_replace(user);
        true
    }

    async fn updates(
        &self,
        entity_id: &EntityId,
        user: Option<UserId>,
    ) -> ServiceResult<BoxStream<'static, Confirmed>> {
        let service = ReactionService::new(&self.ctx);
        let tallies = service.subscribe(entity_id).await?.map(Confirmed::Tally);

        let Some(user_id) = user else {
            return Ok(tallies.boxed());
        };
        let reactions = service
            .subscribe_user_reaction_as(entity_id, &user_id)
            .await?
            .map(move |update| Confirmed::UserReaction {
                user_id: user_id.clone(),
                update,
            });
        Ok(stream::select(tallies, reactions).boxed())
    }

    async fn follow_entity(
        &self,
        entity_id: EntityId,
        mut updates: BoxStream<'static, Confirmed>,
        mut users: watch::Receiver<Option<UserId>>,
    ) {
        loop {
            tokio::select! {
                next = updates.next() => {
                    let Some(confirmed) = next else {
                        return;
                    };
                    let mut shared = self.inner.shared.lock();
                    if shared.cache.reconcile(&entity_id, confirmed) {
                        shared.publish(&entity_id);
                    }
                }
                changed = users.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let user = users.borrow_and_update().clone();
                    match self.updates(&entity_id, user).await {
                        Ok(next) => updates = next,
                        Err(e) => {
                            warn!(entity_id = %entity_id, error = %e, "Failed to resubscribe");
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Live view of one entity; stops following when dropped
pub struct EntityWatch {
    entity_id: EntityId,
    receiver: watch::Receiver<Option<LocalVoteState>>,
    task: JoinHandle<()>,
    inner: Arc<Inner>,
}

impl EntityWatch {
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Latest state; `None` until loaded for the current user
    pub fn state(&self) -> Option<LocalVoteState> {
        *self.receiver.borrow()
    }

    /// Wait for the next change and return it
    pub async fn changed(&mut self) -> Option<LocalVoteState> {
        // The sender lives in the client while this handle exists
        let _ = self.receiver.changed().await;
        *self.receiver.borrow_and_update()
    }
}

impl std::fmt::Debug for EntityWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityWatch")
            .field("entity_id", &self.entity_id)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for EntityWatch {
    fn drop(&mut self) {
        self.task.abort();
        let mut shared = self.inner.shared.lock();
        // Our own receiver is still counted here
        if shared
            .views
            .get(&self.entity_id)
            .is_some_and(|view| view.receiver_count() <= 1)
        {
            shared.views.remove(&self.entity_id);
        }
    }
}
