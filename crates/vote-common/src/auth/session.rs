//! Session identity backed by a watch channel
//!
//! A session starts `Resolving` and settles on `SignedIn` or `SignedOut`
//! once credentials are checked. Consumers either read the current state or
//! wait for resolution.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};
use vote_core::{IdentityProvider, UserId};

use super::jwt::JwtService;
use crate::error::AppError;

/// Current state of a session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Resolving,
    SignedOut,
    SignedIn(UserId),
}

impl SessionState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Resolving)
    }

    pub fn user(&self) -> Option<&UserId> {
        match self {
            Self::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

/// Shared handle to one session; clones observe the same state
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    state: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdentity {
    /// Create an unresolved session
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Resolving);
        Self { state: Arc::new(tx) }
    }

    /// Create a session already signed in as `user`
    pub fn signed_in(user: UserId) -> Self {
        let session = Self::new();
        session.sign_in(user);
        session
    }

    /// Create a session already resolved to signed-out
    pub fn signed_out() -> Self {
        let session = Self::new();
        session.sign_out();
        session
    }

    pub fn sign_in(&self, user: UserId) {
        info!(user_id = %user, "Session signed in");
        self.set(SessionState::SignedIn(user));
    }

    pub fn sign_out(&self) {
        info!("Session signed out");
        self.set(SessionState::SignedOut);
    }

    /// Resolve the session from a bearer token
    ///
    /// An invalid token resolves the session to signed-out and returns the error.
    pub fn sign_in_with_token(&self, jwt: &JwtService, token: &str) -> Result<UserId, AppError> {
        match jwt.authenticate(token) {
            Ok(user) => {
                self.sign_in(user.clone());
                Ok(user)
            }
            Err(e) => {
                debug!(error = %e, "Rejected session token");
                self.set(SessionState::SignedOut);
                Err(e)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn set(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.state.borrow().user().cloned()
    }

    fn is_resolved(&self) -> bool {
        self.state.borrow().is_resolved()
    }

    async fn wait_until_resolved(&self) {
        let mut rx = self.state.subscribe();
        // Sender lives in self, so the channel cannot close while we wait
        let _ = rx.wait_for(SessionState::is_resolved).await;
    }
}
