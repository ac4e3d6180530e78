//! Identity provider port

use async_trait::async_trait;

use crate::value_objects::UserId;

/// Source of the signed-in user
///
/// A session starts unresolved (credentials still being checked) and
/// resolves to either a user or signed-out.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Signed-in user, `None` when signed out or unresolved
    fn current_user(&self) -> Option<UserId>;

    /// Whether the session has resolved
    fn is_resolved(&self) -> bool;

    /// Wait until the session resolves; returns at once if it already has
    async fn wait_until_resolved(&self);
}
