//! Outbound event port

use async_trait::async_trait;

use super::repositories::RepoResult;
use crate::events::DomainEvent;

/// Fan-out target for committed events beyond this process
#[async_trait]
pub trait ReactionEventSink: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> RepoResult<()>;
}
