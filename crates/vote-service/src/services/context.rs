//! Service context - dependency container for services
//!
//! Holds the reaction store, the identity provider, the subscription bus
//! and the optional cross-instance event sink.

use std::sync::Arc;
use std::time::Duration;

use vote_common::{RetryPolicy, VoteSettings};
use vote_core::{IdentityProvider, ReactionEventSink, ReactionStore};

use super::error::{ServiceError, ServiceResult};
use crate::bus::SubscriptionBus;

/// Service context containing all dependencies
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct ServiceContext {
    store: Arc<dyn ReactionStore>,
    identity: Arc<dyn IdentityProvider>,
    sink: Option<Arc<dyn ReactionEventSink>>,
    bus: SubscriptionBus,
    retry_policy: RetryPolicy,
    auth_ready_timeout: Duration,
}

impl ServiceContext {
    /// Create a new service context
    pub fn new(
        store: Arc<dyn ReactionStore>,
        identity: Arc<dyn IdentityProvider>,
        settings: &VoteSettings,
    ) -> Self {
        Self {
            store,
            identity,
            sink: None,
            bus: SubscriptionBus::new(),
            retry_policy: settings.retry_policy(),
            auth_ready_timeout: settings.auth_ready_timeout(),
        }
    }

    pub fn builder() -> ServiceContextBuilder {
        ServiceContextBuilder::new()
    }

    /// Get the reaction store
    pub fn store(&self) -> &dyn ReactionStore {
        self.store.as_ref()
    }

    /// Get the identity provider
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    /// Get the cross-instance event sink, if configured
    pub fn sink(&self) -> Option<&dyn ReactionEventSink> {
        self.sink.as_deref()
    }

    /// Get the subscription bus
    pub fn bus(&self) -> &SubscriptionBus {
        &self.bus
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn auth_ready_timeout(&self) -> Duration {
        self.auth_ready_timeout
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("store", &"dyn ReactionStore")
            .field("sink", &self.sink.is_some())
            .field("bus", &self.bus)
            .field("retry_policy", &self.retry_policy)
            .field("auth_ready_timeout", &self.auth_ready_timeout)
            .finish()
    }
}

/// Builder for creating ServiceContext with custom configuration
#[derive(Default)]
pub struct ServiceContextBuilder {
    store: Option<Arc<dyn ReactionStore>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    sink: Option<Arc<dyn ReactionEventSink>>,
    bus: Option<SubscriptionBus>,
    settings: VoteSettings,
    retry_policy: Option<RetryPolicy>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: Arc<dyn ReactionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ReactionEventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Share a bus with other contexts (e.g. one per session)
    pub fn bus(mut self, bus: SubscriptionBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn settings(mut self, settings: VoteSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Override the retry policy derived from the settings
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if a required dependency is
    /// missing or the settings are unusable
    pub fn build(self) -> ServiceResult<ServiceContext> {
        let store = self
            .store
            .ok_or_else(|| ServiceError::validation("store is required"))?;
        let identity = self
            .identity
            .ok_or_else(|| ServiceError::validation("identity is required"))?;
        self.settings
            .validate()
            .map_err(|e| ServiceError::validation(e.to_string()))?;

        let mut ctx = ServiceContext::new(store, identity, &self.settings);
        ctx.sink = self.sink;
        if let Some(bus) = self.bus {
            ctx.bus = bus;
        }
        if let Some(policy) = self.retry_policy {
            ctx.retry_policy = policy;
        }
        Ok(ctx)
    }
}
