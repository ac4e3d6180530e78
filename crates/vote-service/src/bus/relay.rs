//! Feeds reaction events committed by other instances into the local bus

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use vote_cache::{PubSubChannel, ReceivedMessage};

use super::SubscriptionBus;

/// Background task forwarding Redis pub/sub traffic to a [`SubscriptionBus`]
///
/// Messages tagged with this instance's origin are skipped; anything that
/// slips through is harmless since the bus drops versions it has already
/// seen.
#[derive(Debug)]
pub struct EventRelay {
    handle: JoinHandle<()>,
}

impl EventRelay {
    /// Start relaying messages from `receiver`
    ///
    /// Subscribe the underlying `vote_cache::Subscriber` to
    /// [`PubSubChannel::Reactions`] first.
    pub fn spawn(
        bus: SubscriptionBus,
        receiver: broadcast::Receiver<ReceivedMessage>,
        origin: impl Into<String>,
    ) -> Self {
        let origin = origin.into();
        let handle = tokio::spawn(relay_loop(bus, receiver, origin));
        Self { handle }
    }

    /// Stop relaying
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for EventRelay {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn relay_loop(
    bus: SubscriptionBus,
    mut receiver: broadcast::Receiver<ReceivedMessage>,
    origin: String,
) {
    loop {
        match receiver.recv().await {
            Ok(message) => {
                forward(&bus, &message, &origin);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Relay fell behind, remote updates dropped");
            }
            Err(RecvError::Closed) => {
                tracing::info!("Relay source closed");
                return;
            }
        }
    }
}

/// Returns true if the message was handed to the bus
pub(crate) fn forward(bus: &SubscriptionBus, message: &ReceivedMessage, origin: &str) -> bool {
    if message.channel != PubSubChannel::Reactions || message.origin() == Some(origin) {
        return false;
    }
    match message.domain_event() {
        Ok(event) => {
            tracing::trace!(
                entity_id = %event.entity_id(),
                version = event.version(),
                event_type = event.event_type(),
                "Relaying remote event"
            );
            bus.publish_event(&event);
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable relay message");
            false
        }
    }
}
