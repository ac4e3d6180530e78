//! Subscription bus - pushes committed changes to observers
//!
//! Local commits publish straight into the [`SubscriptionBus`]; the
//! [`EventRelay`] feeds in changes committed by other instances.

mod hub;
mod relay;
mod subscription;

pub use hub::{SubscriptionBus, TallyUpdate, UserReactionUpdate};
pub use relay::EventRelay;
pub use subscription::Subscription;
