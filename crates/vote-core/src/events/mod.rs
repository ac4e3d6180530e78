//! Domain events emitted after committed writes

mod domain_event;

pub use domain_event::{
    DomainEvent, EntityRegisteredEvent, ReactionChangedEvent, ReactionEvent, TallyRecountedEvent,
};
