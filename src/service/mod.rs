//! Service layer: event routing, bus relay and namespace handlers.

pub mod bridge;
pub mod disaster;
pub mod router;

pub use bridge::PubSubBridge;
pub use disaster::{DisasterRepository, DisasterSocketHandler, InMemoryDisasterRepository};
pub use router::{EventContext, EventHandler, EventRouter, EventRouterBuilder};
