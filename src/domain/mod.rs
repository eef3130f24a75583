//! Domain layer: wire envelope, connection identity, hub and bus.
//!
//! This module holds the state the hub subsystem is built around: the
//! [`Message`] envelope, the [`Hub`] actor that owns the set of live
//! connections, and the [`MessageBus`] seam relayed into it.

pub mod connection_id;
pub mod event_bus;
pub mod hub;
pub mod message;

pub use connection_id::ConnectionId;
pub use event_bus::{BusMessage, BusStream, LocalBus, MessageBus};
pub use hub::{Hub, HubCommand, HubHandle};
pub use message::{Message, Payload};
