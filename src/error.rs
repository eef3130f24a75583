//! Hub error types.
//!
//! Nothing in this crate reports an error back over a socket. Every
//! variant here ends up in a log line, except transport failures, which
//! tear down the affected connection.
//!
//! | Type             | Raised by                    | Outcome                          |
//! |------------------|------------------------------|----------------------------------|
//! | [`HubError`]     | hub handle, event router     | logged; message dropped          |
//! | [`HandlerError`] | namespace handlers           | logged; no reply broadcast       |
//! | [`BusError`]     | backing message bus          | logged; bridge stops relaying    |

/// Errors surfaced by the hub, the event router and the bridge.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The hub processing loop has stopped and no longer accepts intake.
    #[error("hub is closed")]
    HubClosed,

    /// No handler is registered for the event's namespace segment.
    #[error("handler not found for namespace: {0}")]
    HandlerNotFound(String),

    /// The namespace handler rejected the message.
    #[error("handler for namespace {namespace} failed: {source}")]
    Handler {
        /// Namespace the message was routed to.
        namespace: String,
        /// Underlying handler failure.
        #[source]
        source: HandlerError,
    },

    /// The backing message bus failed.
    #[error("message bus error: {0}")]
    Bus(#[from] BusError),
}

/// Errors returned by an [`crate::service::EventHandler`].
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The message payload did not match the shape the event expects.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The namespace is known but the action is not.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The business operation was refused.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Errors returned by a [`crate::domain::MessageBus`].
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// A subscription was requested without any channel names.
    #[error("no channels to subscribe to")]
    NoChannels,

    /// The bus refused or failed the subscription.
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}
