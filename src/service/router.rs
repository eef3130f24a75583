//! Namespace router for inbound client messages.
//!
//! The namespace segment of [`Message::event`] (everything before the first
//! `:`) selects an [`EventHandler`]. The handler receives the full original
//! message and branches on the action itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ConnectionId, Message};
use crate::error::{HandlerError, HubError};

/// Per-message context handed to handlers.
#[derive(Debug, Clone, Copy)]
pub struct EventContext {
    /// Connection the message arrived on.
    pub connection_id: ConnectionId,
}

/// Business capability for one event namespace.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles `message`.
    ///
    /// `Ok(Some(reply))` is broadcast to every connection; `Ok(None)` means
    /// there is nothing to send back.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the message cannot be processed.
    /// The error is logged by the caller and never reaches the client.
    async fn handle(
        &self,
        ctx: &EventContext,
        message: Message,
    ) -> Result<Option<Message>, HandlerError>;
}

/// Immutable namespace → handler table, built once at startup.
#[derive(Clone)]
pub struct EventRouter {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRouter {
    /// Starts building a router.
    #[must_use]
    pub fn builder() -> EventRouterBuilder {
        EventRouterBuilder::default()
    }

    /// Dispatches `message` to the handler registered for its namespace.
    ///
    /// A reply whose event differs from the request is re-stamped with the
    /// request's event so correlation by event name holds.
    ///
    /// # Errors
    ///
    /// - [`HubError::HandlerNotFound`] if no handler matches the namespace.
    /// - [`HubError::Handler`] if the handler fails.
    pub async fn route(
        &self,
        ctx: &EventContext,
        message: Message,
    ) -> Result<Option<Message>, HubError> {
        let namespace = message.namespace().to_string();
        let Some(handler) = self.handlers.get(&namespace) else {
            return Err(HubError::HandlerNotFound(namespace));
        };

        let event = message.event.clone();
        let reply = handler
            .handle(ctx, message)
            .await
            .map_err(|source| HubError::Handler {
                namespace: namespace.clone(),
                source,
            })?;

        Ok(reply.map(|mut reply| {
            if reply.event != event {
                tracing::warn!(%namespace, request = %event, reply = %reply.event, "reply event re-stamped to match request");
                reply.event = event;
            }
            reply
        }))
    }

    /// Returns `true` if a handler is registered for `namespace`.
    #[must_use]
    pub fn handles(&self, namespace: &str) -> bool {
        self.handlers.contains_key(namespace)
    }

    /// Returns the registered namespaces, sorted.
    #[must_use]
    pub fn namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("namespaces", &self.namespaces())
            .finish()
    }
}

/// Builder for [`EventRouter`].
#[derive(Default)]
pub struct EventRouterBuilder {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRouterBuilder {
    /// Registers `handler` for `namespace`, replacing any previous one.
    #[must_use]
    pub fn handler(mut self, namespace: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        let namespace = namespace.into();
        if self.handlers.insert(namespace.clone(), handler).is_some() {
            tracing::warn!(%namespace, "event handler replaced");
        }
        self
    }

    /// Freezes the table.
    #[must_use]
    pub fn build(self) -> EventRouter {
        EventRouter {
            handlers: self.handlers,
        }
    }
}

impl fmt::Debug for EventRouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouterBuilder")
            .field("namespaces", &self.handlers.len())
            .finish()
    }
}
