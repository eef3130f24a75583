//! Connection registry and broadcast fan-out.
//!
//! [`Hub`] is the single owner of the membership set. It runs as one task
//! and consumes [`HubCommand`]s from a bounded intake queue, one at a time
//! and in arrival order, so the set needs no lock. Everything else talks to
//! it through a cloneable [`HubHandle`].
//!
//! # Backpressure
//!
//! Fan-out uses `try_send` on each connection's outbound queue. A full
//! queue loses that one message for that one connection (logged); a closed
//! queue means its writer is gone and the member is evicted. The loop never
//! waits on a client.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{ConnectionId, Message};
use crate::error::HubError;

/// Intake events processed by the hub loop.
#[derive(Debug)]
pub enum HubCommand {
    /// Add a connection and its outbound queue to the set.
    Register {
        /// Connection identity.
        id: ConnectionId,
        /// Sending half of the connection's outbound queue.
        outbound: mpsc::Sender<Message>,
    },
    /// Remove a connection if present.
    Unregister(ConnectionId),
    /// Enqueue a message on every registered connection.
    Broadcast(Message),
    /// Report the current number of registered connections.
    ConnectionCount(oneshot::Sender<usize>),
}

/// The registry actor. Owns the membership set.
#[derive(Debug)]
pub struct Hub {
    connections: HashMap<ConnectionId, mpsc::Sender<Message>>,
    intake: mpsc::Receiver<HubCommand>,
}

impl Hub {
    /// Creates a hub and the handle used to reach it.
    ///
    /// `intake_capacity` bounds the number of pending commands.
    #[must_use]
    pub fn new(intake_capacity: usize) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(intake_capacity.max(1));
        let hub = Self {
            connections: HashMap::new(),
            intake: rx,
        };
        (hub, HubHandle { intake: tx })
    }

    /// Creates a hub and runs it on the current tokio runtime.
    #[must_use]
    pub fn spawn(intake_capacity: usize) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(intake_capacity);
        (handle, tokio::spawn(hub.run()))
    }

    /// Processes intake until every [`HubHandle`] has been dropped.
    pub async fn run(mut self) {
        tracing::info!("hub started");
        while let Some(command) = self.intake.recv().await {
            self.apply(command);
        }
        tracing::info!(connections = self.connections.len(), "hub stopped");
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { id, outbound } => {
                self.connections.insert(id, outbound);
                tracing::info!(connection_id = %id, connections = self.connections.len(), "client connected");
            }
            HubCommand::Unregister(id) => {
                if self.connections.remove(&id).is_some() {
                    tracing::info!(connection_id = %id, connections = self.connections.len(), "client disconnected");
                } else {
                    tracing::debug!(connection_id = %id, "unregister for unknown connection ignored");
                }
            }
            HubCommand::Broadcast(message) => self.broadcast(&message),
            HubCommand::ConnectionCount(reply) => {
                let _ = reply.send(self.connections.len());
            }
        }
    }

    fn broadcast(&mut self, message: &Message) {
        let mut stale = Vec::new();
        let mut delivered = 0usize;

        for (id, outbound) in &self.connections {
            match outbound.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(connection_id = %id, event = %message.event, "outbound queue full; message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => stale.push(*id),
            }
        }

        for id in stale {
            self.connections.remove(&id);
            tracing::info!(connection_id = %id, connections = self.connections.len(), "evicted closed connection");
        }

        tracing::debug!(event = %message.event, delivered, "broadcast");
    }
}

/// Cloneable handle for submitting intake to the [`Hub`].
#[derive(Debug, Clone)]
pub struct HubHandle {
    intake: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Registers a connection with its outbound queue.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn register(
        &self,
        id: ConnectionId,
        outbound: mpsc::Sender<Message>,
    ) -> Result<(), HubError> {
        self.submit(HubCommand::Register { id, outbound }).await
    }

    /// Unregisters a connection. Unknown ids are ignored by the hub.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.submit(HubCommand::Unregister(id)).await
    }

    /// Fans `message` out to every connection registered when the hub
    /// processes it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn broadcast(&self, message: Message) -> Result<(), HubError> {
        self.submit(HubCommand::Broadcast(message)).await
    }

    /// Returns the number of registered connections.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::HubClosed`] if the hub loop has stopped.
    pub async fn connection_count(&self) -> Result<usize, HubError> {
        let (tx, rx) = oneshot::channel();
        self.submit(HubCommand::ConnectionCount(tx)).await?;
        rx.await.map_err(|_| HubError::HubClosed)
    }

    async fn submit(&self, command: HubCommand) -> Result<(), HubError> {
        self.intake
            .send(command)
            .await
            .map_err(|_| HubError::HubClosed)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Payload;

    fn message(event: &str) -> Message {
        Message::new(event, Payload::from_raw(r#"{"n":1}"#))
    }

    async fn connect(handle: &HubHandle, capacity: usize) -> (ConnectionId, mpsc::Receiver<Message>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(capacity);
        tokio_test::assert_ok!(handle.register(id, tx).await);
        (id, rx)
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let (handle, _task) = Hub::spawn(16);
        let (_a, mut rx_a) = connect(&handle, 8).await;
        let (_b, mut rx_b) = connect(&handle, 8).await;

        tokio_test::assert_ok!(handle.broadcast(message("disaster:save_location")).await);

        assert_eq!(rx_a.recv().await, Some(message("disaster:save_location")));
        assert_eq!(rx_b.recv().await, Some(message("disaster:save_location")));
    }

    #[tokio::test]
    async fn broadcast_preserves_order_per_connection() {
        let (handle, _task) = Hub::spawn(16);
        let (_id, mut rx) = connect(&handle, 8).await;

        tokio_test::assert_ok!(handle.broadcast(message("a:first")).await);
        tokio_test::assert_ok!(handle.broadcast(message("a:second")).await);

        assert_eq!(rx.recv().await.map(|m| m.event), Some("a:first".to_string()));
        assert_eq!(rx.recv().await.map(|m| m.event), Some("a:second".to_string()));
    }

    #[tokio::test]
    async fn unregister_unknown_is_noop() {
        let (handle, _task) = Hub::spawn(16);
        let (_id, _rx) = connect(&handle, 8).await;

        tokio_test::assert_ok!(handle.unregister(ConnectionId::new()).await);
        assert_eq!(handle.connection_count().await.ok(), Some(1));
    }

    #[tokio::test]
    async fn unregister_twice_is_noop() {
        let (handle, _task) = Hub::spawn(16);
        let (id, _rx) = connect(&handle, 8).await;

        tokio_test::assert_ok!(handle.unregister(id).await);
        tokio_test::assert_ok!(handle.unregister(id).await);
        assert_eq!(handle.connection_count().await.ok(), Some(0));
    }

    #[tokio::test]
    async fn unregister_closes_outbound_queue() {
        let (handle, _task) = Hub::spawn(16);
        let (id, mut rx) = connect(&handle, 8).await;

        tokio_test::assert_ok!(handle.unregister(id).await);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn unregistered_connection_misses_later_broadcasts() {
        let (handle, _task) = Hub::spawn(16);
        let (gone, mut rx_gone) = connect(&handle, 8).await;
        let (_kept, mut rx_kept) = connect(&handle, 8).await;

        tokio_test::assert_ok!(handle.unregister(gone).await);
        tokio_test::assert_ok!(handle.broadcast(message("a:b")).await);

        assert_eq!(rx_kept.recv().await, Some(message("a:b")));
        assert_eq!(rx_gone.recv().await, None);
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking_others() {
        let (handle, _task) = Hub::spawn(16);
        let (_slow, mut rx_slow) = connect(&handle, 1).await;
        let (_fast, mut rx_fast) = connect(&handle, 8).await;

        tokio_test::assert_ok!(handle.broadcast(message("a:one")).await);
        tokio_test::assert_ok!(handle.broadcast(message("a:two")).await);

        assert_eq!(rx_fast.recv().await.map(|m| m.event), Some("a:one".to_string()));
        assert_eq!(rx_fast.recv().await.map(|m| m.event), Some("a:two".to_string()));
        assert_eq!(rx_slow.recv().await.map(|m| m.event), Some("a:one".to_string()));
        assert!(rx_slow.try_recv().is_err());
        assert_eq!(handle.connection_count().await.ok(), Some(2));
    }

    #[tokio::test]
    async fn closed_queue_is_evicted_on_broadcast() {
        let (handle, _task) = Hub::spawn(16);
        let (_id, rx) = connect(&handle, 8).await;
        drop(rx);

        tokio_test::assert_ok!(handle.broadcast(message("a:b")).await);
        assert_eq!(handle.connection_count().await.ok(), Some(0));
    }

    #[tokio::test]
    async fn run_ends_when_handles_dropped() {
        let (handle, task) = Hub::spawn(4);
        drop(handle);
        tokio_test::assert_ok!(task.await);
    }

    #[tokio::test]
    async fn handle_reports_closed_hub() {
        let (hub, handle) = Hub::new(4);
        drop(hub);
        assert!(matches!(
            handle.broadcast(message("a:b")).await,
            Err(HubError::HubClosed)
        ));
        assert!(matches!(handle.connection_count().await, Err(HubError::HubClosed)));
    }
}
