//! Relay from the backing message bus into the hub.
//!
//! Every bus message becomes a [`Message`] whose event is the channel name
//! and whose data is the bus payload, unchanged and unvalidated. The bridge
//! does no deduplication, reordering or validation.

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;

use crate::domain::{BusMessage, HubHandle, Message, MessageBus, Payload};
use crate::error::HubError;

/// Relays a fixed set of bus channels to every connected client.
pub struct PubSubBridge {
    bus: Arc<dyn MessageBus>,
    hub: HubHandle,
    channels: Vec<String>,
}

impl PubSubBridge {
    /// Creates a bridge over `bus` for the given channels.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, hub: HubHandle, channels: Vec<String>) -> Self {
        Self { bus, hub, channels }
    }

    /// Subscribes and relays until the bus stream ends or the hub closes.
    ///
    /// There is no resubscription: once this returns, live relay is off
    /// while the hub and its connections keep running.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Bus`] if the initial subscription fails.
    pub async fn run(self) -> Result<(), HubError> {
        let Self { bus, hub, channels } = self;
        let subscribed = bus.subscribe(&channels).await;
        // The stream must be able to observe the bus going away.
        drop(bus);

        let mut stream = match subscribed {
            Ok(stream) => stream,
            Err(err) => {
                tracing::error!(error = %err, ?channels, "bus subscription failed; relay disabled");
                return Err(err.into());
            }
        };
        tracing::info!(?channels, "bridge subscribed");

        while let Some(bus_message) = stream.next().await {
            tracing::debug!(channel = %bus_message.channel, "relaying bus message");
            if let Err(err) = hub.broadcast(relay_message(bus_message)).await {
                tracing::info!(error = %err, "hub closed; bridge stopping");
                return Ok(());
            }
        }

        tracing::warn!(?channels, "bus subscription ended");
        Ok(())
    }
}

impl fmt::Debug for PubSubBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubSubBridge")
            .field("bus", &self.bus)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

fn relay_message(bus_message: BusMessage) -> Message {
    Message::new(bus_message.channel, Payload::from_raw(bus_message.payload))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::{ConnectionId, Hub, LocalBus};

    async fn wait_for_subscriber(bus: &LocalBus) {
        for _ in 0..100 {
            if bus.subscriber_count() > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("bridge never subscribed");
    }

    #[tokio::test]
    async fn relays_payload_unchanged_to_every_connection() {
        let (hub, _hub_task) = Hub::spawn(16);
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        tokio_test::assert_ok!(hub.register(ConnectionId::new(), tx_a).await);
        tokio_test::assert_ok!(hub.register(ConnectionId::new(), tx_b).await);

        let bus = LocalBus::new(16);
        let bridge = PubSubBridge::new(
            Arc::new(bus.clone()),
            hub.clone(),
            vec!["disaster:create_report".to_string()],
        );
        tokio::spawn(bridge.run());
        wait_for_subscriber(&bus).await;

        let payload = r#"{"userId":"u-1","rawSituation":"flooding","photoUrls":[]}"#;
        bus.publish("disaster:create_report", payload);

        for rx in [&mut rx_a, &mut rx_b] {
            let Some(message) = rx.recv().await else {
                panic!("connection missed the relay");
            };
            assert_eq!(message.event, "disaster:create_report");
            assert_eq!(message.data.as_str(), payload);
        }
    }

    #[tokio::test]
    async fn subscribe_failure_returns_error() {
        let (hub, _hub_task) = Hub::spawn(4);
        let bridge = PubSubBridge::new(Arc::new(LocalBus::new(4)), hub, Vec::new());
        assert!(matches!(bridge.run().await, Err(HubError::Bus(_))));
    }

    #[tokio::test]
    async fn stops_when_bus_goes_away() {
        let (hub, _hub_task) = Hub::spawn(4);
        let bus = LocalBus::new(4);
        let bridge = PubSubBridge::new(Arc::new(bus.clone()), hub, vec!["a".to_string()]);
        let task = tokio::spawn(bridge.run());
        wait_for_subscriber(&bus).await;
        drop(bus);

        let Ok(Ok(result)) = tokio::time::timeout(Duration::from_secs(1), task).await else {
            panic!("bridge did not stop");
        };
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn stops_when_hub_closes() {
        let (hub_actor, hub) = Hub::new(4);
        drop(hub_actor);
        let bus = LocalBus::new(4);
        let bridge = PubSubBridge::new(Arc::new(bus.clone()), hub, vec!["a".to_string()]);
        let task = tokio::spawn(bridge.run());
        wait_for_subscriber(&bus).await;
        bus.publish("a", "1");

        let Ok(Ok(result)) = tokio::time::timeout(Duration::from_secs(1), task).await else {
            panic!("bridge did not stop");
        };
        assert!(result.is_ok());
    }
}
