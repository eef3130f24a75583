//! Backing publish/subscribe bus.
//!
//! Domain code outside the hub (report creation, location updates)
//! publishes pre-serialized payloads on named channels. The hub only ever
//! consumes them through the [`MessageBus`] seam, which the bridge receives
//! as an explicit dependency.
//!
//! [`LocalBus`] is the in-process implementation. It wraps a
//! [`tokio::sync::broadcast`] channel; each subscription filters it down to
//! the requested channel names.

use std::collections::HashSet;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::sync::broadcast;

use crate::error::BusError;

/// One message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Channel the message was published on.
    pub channel: String,
    /// Payload exactly as published.
    pub payload: String,
}

/// Stream of messages for one subscription. Ends when the bus goes away.
pub type BusStream = BoxStream<'static, BusMessage>;

/// A publish/subscribe backend the hub can relay from.
#[async_trait]
pub trait MessageBus: Send + Sync + std::fmt::Debug {
    /// Subscribes to every channel in `channels`.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] if the subscription cannot be established.
    async fn subscribe(&self, channels: &[String]) -> Result<BusStream, BusError>;
}

/// In-process bus backed by a `tokio::broadcast` channel.
///
/// When the ring buffer is full the oldest messages are dropped for
/// lagging subscribers, which log the gap and keep going.
#[derive(Debug, Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<BusMessage>,
}

impl LocalBus {
    /// Creates a new `LocalBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes `payload` on `channel`.
    ///
    /// Returns the number of live subscriptions the message was handed to,
    /// regardless of their channel filter. Zero means it was dropped.
    pub fn publish(&self, channel: impl Into<String>, payload: impl Into<String>) -> usize {
        self.sender
            .send(BusMessage {
                channel: channel.into(),
                payload: payload.into(),
            })
            .unwrap_or(0)
    }

    /// Returns the current number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn subscribe(&self, channels: &[String]) -> Result<BusStream, BusError> {
        if channels.is_empty() {
            return Err(BusError::NoChannels);
        }
        let wanted: HashSet<String> = channels.iter().cloned().collect();
        let receiver = self.sender.subscribe();

        let stream = stream::unfold((receiver, wanted), |(mut receiver, wanted)| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) if wanted.contains(&message.channel) => {
                        return Some((message, (receiver, wanted)));
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "bus subscription lagged; messages lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn channels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn publish_without_subscribers_returns_zero() {
        let bus = LocalBus::new(16);
        assert_eq!(bus.publish("disaster:create_report", "{}"), 0);
    }

    #[tokio::test]
    async fn subscribe_without_channels_fails() {
        let bus = LocalBus::new(16);
        let result = bus.subscribe(&[]).await;
        assert!(matches!(result, Err(BusError::NoChannels)));
    }

    #[tokio::test]
    async fn subscriber_receives_only_its_channels() {
        let bus = LocalBus::new(16);
        let Ok(mut sub) = bus.subscribe(&channels(&["disaster:create_report"])).await else {
            panic!("subscribe failed");
        };

        bus.publish("user:signed_in", r#"{"ignored":true}"#);
        bus.publish("disaster:create_report", r#"{"userId":"u-1"}"#);

        let Some(message) = sub.next().await else {
            panic!("stream ended early");
        };
        assert_eq!(message.channel, "disaster:create_report");
        assert_eq!(message.payload, r#"{"userId":"u-1"}"#);
    }

    #[tokio::test]
    async fn stream_ends_when_bus_dropped() {
        let bus = LocalBus::new(16);
        let Ok(mut sub) = bus.subscribe(&channels(&["a"])).await else {
            panic!("subscribe failed");
        };
        drop(bus);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_gap() {
        let bus = LocalBus::new(2);
        let Ok(mut sub) = bus.subscribe(&channels(&["a"])).await else {
            panic!("subscribe failed");
        };
        for i in 0..5 {
            bus.publish("a", i.to_string());
        }
        let Some(first) = sub.next().await else {
            panic!("stream ended early");
        };
        assert_eq!(first.payload, "3");
    }

    #[test]
    fn subscriber_count_tracks_streams() {
        let bus = LocalBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        let Ok(sub) = tokio_test::block_on(bus.subscribe(&channels(&["a"]))) else {
            panic!("subscribe failed");
        };
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
