//! Redis pub/sub backend.
//!
//! The report write path publishes on Redis channels such as
//! `disaster:create_report`. Each [`RedisBus::subscribe`] call opens its
//! own pubsub connection, issues `SUBSCRIBE` for every channel and turns
//! pushed messages into [`BusMessage`]s.

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::domain::{BusMessage, BusStream, MessageBus};
use crate::error::BusError;

/// [`MessageBus`] backed by a Redis server.
#[derive(Debug, Clone)]
pub struct RedisBus {
    client: redis::Client,
}

impl RedisBus {
    /// Creates a bus for the server at `url` (e.g. `redis://127.0.0.1:6379`).
    ///
    /// No connection is made until the first subscription.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Subscribe`] if `url` is not a valid Redis URL.
    pub fn open(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(subscribe_error)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn subscribe(&self, channels: &[String]) -> Result<BusStream, BusError> {
        if channels.is_empty() {
            return Err(BusError::NoChannels);
        }

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(subscribe_error)?;
        for channel in channels {
            pubsub
                .subscribe(channel.as_str())
                .await
                .map_err(subscribe_error)?;
        }
        tracing::info!(?channels, "subscribed to redis channels");

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let channel = msg.get_channel_name().to_string();
            match msg.get_payload::<String>() {
                Ok(payload) => Some(BusMessage { channel, payload }),
                Err(err) => {
                    tracing::warn!(%channel, error = %err, "non-text redis payload skipped");
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}

fn subscribe_error(err: redis::RedisError) -> BusError {
    BusError::Subscribe(err.to_string())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            RedisBus::open("not a redis url"),
            Err(BusError::Subscribe(_))
        ));
    }

    #[tokio::test]
    async fn empty_channel_list_is_rejected_before_connecting() {
        let Ok(bus) = RedisBus::open("redis://127.0.0.1:1") else {
            panic!("url should parse");
        };
        assert!(matches!(bus.subscribe(&[]).await, Err(BusError::NoChannels)));
    }

    #[tokio::test]
    async fn unreachable_server_fails_subscription() {
        let Ok(bus) = RedisBus::open("redis://127.0.0.1:1") else {
            panic!("url should parse");
        };
        let result = bus.subscribe(&["disaster:create_report".to_string()]).await;
        assert!(matches!(result, Err(BusError::Subscribe(_))));
    }
}
