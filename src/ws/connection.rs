//! Per-connection read and write duties.
//!
//! Each accepted socket gets its own bounded outbound queue and two
//! concurrently running duties:
//!
//! - **read**: decode inbound frames, route them, broadcast any reply to
//!   every connection. Malformed payloads are skipped; transport failure
//!   or close ends the connection.
//! - **write**: drain the outbound queue in order onto the socket. A
//!   message that fails to serialize is skipped; a failed send unregisters
//!   the connection; a closed queue ends the duty.
//!
//! The duties stop together: whichever ends first takes the connection
//! down. They are generic over [`Stream`]/[`Sink`] of frames so they can be
//! driven without a live socket.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{Message as Frame, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::domain::{ConnectionId, HubHandle, Message};
use crate::error::HubError;
use crate::service::{EventContext, EventRouter};

/// Runs a connection from registration to teardown.
pub async fn run_connection(
    socket: WebSocket,
    hub: HubHandle,
    router: Arc<EventRouter>,
    outbound_capacity: usize,
) {
    let id = ConnectionId::new();
    let (outbound_tx, outbound_rx) = mpsc::channel(outbound_capacity.max(1));
    if let Err(err) = hub.register(id, outbound_tx).await {
        tracing::warn!(connection_id = %id, error = %err, "could not register connection");
        return;
    }

    let (sink, stream) = socket.split();
    serve_connection(id, sink, stream, outbound_rx, &hub, &router).await;
    tracing::debug!(connection_id = %id, "ws connection closed");
}

/// Runs both duties of a registered connection until either one ends.
///
/// The connection is unregistered on the way out, whichever duty stopped
/// first.
pub async fn serve_connection<Si, St, E>(
    id: ConnectionId,
    sink: Si,
    stream: St,
    outbound: mpsc::Receiver<Message>,
    hub: &HubHandle,
    router: &EventRouter,
) where
    Si: Sink<Frame> + Unpin + Send + 'static,
    Si::Error: Display + Send,
    St: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let mut writer = tokio::spawn(write_pump(id, sink, outbound, hub.clone()));

    let writer_finished = tokio::select! {
        () = read_pump(id, stream, hub, router) => false,
        joined = &mut writer => {
            if let Err(err) = joined {
                tracing::warn!(connection_id = %id, error = %err, "write duty panicked");
            }
            tracing::debug!(connection_id = %id, "write duty ended; stopping read duty");
            true
        }
    };

    // Unregistering drops the hub's sender, which closes the queue and
    // lets the writer close the socket.
    if let Err(err) = hub.unregister(id).await {
        tracing::debug!(connection_id = %id, error = %err, "unregister after hub shutdown");
    }
    if writer_finished {
        return;
    }
    if let Err(err) = writer.await {
        tracing::warn!(connection_id = %id, error = %err, "write duty panicked");
    }
}

/// Reads frames until the client closes or the transport fails.
pub async fn read_pump<S, E>(id: ConnectionId, mut stream: S, hub: &HubHandle, router: &EventRouter)
where
    S: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let ctx = EventContext { connection_id: id };

    while let Some(frame) = stream.next().await {
        let decoded = match frame {
            Ok(Frame::Text(text)) => serde_json::from_str::<Message>(text.as_str()),
            Ok(Frame::Binary(bytes)) => serde_json::from_slice::<Message>(&bytes),
            Ok(Frame::Ping(_) | Frame::Pong(_)) => continue,
            Ok(Frame::Close(_)) => {
                tracing::debug!(connection_id = %id, "client sent close");
                break;
            }
            Err(err) => {
                tracing::warn!(connection_id = %id, error = %err, "ws read failed");
                break;
            }
        };

        let message = match decoded {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(connection_id = %id, error = %err, "malformed message ignored");
                continue;
            }
        };

        if dispatch(&ctx, message, hub, router).await.is_err() {
            tracing::info!(connection_id = %id, "hub closed; dropping connection");
            break;
        }
    }
}

/// Routes one message and broadcasts the reply. Fails only if the hub is gone.
async fn dispatch(
    ctx: &EventContext,
    message: Message,
    hub: &HubHandle,
    router: &EventRouter,
) -> Result<(), HubError> {
    let event = message.event.clone();
    match router.route(ctx, message).await {
        Ok(Some(reply)) => hub.broadcast(reply).await,
        Ok(None) => Ok(()),
        Err(HubError::HandlerNotFound(namespace)) => {
            tracing::warn!(connection_id = %ctx.connection_id, %event, %namespace, "handler not found");
            Ok(())
        }
        Err(err) => {
            tracing::error!(connection_id = %ctx.connection_id, %event, error = %err, "event handling failed");
            Ok(())
        }
    }
}

/// Writes queued messages to the socket in enqueue order.
pub async fn write_pump<S>(
    id: ConnectionId,
    mut sink: S,
    mut outbound: mpsc::Receiver<Message>,
    hub: HubHandle,
) where
    S: Sink<Frame> + Unpin,
    S::Error: Display,
{
    while let Some(message) = outbound.recv().await {
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(connection_id = %id, event = %message.event, error = %err, "failed to serialize outbound message");
                continue;
            }
        };

        if let Err(err) = sink.send(Frame::text(json)).await {
            tracing::warn!(connection_id = %id, error = %err, "ws write failed");
            if let Err(err) = hub.unregister(id).await {
                tracing::debug!(connection_id = %id, error = %err, "unregister after hub shutdown");
            }
            return;
        }
    }

    if let Err(err) = sink.close().await {
        tracing::debug!(connection_id = %id, error = %err, "ws close failed");
    }
}
