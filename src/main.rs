//! resqlink-hub server entry point.
//!
//! Starts the hub loop, the bus bridge and the Axum HTTP server with the
//! WebSocket endpoint.

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use resqlink_hub::api;
use resqlink_hub::app_state::AppState;
use resqlink_hub::config::HubConfig;
use resqlink_hub::domain::{Hub, LocalBus, MessageBus};
use resqlink_hub::pubsub::RedisBus;
use resqlink_hub::service::disaster::{self, DisasterSocketHandler, InMemoryDisasterRepository};
use resqlink_hub::service::{EventRouter, PubSubBridge};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = HubConfig::from_env().context("invalid LISTEN_ADDR")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting resqlink-hub");

    // Registry
    let (hub, _hub_task) = Hub::spawn(config.intake_capacity);

    // Namespace handlers
    let repository = Arc::new(InMemoryDisasterRepository::new());
    let router = EventRouter::builder()
        .handler(
            disaster::NAMESPACE,
            Arc::new(DisasterSocketHandler::new(repository)),
        )
        .build();

    // Bus relay. Without Redis, the in-process bus is kept alive until
    // shutdown so the bridge's subscription stays open.
    let local_bus = LocalBus::new(config.bus_capacity);
    let bus: Arc<dyn MessageBus> = match config.redis_url.as_deref() {
        Some(url) => {
            tracing::info!("relaying from redis");
            Arc::new(RedisBus::open(url).context("invalid REDIS_URL")?)
        }
        None => {
            tracing::info!("REDIS_URL not set; relaying from in-process bus");
            Arc::new(local_bus.clone())
        }
    };
    let bridge = PubSubBridge::new(bus, hub.clone(), config.bridge_channels.clone());
    tokio::spawn(async move {
        if let Err(err) = bridge.run().await {
            tracing::error!(error = %err, "bridge stopped");
        }
    });

    // Build application
    let app = api::build_app(AppState {
        hub,
        router: Arc::new(router),
        outbound_capacity: config.outbound_capacity,
    });

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    tokio::select! {
        served = axum::serve(listener, app).into_future() => served.context("server error")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown signal received"),
    }

    drop(local_bus);
    Ok(())
}
