//! Recent-orders bridge
//!
//! Serves cached order-book snapshots over websocket channels and pushes
//! every venue change to the channels subscribed to that instance.

use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recent_orders_bridge::{
    server, AmountNormalizer, AppState, Bridge, BridgeMetrics, ChannelTransport, Config, Handler,
    MemoryVenue,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting recent-orders bridge");

    let config = Arc::new(Config::load()?);
    info!(
        override_instance = ?config.override_instance_key,
        brands = config.brands.len(),
        "Configuration loaded"
    );

    let venue = match &config.venue_fixture {
        Some(path) => MemoryVenue::from_fixture(path).await?,
        None => MemoryVenue::new(),
    };

    let metrics = BridgeMetrics::new()?;
    let transport = Arc::new(ChannelTransport::new(config.channel_buffer));
    let bridge = Arc::new(Bridge::new(
        AmountNormalizer::new(&config.brands),
        Arc::new(venue.clone()),
        Arc::new(venue),
        transport.clone(),
        metrics,
    ));
    let handler = Arc::new(Handler::new(
        bridge.clone(),
        config.override_instance_key.clone(),
    ));

    bridge.start(config.override_instance_key.as_deref());

    let state = Arc::new(AppState {
        bridge: bridge.clone(),
        handler,
        transport,
        config: config.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for channels");

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    bridge.shutdown().await;
    Ok(())
}
