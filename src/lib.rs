//! Recent-orders bridge
//!
//! Keeps a cached order-book snapshot per trading instance, refreshed every
//! time the venue reports a change, and fans each refresh out to the
//! channels subscribed to that instance.

use std::sync::Arc;

pub mod amount;
pub mod book;
pub mod bridge;
pub mod config;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod subscriber;
pub mod venue;

pub use amount::{Amount, AmountNormalizer};
pub use book::{BookView, Order, Snapshot, SnapshotCache};
pub use bridge::Bridge;
pub use config::Config;
pub use error::{BridgeError, Result};
pub use metrics::BridgeMetrics;
pub use protocol::{Handler, Request, Response, SubscribeStatus};
pub use subscriber::{ChannelHandle, ChannelTransport, SubscriberRegistry, Transport};
pub use venue::{ChangeSignal, MemoryVenue};

/// Application state shared across components
pub struct AppState {
    pub bridge: Arc<Bridge>,
    pub handler: Arc<Handler>,
    pub transport: Arc<ChannelTransport>,
    pub config: Arc<Config>,
}
