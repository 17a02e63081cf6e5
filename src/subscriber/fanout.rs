//! Fanout dispatcher
//!
//! Builds one notification per refreshed snapshot and hands it to the
//! transport addressed to every channel subscribed at that moment.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ChannelHandle, SubscriberRegistry};
use crate::book::Snapshot;
use crate::error::Result;
use crate::metrics::BridgeMetrics;
use crate::protocol::Response;

/// Outbound push to a set of channels
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &serde_json::Value, channels: &[ChannelHandle]) -> Result<()>;
}

/// Pushes snapshots to subscribed channels
pub struct FanoutDispatcher {
    registry: Arc<SubscriberRegistry>,
    transport: Arc<dyn Transport>,
    metrics: BridgeMetrics,
}

impl FanoutDispatcher {
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        transport: Arc<dyn Transport>,
        metrics: BridgeMetrics,
    ) -> Self {
        Self {
            registry,
            transport,
            metrics,
        }
    }

    /// Push `snapshot` to every channel subscribed to `key`
    ///
    /// Transport failures are logged and dropped.
    pub async fn notify(&self, key: &str, snapshot: &Snapshot) {
        let channels = self.registry.subscribers(key).await;
        if channels.is_empty() {
            return;
        }

        let payload = match serde_json::to_value(Response::RecentOrders(snapshot.view())) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(instance = %key, error = %e, "Failed to serialize recent orders");
                return;
            }
        };

        match self.transport.send(&payload, &channels).await {
            Ok(()) => {
                self.metrics.pushes.inc();
                debug!(instance = %key, channels = channels.len(), "Pushed recent orders");
            }
            Err(e) => {
                self.metrics.push_failures.inc();
                warn!(instance = %key, error = %e, "cannot send recent orders");
            }
        }
    }
}
