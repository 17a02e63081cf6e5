//! Prometheus counters for fetches, refreshes and pushes

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use crate::error::Result;

/// Bridge metrics, registered on an owned registry
#[derive(Clone)]
pub struct BridgeMetrics {
    registry: Registry,
    pub fetches: IntCounter,
    pub refreshes: IntCounter,
    pub refresh_failures: IntCounter,
    pub pushes: IntCounter,
    pub push_failures: IntCounter,
    pub open_channels: IntGauge,
}

impl BridgeMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let fetches = IntCounter::new("bridge_fetches_total", "Order book queries sent upstream")?;
        let refreshes = IntCounter::new("bridge_refreshes_total", "Snapshots installed after a change")?;
        let refresh_failures = IntCounter::new(
            "bridge_refresh_failures_total",
            "Refresh loops halted by a failed refetch",
        )?;
        let pushes = IntCounter::new("bridge_pushes_total", "Notifications pushed to the transport")?;
        let push_failures =
            IntCounter::new("bridge_push_failures_total", "Notifications the transport rejected")?;
        let open_channels = IntGauge::new("bridge_open_channels", "Currently open channels")?;

        registry.register(Box::new(fetches.clone()))?;
        registry.register(Box::new(refreshes.clone()))?;
        registry.register(Box::new(refresh_failures.clone()))?;
        registry.register(Box::new(pushes.clone()))?;
        registry.register(Box::new(push_failures.clone()))?;
        registry.register(Box::new(open_channels.clone()))?;

        Ok(Self {
            registry,
            fetches,
            refreshes,
            refresh_failures,
            pushes,
            push_failures,
            open_channels,
        })
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::BridgeError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        let metrics = BridgeMetrics::new().unwrap();
        metrics.pushes.inc();
        let text = metrics.render().unwrap();
        assert!(text.contains("bridge_pushes_total 1"));
        assert!(text.contains("bridge_open_channels 0"));
    }
}
