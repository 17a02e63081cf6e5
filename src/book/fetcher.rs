//! Snapshot fetcher
//!
//! One round trip to an instance's order-book query, normalized.

use std::sync::Arc;

use tracing::debug;

use super::{InstanceResolver, Order, Snapshot};
use crate::amount::AmountNormalizer;
use crate::error::Result;
use crate::metrics::BridgeMetrics;
use crate::venue::RawOrder;

/// Fetches and normalizes order books
pub struct SnapshotFetcher {
    resolver: Arc<InstanceResolver>,
    normalizer: Arc<AmountNormalizer>,
    metrics: BridgeMetrics,
}

impl SnapshotFetcher {
    pub fn new(
        resolver: Arc<InstanceResolver>,
        normalizer: Arc<AmountNormalizer>,
        metrics: BridgeMetrics,
    ) -> Self {
        Self {
            resolver,
            normalizer,
            metrics,
        }
    }

    /// Query the order book of `key` and normalize it
    pub async fn fetch(&self, key: &str) -> Result<Snapshot> {
        let instance = self.resolver.resolve(key).await?;
        self.metrics.fetches.inc();
        let raw = instance.public_api.get_book_orders().await?;

        debug!(
            instance = %key,
            buy = raw.buy.len(),
            sell = raw.sell.len(),
            "Fetched order book"
        );

        Ok(Snapshot {
            buy: self.normalize_orders(&raw.buy),
            sell: self.normalize_orders(&raw.sell),
            changed: raw.changed,
        })
    }

    fn normalize_orders(&self, orders: &[RawOrder]) -> Vec<Order> {
        orders
            .iter()
            .map(|order| Order {
                public_id: order.public_id.clone(),
                asset: self.normalizer.normalize(&order.asset),
                price: self.normalizer.normalize(&order.price),
            })
            .collect()
    }
}
