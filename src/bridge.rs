//! Bridge context
//!
//! Owns the resolver, cache, registry and fanout for one process, wired
//! together once at startup.

use std::sync::Arc;

use tracing::error;

use crate::amount::AmountNormalizer;
use crate::book::{InstanceResolver, SnapshotCache, SnapshotFetcher};
use crate::error::Result;
use crate::metrics::BridgeMetrics;
use crate::subscriber::{ChannelHandle, FanoutDispatcher, SubscriberRegistry, Transport};
use crate::venue::{Registrar, Venue};

/// All shared state of a running bridge
pub struct Bridge {
    registry: Arc<SubscriberRegistry>,
    cache: Arc<SnapshotCache>,
    metrics: BridgeMetrics,
}

impl Bridge {
    pub fn new(
        normalizer: AmountNormalizer,
        registrar: Arc<dyn Registrar>,
        venue: Arc<dyn Venue>,
        transport: Arc<dyn Transport>,
        metrics: BridgeMetrics,
    ) -> Self {
        let resolver = Arc::new(InstanceResolver::new(registrar, venue));
        let fetcher = Arc::new(SnapshotFetcher::new(
            resolver,
            Arc::new(normalizer),
            metrics.clone(),
        ));
        let registry = Arc::new(SubscriberRegistry::new());
        let fanout = Arc::new(FanoutDispatcher::new(
            registry.clone(),
            transport,
            metrics.clone(),
        ));
        let cache = SnapshotCache::new(fetcher, fanout, metrics.clone());

        Self {
            registry,
            cache,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.metrics
    }

    /// Subscribe `channel` to `key`
    ///
    /// Returns `false` when the channel already followed `key`. Loading is
    /// left to [`Bridge::watch`] so the caller can acknowledge first.
    pub async fn subscribe(&self, channel: ChannelHandle, key: &str) -> Result<bool> {
        self.registry.subscribe(channel, key).await
    }

    /// Start loading and watching `key` without waiting for it
    pub async fn watch(&self, key: &str) {
        self.cache.trigger(key).await;
    }

    /// Start watching the override instance eagerly, if one is configured
    pub fn start(&self, override_key: Option<&str>) {
        let Some(key) = override_key else {
            return;
        };
        let cache = self.cache.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            if let Err(e) = cache.ensure_subscription(&key).await {
                error!(instance = %key, error = %e, "cannot subscribe to instance");
            }
        });
    }

    pub async fn shutdown(&self) {
        self.cache.shutdown().await;
    }
}
