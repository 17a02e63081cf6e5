//! Snapshot cache and refresh loops
//!
//! Keeps the latest snapshot per instance. The first demand for an instance
//! starts a single-flight initial load; later and concurrent callers await
//! that same load. Once loaded, a background task per instance waits for the
//! venue's change signal, refetches, installs the new snapshot and fans it
//! out, forever.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{Snapshot, SnapshotFetcher};
use crate::error::{BridgeError, Result};
use crate::metrics::BridgeMetrics;
use crate::subscriber::FanoutDispatcher;

type Loading = Shared<BoxFuture<'static, Result<()>>>;

/// Latest snapshot per instance, kept fresh by refresh loops
pub struct SnapshotCache {
    fetcher: Arc<SnapshotFetcher>,
    fanout: Arc<FanoutDispatcher>,
    metrics: BridgeMetrics,
    snapshots: RwLock<HashMap<String, Arc<Snapshot>>>,
    /// Single-flight markers; never removed, so failures stay cached
    loading: Mutex<HashMap<String, Loading>>,
    refreshers: Mutex<HashMap<String, JoinHandle<()>>>,
    /// Set by `shutdown`; guarded by the `refreshers` lock
    closed: AtomicBool,
}

impl SnapshotCache {
    pub fn new(
        fetcher: Arc<SnapshotFetcher>,
        fanout: Arc<FanoutDispatcher>,
        metrics: BridgeMetrics,
    ) -> Arc<Self> {
        Arc::new(Self {
            fetcher,
            fanout,
            metrics,
            snapshots: RwLock::new(HashMap::new()),
            loading: Mutex::new(HashMap::new()),
            refreshers: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Make sure `key` is loaded and watched
    ///
    /// Idempotent: every call for the same key awaits the same initial load.
    pub async fn ensure_subscription(self: &Arc<Self>, key: &str) -> Result<()> {
        self.loading_for(key).await.await
    }

    /// Start loading `key` without waiting for it
    pub async fn trigger(self: &Arc<Self>, key: &str) {
        // The load task is already spawned; the marker alone keeps it shared.
        let _ = self.loading_for(key).await;
    }

    /// Latest installed snapshot, if the instance was ever loaded
    pub async fn current_snapshot(&self, key: &str) -> Option<Arc<Snapshot>> {
        self.snapshots.read().await.get(key).cloned()
    }

    pub async fn get_or_load(self: &Arc<Self>, key: &str) -> Result<Arc<Snapshot>> {
        self.ensure_subscription(key).await?;
        self.current_snapshot(key)
            .await
            .ok_or_else(|| BridgeError::Refresh(format!("no snapshot installed for {}", key)))
    }

    /// Whether the refresh loop for `key` is still running
    pub async fn is_refreshing(&self, key: &str) -> bool {
        self.refreshers
            .lock()
            .await
            .get(key)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Abort every refresh loop
    ///
    /// Loads still in flight install their snapshot but start no loop.
    pub async fn shutdown(&self) {
        let mut refreshers = self.refreshers.lock().await;
        self.closed.store(true, Ordering::SeqCst);
        for (key, handle) in refreshers.drain() {
            handle.abort();
            info!(instance = %key, "Refresh loop stopped");
        }
    }

    async fn loading_for(self: &Arc<Self>, key: &str) -> Loading {
        let mut loading = self.loading.lock().await;
        if let Some(pending) = loading.get(key) {
            return pending.clone();
        }

        let pending = self.start_loading(key.to_string());
        loading.insert(key.to_string(), pending.clone());
        pending
    }

    /// Spawn the initial load so it completes even if no caller polls it
    fn start_loading(self: &Arc<Self>, key: String) -> Loading {
        let cache = self.clone();
        let task = tokio::spawn(async move {
            let snapshot = match cache.fetcher.fetch(&key).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!(instance = %key, error = %e, "Error loading recent orders");
                    return Err(e);
                }
            };
            let snapshot = cache.install(&key, snapshot).await;
            info!(instance = %key, "Recent orders loaded");

            // Channels that subscribed while the load was in flight get the
            // first book as a push.
            cache.fanout.notify(&key, &snapshot).await;
            cache.spawn_refresh(key, snapshot).await;
            Ok(())
        });

        async move {
            task.await
                .map_err(|e| BridgeError::Refresh(format!("initial load aborted: {}", e)))?
        }
        .boxed()
        .shared()
    }

    async fn install(&self, key: &str, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.snapshots
            .write()
            .await
            .insert(key.to_string(), snapshot.clone());
        snapshot
    }

    async fn spawn_refresh(self: &Arc<Self>, key: String, first: Arc<Snapshot>) {
        let mut refreshers = self.refreshers.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            debug!(instance = %key, "Cache shut down, refresh loop not started");
            return;
        }

        let cache = self.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move { cache.refresh_loop(&task_key, first).await });
        refreshers.insert(key, handle);
    }

    async fn refresh_loop(&self, key: &str, mut current: Arc<Snapshot>) {
        loop {
            if let Err(e) = current.changed.changed().await {
                error!(instance = %key, error = %e, "Change signal failed, refresh stopped");
                self.metrics.refresh_failures.inc();
                return;
            }

            match self.fetcher.fetch(key).await {
                Ok(snapshot) => {
                    current = self.install(key, snapshot).await;
                    self.metrics.refreshes.inc();
                    self.fanout.notify(key, &current).await;
                }
                Err(e) => {
                    // The stale snapshot stays installed.
                    error!(instance = %key, error = %e, "Refresh failed, refresh stopped");
                    self.metrics.refresh_failures.inc();
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::AmountNormalizer;
    use crate::book::InstanceResolver;
    use crate::subscriber::{ChannelTransport, SubscriberRegistry};
    use crate::venue::{
        BrandHandle, ChangeSignal, InstanceHandle, MemoryVenue, PublicApi, RawAmount,
        RawBookOrders, RawOrder, Registrar, TradingInstance, Venue,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    struct Fixture {
        cache: Arc<SnapshotCache>,
        registry: Arc<SubscriberRegistry>,
        transport: Arc<ChannelTransport>,
        metrics: BridgeMetrics,
    }

    fn fixture(venue: &MemoryVenue) -> Fixture {
        fixture_with(Arc::new(venue.clone()), Arc::new(venue.clone()))
    }

    fn fixture_with(registrar: Arc<dyn Registrar>, venue: Arc<dyn Venue>) -> Fixture {
        let mut brands = HashMap::new();
        brands.insert("A".to_string(), BrandHandle::new("b1"));
        let metrics = BridgeMetrics::new().unwrap();
        let resolver = Arc::new(InstanceResolver::new(registrar, venue));
        let fetcher = Arc::new(SnapshotFetcher::new(
            resolver,
            Arc::new(AmountNormalizer::new(&brands)),
            metrics.clone(),
        ));
        let registry = Arc::new(SubscriberRegistry::new());
        let transport = Arc::new(ChannelTransport::new(16));
        let fanout = Arc::new(FanoutDispatcher::new(
            registry.clone(),
            transport.clone(),
            metrics.clone(),
        ));
        Fixture {
            cache: SnapshotCache::new(fetcher, fanout, metrics.clone()),
            registry,
            transport,
            metrics,
        }
    }

    fn order(id: &str) -> RawOrder {
        RawOrder {
            public_id: id.to_string(),
            asset: RawAmount {
                extent: 1,
                brand: BrandHandle::new("b1"),
            },
            price: RawAmount {
                extent: 2,
                brand: BrandHandle::new("b1"),
            },
        }
    }

    /// Venue whose change notifier is dropped as soon as the book is read
    #[derive(Clone)]
    struct DroppedSignalVenue;

    #[async_trait]
    impl Registrar for DroppedSignalVenue {
        async fn get(&self, key: &str) -> Result<InstanceHandle> {
            Ok(InstanceHandle::new(key))
        }
    }

    #[async_trait]
    impl Venue for DroppedSignalVenue {
        async fn get_instance(&self, handle: &InstanceHandle) -> Result<TradingInstance> {
            Ok(TradingInstance {
                handle: handle.clone(),
                public_api: Arc::new(self.clone()),
            })
        }
    }

    #[async_trait]
    impl PublicApi for DroppedSignalVenue {
        async fn get_book_orders(&self) -> Result<RawBookOrders> {
            let (_notifier, changed) = ChangeSignal::channel();
            Ok(RawBookOrders {
                buy: vec![order("o1")],
                sell: vec![],
                changed,
            })
        }
    }

    async fn wait_until_stopped(cache: &SnapshotCache, key: &str) {
        for _ in 0..200 {
            if !cache.is_refreshing(key).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn wait_for_fetches(venue: &MemoryVenue, key: &str, count: usize) {
        for _ in 0..200 {
            if venue.fetch_count(key).await >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} fetches for {}", count, key);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_fetches_once() {
        let venue = MemoryVenue::new();
        venue.register("X1").await;
        venue.set_latency(Duration::from_millis(20)).await;
        let f = fixture(&venue);

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let cache = f.cache.clone();
                tokio::spawn(async move { cache.ensure_subscription("X1").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        f.cache.ensure_subscription("X1").await.unwrap();

        assert_eq!(venue.fetch_count("X1").await, 1);
    }

    #[tokio::test]
    async fn test_current_snapshot_absent_then_present() {
        let venue = MemoryVenue::new();
        venue.register("X1").await;
        venue.set_book("X1", vec![order("o1")], vec![]).await;
        let f = fixture(&venue);

        assert!(f.cache.current_snapshot("X1").await.is_none());
        f.cache.ensure_subscription("X1").await.unwrap();

        let snapshot = f.cache.current_snapshot("X1").await.unwrap();
        assert_eq!(snapshot.buy.len(), 1);
        assert_eq!(snapshot.buy[0].public_id, "o1");
        assert!(f.cache.is_refreshing("X1").await);
    }

    #[tokio::test]
    async fn test_failed_load_is_cached() {
        let venue = MemoryVenue::new();
        let f = fixture(&venue);

        let first = f.cache.get_or_load("X9").await.unwrap_err();
        assert!(matches!(first, BridgeError::Resolution(_)));
        assert_eq!(f.cache.ensure_subscription("X9").await.unwrap_err(), first);
        assert!(f.cache.current_snapshot("X9").await.is_none());
        assert_eq!(venue.lookup_count("X9").await, 1);
    }

    #[tokio::test]
    async fn test_change_triggers_one_refetch_and_push() {
        let venue = MemoryVenue::new();
        venue.register("X1").await;
        let f = fixture(&venue);
        let (c1, mut rx) = f.transport.attach().await;
        f.registry.open_channel(c1).await;
        f.registry.subscribe(c1, "X1").await.unwrap();

        f.cache.ensure_subscription("X1").await.unwrap();
        let initial = rx.recv().await.unwrap();
        assert!(initial.contains(r#""buy":[]"#));

        venue.set_book("X1", vec![order("o2")], vec![]).await;
        let pushed = rx.recv().await.unwrap();
        assert!(pushed.contains(r#""publicID":"o2""#));

        let snapshot = f.cache.current_snapshot("X1").await.unwrap();
        assert_eq!(snapshot.buy[0].public_id, "o2");
        assert_eq!(venue.fetch_count("X1").await, 2);
        assert_eq!(f.metrics.refreshes.get(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_stale_snapshot() {
        let venue = MemoryVenue::new();
        venue.register("X1").await;
        venue.set_book("X1", vec![order("o1")], vec![]).await;
        let f = fixture(&venue);
        f.cache.ensure_subscription("X1").await.unwrap();

        venue.fail_next_fetch("X1").await;
        venue.set_book("X1", vec![order("o2")], vec![]).await;
        wait_for_fetches(&venue, "X1", 2).await;
        wait_until_stopped(&f.cache, "X1").await;

        assert!(!f.cache.is_refreshing("X1").await);
        assert_eq!(f.metrics.refresh_failures.get(), 1);
        let snapshot = f.cache.current_snapshot("X1").await.unwrap();
        assert_eq!(snapshot.buy[0].public_id, "o1");

        // The loop is gone: further changes are not picked up.
        venue.set_book("X1", vec![order("o3")], vec![]).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(venue.fetch_count("X1").await, 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_refresh() {
        let venue = MemoryVenue::new();
        venue.register("X1").await;
        let f = fixture(&venue);
        f.cache.ensure_subscription("X1").await.unwrap();
        assert!(f.cache.is_refreshing("X1").await);

        f.cache.shutdown().await;
        venue.set_book("X1", vec![order("o1")], vec![]).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!f.cache.is_refreshing("X1").await);
        assert_eq!(venue.fetch_count("X1").await, 1);
    }

    #[tokio::test]
    async fn test_dropped_change_signal_stops_refresh() {
        let venue = DroppedSignalVenue;
        let f = fixture_with(Arc::new(venue.clone()), Arc::new(venue));
        f.cache.ensure_subscription("X1").await.unwrap();

        wait_until_stopped(&f.cache, "X1").await;
        assert!(!f.cache.is_refreshing("X1").await);
        assert_eq!(f.metrics.refresh_failures.get(), 1);
        assert_eq!(f.metrics.refreshes.get(), 0);
        let snapshot = f.cache.current_snapshot("X1").await.unwrap();
        assert_eq!(snapshot.buy[0].public_id, "o1");
    }

    #[tokio::test]
    async fn test_shutdown_during_initial_load_starts_no_refresh() {
        let venue = MemoryVenue::new();
        venue.register("X1").await;
        venue.set_latency(Duration::from_millis(30)).await;
        let f = fixture(&venue);

        f.cache.trigger("X1").await;
        f.cache.shutdown().await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        // The in-flight load still lands, but nothing watches it.
        assert!(f.cache.current_snapshot("X1").await.is_some());
        assert!(!f.cache.is_refreshing("X1").await);

        venue.set_book("X1", vec![order("o1")], vec![]).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(venue.fetch_count("X1").await, 1);
    }
}
