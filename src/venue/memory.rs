//! In-memory venue
//!
//! Holds order books in process and fires change signals when a book is
//! replaced. Backs the standalone binary and the test suites.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{
    ChangeNotifier, ChangeSignal, InstanceHandle, PublicApi, RawBookOrders, RawOrder, Registrar,
    TradingInstance, Venue,
};
use crate::error::{BridgeError, Result};

#[derive(Debug, Default)]
struct InstanceBook {
    handle: Option<InstanceHandle>,
    buy: Vec<RawOrder>,
    sell: Vec<RawOrder>,
    pending: Option<(ChangeNotifier, ChangeSignal)>,
    fetches: usize,
    fail_next_fetch: bool,
}

#[derive(Debug, Default)]
struct VenueState {
    books: HashMap<String, InstanceBook>,
    lookups: HashMap<String, usize>,
    latency: Option<Duration>,
    next_handle: u64,
}

/// Venue keeping its books in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryVenue {
    state: Arc<Mutex<VenueState>>,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    instances: HashMap<String, FixtureBook>,
}

#[derive(Debug, Default, Deserialize)]
struct FixtureBook {
    #[serde(default)]
    buy: Vec<RawOrder>,
    #[serde(default)]
    sell: Vec<RawOrder>,
}

impl MemoryVenue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load instances and books from a JSON fixture
    pub async fn from_fixture(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let fixture: Fixture = serde_json::from_str(&raw)?;

        let venue = Self::new();
        for (key, book) in fixture.instances {
            venue.register(&key).await;
            venue.set_book(&key, book.buy, book.sell).await;
        }
        info!(path = %path.as_ref().display(), "Venue fixture loaded");
        Ok(venue)
    }

    /// Register an instance under `key` with an empty book
    pub async fn register(&self, key: &str) -> InstanceHandle {
        let mut state = self.state.lock().await;
        state.next_handle += 1;
        let handle = InstanceHandle::new(format!("instance-{}", state.next_handle));
        state.books.entry(key.to_string()).or_default().handle = Some(handle.clone());
        handle
    }

    /// Replace the book for `key` and fire its outstanding change signal
    pub async fn set_book(&self, key: &str, buy: Vec<RawOrder>, sell: Vec<RawOrder>) {
        let mut state = self.state.lock().await;
        let book = state.books.entry(key.to_string()).or_default();
        book.buy = buy;
        book.sell = sell;
        if let Some((notifier, _)) = book.pending.take() {
            debug!(instance = %key, "Book changed");
            notifier.notify();
        }
    }

    /// Make the next order-book query for `key` fail
    pub async fn fail_next_fetch(&self, key: &str) {
        let mut state = self.state.lock().await;
        state.books.entry(key.to_string()).or_default().fail_next_fetch = true;
    }

    /// Delay every order-book query
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = Some(latency);
    }

    /// Number of order-book queries served for `key`
    pub async fn fetch_count(&self, key: &str) -> usize {
        let state = self.state.lock().await;
        state.books.get(key).map(|b| b.fetches).unwrap_or(0)
    }

    /// Number of registrar lookups for `key`
    pub async fn lookup_count(&self, key: &str) -> usize {
        let state = self.state.lock().await;
        state.lookups.get(key).copied().unwrap_or(0)
    }

    async fn book_orders(&self, key: &str) -> Result<RawBookOrders> {
        let latency = self.state.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;
        let book = state
            .books
            .get_mut(key)
            .ok_or_else(|| BridgeError::Refresh(format!("no book for {}", key)))?;
        book.fetches += 1;
        if std::mem::take(&mut book.fail_next_fetch) {
            return Err(BridgeError::Refresh(format!("book query for {} failed", key)));
        }

        let (_, signal) = book.pending.get_or_insert_with(ChangeSignal::channel);
        let changed = signal.clone();

        Ok(RawBookOrders {
            buy: book.buy.clone(),
            sell: book.sell.clone(),
            changed,
        })
    }
}

#[async_trait]
impl Registrar for MemoryVenue {
    async fn get(&self, key: &str) -> Result<InstanceHandle> {
        let mut state = self.state.lock().await;
        *state.lookups.entry(key.to_string()).or_default() += 1;
        state
            .books
            .get(key)
            .and_then(|b| b.handle.clone())
            .ok_or_else(|| BridgeError::Resolution(format!("no instance registered as {}", key)))
    }
}

#[async_trait]
impl Venue for MemoryVenue {
    async fn get_instance(&self, handle: &InstanceHandle) -> Result<TradingInstance> {
        let state = self.state.lock().await;
        let key = state
            .books
            .iter()
            .find(|(_, book)| book.handle.as_ref() == Some(handle))
            .map(|(key, _)| key.clone())
            .ok_or_else(|| {
                BridgeError::Resolution(format!("unknown instance handle {}", handle.as_str()))
            })?;

        Ok(TradingInstance {
            handle: handle.clone(),
            public_api: Arc::new(MemoryPublicApi {
                venue: self.clone(),
                key,
            }),
        })
    }
}

/// Public API of one in-memory instance
struct MemoryPublicApi {
    venue: MemoryVenue,
    key: String,
}

#[async_trait]
impl PublicApi for MemoryPublicApi {
    async fn get_book_orders(&self) -> Result<RawBookOrders> {
        self.venue.book_orders(&self.key).await
    }
}
