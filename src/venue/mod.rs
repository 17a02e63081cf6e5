//! Venue collaborator interfaces
//!
//! The bridge never talks to a concrete exchange directly. It consumes a
//! registrar (instance key -> instance handle), a venue (instance handle ->
//! trading instance) and the instance's public order-book query.

mod memory;
mod signal;

pub use memory::MemoryVenue;
pub use signal::{ChangeNotifier, ChangeSignal};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Opaque brand (asset class) handle issued by the venue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrandHandle(String);

impl BrandHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Opaque instance handle returned by the registrar
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceHandle(String);

impl InstanceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Amount as the venue reports it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawAmount {
    pub extent: u64,
    pub brand: BrandHandle,
}

/// Order as the venue reports it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawOrder {
    #[serde(rename = "publicID")]
    pub public_id: String,
    #[serde(rename = "Asset")]
    pub asset: RawAmount,
    #[serde(rename = "Price")]
    pub price: RawAmount,
}

/// Result of one order-book query
#[derive(Debug, Clone)]
pub struct RawBookOrders {
    pub buy: Vec<RawOrder>,
    pub sell: Vec<RawOrder>,
    /// Fires when the book next changes
    pub changed: ChangeSignal,
}

/// Resolved trading instance
#[derive(Clone)]
pub struct TradingInstance {
    pub handle: InstanceHandle,
    pub public_api: Arc<dyn PublicApi>,
}

impl fmt::Debug for TradingInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradingInstance")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Registry lookup by instance key
#[async_trait]
pub trait Registrar: Send + Sync {
    async fn get(&self, key: &str) -> Result<InstanceHandle>;
}

/// Instance handle resolution
#[async_trait]
pub trait Venue: Send + Sync {
    async fn get_instance(&self, handle: &InstanceHandle) -> Result<TradingInstance>;
}

/// Public API of one trading instance
#[async_trait]
pub trait PublicApi: Send + Sync {
    async fn get_book_orders(&self) -> Result<RawBookOrders>;
}
