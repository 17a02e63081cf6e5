//! Order book snapshots
//!
//! Resolves instances, fetches their order books and keeps the latest
//! snapshot of each one fresh for as long as the process runs.

mod cache;
mod fetcher;
mod resolver;

pub use cache::SnapshotCache;
pub use fetcher::SnapshotFetcher;
pub use resolver::InstanceResolver;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::venue::ChangeSignal;

/// A single normalized order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "publicID")]
    pub public_id: String,
    #[serde(rename = "Asset")]
    pub asset: Amount,
    #[serde(rename = "Price")]
    pub price: Amount,
}

/// Buy and sell orders of one instance plus its next-change signal
///
/// Snapshots are never edited; a refresh installs a new one.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub buy: Vec<Order>,
    pub sell: Vec<Order>,
    pub changed: ChangeSignal,
}

/// Serializable part of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookView {
    pub buy: Vec<Order>,
    pub sell: Vec<Order>,
}

impl Snapshot {
    pub fn view(&self) -> BookView {
        BookView {
            buy: self.buy.clone(),
            sell: self.sell.clone(),
        }
    }
}
