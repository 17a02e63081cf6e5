//! Subscriber tracking and fanout
//!
//! Channels are opaque subscriber connections owned by the transport. The
//! registry records which instances each channel follows; the dispatcher
//! pushes every refreshed snapshot to the channels following its instance.

mod fanout;
mod registry;
mod transport;

pub use fanout::{FanoutDispatcher, Transport};
pub use registry::SubscriberRegistry;
pub use transport::ChannelTransport;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle for one subscriber connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelHandle(pub u64);

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel-{}", self.0)
    }
}
