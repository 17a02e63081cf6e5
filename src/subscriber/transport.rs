//! Queue-backed transport
//!
//! Each attached channel gets a bounded queue of serialized frames. The
//! websocket server drains the queue into the socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use super::{ChannelHandle, Transport};
use crate::error::{BridgeError, Result};

/// Transport delivering frames through per-channel queues
#[derive(Debug)]
pub struct ChannelTransport {
    senders: RwLock<HashMap<ChannelHandle, mpsc::Sender<String>>>,
    buffer: usize,
    next_id: AtomicU64,
}

impl ChannelTransport {
    pub fn new(buffer: usize) -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a channel handle and its outbound queue
    pub async fn attach(&self) -> (ChannelHandle, mpsc::Receiver<String>) {
        let channel = ChannelHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer);
        self.senders.write().await.insert(channel, tx);
        debug!(channel = %channel, "Channel attached");
        (channel, rx)
    }

    pub async fn detach(&self, channel: ChannelHandle) {
        self.senders.write().await.remove(&channel);
    }

    /// Queue a frame for one channel
    pub async fn push(&self, channel: ChannelHandle, frame: String) -> Result<()> {
        let senders = self.senders.read().await;
        let sender = senders
            .get(&channel)
            .ok_or_else(|| BridgeError::Transport(format!("{} is not attached", channel)))?;
        sender
            .try_send(frame)
            .map_err(|e| BridgeError::Transport(format!("{}: {}", channel, e)))
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, payload: &serde_json::Value, channels: &[ChannelHandle]) -> Result<()> {
        let frame = serde_json::to_string(payload)?;
        let mut failed = Vec::new();
        for channel in channels {
            if let Err(e) = self.push(*channel, frame.clone()).await {
                failed.push(e.to_string());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Transport(format!(
                "{} of {} channels unreachable: {}",
                failed.len(),
                channels.len(),
                failed.join("; ")
            )))
        }
    }
}
