//! Subscriber registry
//!
//! Bidirectional channel <-> instance mapping. Both directions live behind
//! one lock, so a channel is in an instance's subscriber set exactly when
//! the instance is in the channel's subscription set.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use tracing::debug;

use super::ChannelHandle;
use crate::error::{BridgeError, Result};

#[derive(Debug, Default)]
struct RegistryState {
    /// instance key -> subscribed channels
    subscribers: HashMap<String, HashSet<ChannelHandle>>,
    /// channel -> subscribed instance keys
    subscriptions: HashMap<ChannelHandle, HashSet<String>>,
}

/// Tracks which channels follow which instances
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a channel with no subscriptions
    pub async fn open_channel(&self, channel: ChannelHandle) {
        let mut state = self.state.write().await;
        state.subscriptions.entry(channel).or_default();
        debug!(channel = %channel, "Channel opened");
    }

    /// Drop a channel and every subscription it holds
    pub async fn close_channel(&self, channel: ChannelHandle) {
        let mut state = self.state.write().await;
        let Some(keys) = state.subscriptions.remove(&channel) else {
            return;
        };
        for key in &keys {
            if let Some(subs) = state.subscribers.get_mut(key) {
                subs.remove(&channel);
            }
        }
        debug!(channel = %channel, instances = keys.len(), "Channel closed");
    }

    /// Subscribe `channel` to `key`
    ///
    /// Returns `false` if the subscription already existed. Fails if the
    /// channel was never opened.
    pub async fn subscribe(&self, channel: ChannelHandle, key: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let keys = state.subscriptions.get_mut(&channel).ok_or_else(|| {
            BridgeError::Protocol(format!("subscriptions not initialised for {}", channel))
        })?;
        if !keys.insert(key.to_string()) {
            return Ok(false);
        }
        state
            .subscribers
            .entry(key.to_string())
            .or_default()
            .insert(channel);
        Ok(true)
    }

    /// Channels currently subscribed to `key`, in handle order
    pub async fn subscribers(&self, key: &str) -> Vec<ChannelHandle> {
        let state = self.state.read().await;
        let mut channels: Vec<_> = state
            .subscribers
            .get(key)
            .map(|subs| subs.iter().copied().collect())
            .unwrap_or_default();
        channels.sort_unstable();
        channels
    }

    /// Instance keys `channel` is subscribed to, sorted
    pub async fn subscriptions(&self, channel: ChannelHandle) -> Option<Vec<String>> {
        let state = self.state.read().await;
        state.subscriptions.get(&channel).map(|keys| {
            let mut keys: Vec<_> = keys.iter().cloned().collect();
            keys.sort_unstable();
            keys
        })
    }

    pub async fn is_open(&self, channel: ChannelHandle) -> bool {
        self.state.read().await.subscriptions.contains_key(&channel)
    }

    pub async fn is_subscribed(&self, channel: ChannelHandle, key: &str) -> bool {
        let state = self.state.read().await;
        state
            .subscriptions
            .get(&channel)
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    }

    pub async fn open_channels(&self) -> usize {
        self.state.read().await.subscriptions.len()
    }
}
