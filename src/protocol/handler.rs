//! Protocol handler
//!
//! Decodes recent-orders requests and drives the bridge. Holds no state of
//! its own beyond the optional override instance key.

use std::sync::Arc;

use tracing::{debug, trace};

use super::{Request, Response, SubscribeStatus};
use crate::bridge::Bridge;
use crate::error::{BridgeError, Result};
use crate::subscriber::ChannelHandle;

/// Reply to one request
///
/// `watch` names an instance to start loading once the reply has been
/// delivered, so a subscriber sees its acknowledgement before the first push.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outcome {
    pub response: Option<Response>,
    pub watch: Option<String>,
}

impl Outcome {
    fn reply(response: Response) -> Self {
        Self {
            response: Some(response),
            watch: None,
        }
    }
}

/// Command handler for recent-orders requests
pub struct Handler {
    bridge: Arc<Bridge>,
    override_key: Option<String>,
}

impl Handler {
    pub fn new(bridge: Arc<Bridge>, override_key: Option<String>) -> Self {
        Self {
            bridge,
            override_key,
        }
    }

    /// Effective instance key for a request
    ///
    /// With an override configured, the request must omit the key or repeat
    /// the override exactly.
    pub fn coerce_instance_key(&self, requested: Option<&str>) -> Result<String> {
        match (requested, self.override_key.as_deref()) {
            (None, Some(fixed)) => Ok(fixed.to_string()),
            (None, None) => Err(BridgeError::Protocol(
                "instanceRegKey is required".to_string(),
            )),
            (Some(key), None) => Ok(key.to_string()),
            (Some(key), Some(fixed)) if key == fixed => Ok(key.to_string()),
            (Some(key), Some(fixed)) => Err(BridgeError::Configuration(format!(
                "instanceId {:?} must match {:?}",
                key, fixed
            ))),
        }
    }

    pub async fn on_open(&self, channel: ChannelHandle) {
        let registry = self.bridge.registry();
        registry.open_channel(channel).await;
        self.bridge
            .metrics()
            .open_channels
            .set(registry.open_channels().await as i64);
    }

    pub async fn on_close(&self, channel: ChannelHandle) {
        let registry = self.bridge.registry();
        registry.close_channel(channel).await;
        self.bridge
            .metrics()
            .open_channels
            .set(registry.open_channels().await as i64);
    }

    /// Handle a request without a channel
    pub async fn process_inbound(&self, request: &Request) -> Result<Option<Response>> {
        self.on_message(request, None).await
    }

    /// Decode a raw JSON frame and handle it
    pub async fn on_raw(&self, raw: &str, channel: Option<ChannelHandle>) -> Result<Option<Response>> {
        let outcome = self.on_frame(raw, channel).await?;
        Ok(self.finish(outcome).await)
    }

    /// Decode a raw JSON frame and dispatch it, leaving `watch` to the caller
    pub async fn on_frame(&self, raw: &str, channel: Option<ChannelHandle>) -> Result<Outcome> {
        let request = Request::parse(raw)
            .map_err(|e| BridgeError::Protocol(format!("malformed request: {}", e)))?;
        self.dispatch(&request, channel).await
    }

    /// Handle a decoded request
    ///
    /// `Ok(None)` means the message type is not handled here.
    pub async fn on_message(
        &self,
        request: &Request,
        channel: Option<ChannelHandle>,
    ) -> Result<Option<Response>> {
        let outcome = self.dispatch(request, channel).await?;
        Ok(self.finish(outcome).await)
    }

    /// Start the watch an outcome asks for and hand back its response
    pub async fn finish(&self, outcome: Outcome) -> Option<Response> {
        if let Some(key) = &outcome.watch {
            self.bridge.watch(key).await;
        }
        outcome.response
    }

    pub async fn dispatch(
        &self,
        request: &Request,
        channel: Option<ChannelHandle>,
    ) -> Result<Outcome> {
        match request {
            Request::GetRecentOrders { instance_reg_key } => {
                let key = self.coerce_instance_key(instance_reg_key.as_deref())?;
                let snapshot = self.bridge.cache().get_or_load(&key).await?;
                Ok(Outcome::reply(Response::RecentOrders(snapshot.view())))
            }

            Request::SubscribeRecentOrders { instance_reg_key } => {
                let key = self.coerce_instance_key(instance_reg_key.as_deref())?;
                let channel = channel.ok_or_else(|| {
                    BridgeError::Protocol(format!("channel is not set for {} subscription", key))
                })?;

                if !self.bridge.subscribe(channel, &key).await? {
                    return Ok(Outcome::reply(Response::SubscribedToRecentOrders(
                        SubscribeStatus::Already,
                    )));
                }
                debug!(channel = %channel, instance = %key, "Subscribed to recent orders");
                Ok(Outcome {
                    response: Some(Response::SubscribedToRecentOrders(
                        SubscribeStatus::Subscribed,
                    )),
                    watch: Some(key),
                })
            }

            Request::Unhandled => {
                trace!("Unhandled message type");
                Ok(Outcome::default())
            }
        }
    }
}
