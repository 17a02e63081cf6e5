//! Instance resolver
//!
//! Memoizes registry lookups and instance resolution per instance key. The
//! pending future itself is cached, so concurrent callers share a single
//! in-flight resolution. Failures are cached too and never retried.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::venue::{InstanceHandle, Registrar, TradingInstance, Venue};

type Memo<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Resolves instance keys to trading instances
pub struct InstanceResolver {
    registrar: Arc<dyn Registrar>,
    venue: Arc<dyn Venue>,
    handles: Mutex<HashMap<String, Memo<InstanceHandle>>>,
    instances: Mutex<HashMap<String, Memo<TradingInstance>>>,
}

impl InstanceResolver {
    pub fn new(registrar: Arc<dyn Registrar>, venue: Arc<dyn Venue>) -> Self {
        Self {
            registrar,
            venue,
            handles: Mutex::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `key` to its trading instance
    pub async fn resolve(&self, key: &str) -> Result<TradingInstance> {
        let pending = {
            let mut instances = self.instances.lock().await;
            match instances.get(key) {
                Some(pending) => pending.clone(),
                None => {
                    let handle = self.instance_handle(key).await;
                    let venue = self.venue.clone();
                    let pending = async move {
                        let handle = handle.await?;
                        venue.get_instance(&handle).await
                    }
                    .boxed()
                    .shared();
                    instances.insert(key.to_string(), pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Memoized registry lookup for `key`
    async fn instance_handle(&self, key: &str) -> Memo<InstanceHandle> {
        let mut handles = self.handles.lock().await;
        if let Some(pending) = handles.get(key) {
            return pending.clone();
        }

        debug!(instance = %key, "Looking up instance in registrar");
        let registrar = self.registrar.clone();
        let owned_key = key.to_string();
        let pending = async move { registrar.get(&owned_key).await }
            .boxed()
            .shared();
        handles.insert(key.to_string(), pending.clone());
        pending
    }
}
