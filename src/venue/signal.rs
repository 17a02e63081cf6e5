//! One-shot "book changed" signal
//!
//! The venue hands out a signal with every order-book query. It resolves
//! once, when the book next changes. Clones observe the same resolution.

use std::fmt;
use std::future::Future;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

use crate::error::{BridgeError, Result};

/// Cloneable future resolving when the venue reports the next change
#[derive(Clone)]
pub struct ChangeSignal {
    inner: Shared<BoxFuture<'static, Result<()>>>,
}

/// Venue-side half of a [`ChangeSignal`]
#[derive(Debug)]
pub struct ChangeNotifier {
    tx: oneshot::Sender<()>,
}

impl ChangeSignal {
    /// Wrap an arbitrary future
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            inner: fut.boxed().shared(),
        }
    }

    /// Create a notifier and the signal it fires
    ///
    /// Dropping the notifier without firing resolves the signal with a
    /// refresh error, so watchers stop instead of hanging forever.
    pub fn channel() -> (ChangeNotifier, ChangeSignal) {
        let (tx, rx) = oneshot::channel();
        let signal = Self::new(async move {
            rx.await
                .map_err(|_| BridgeError::Refresh("venue dropped change notifier".to_string()))
        });
        (ChangeNotifier { tx }, signal)
    }

    /// A signal that never fires
    pub fn never() -> Self {
        Self::new(futures_util::future::pending())
    }

    /// Wait for the change
    pub async fn changed(&self) -> Result<()> {
        self.inner.clone().await
    }

    /// Whether the signal already resolved
    pub fn is_fired(&self) -> bool {
        self.inner.peek().is_some()
    }
}

impl ChangeNotifier {
    /// Fire the signal
    pub fn notify(self) {
        // Nobody watching is fine.
        let _ = self.tx.send(());
    }
}

impl fmt::Debug for ChangeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("fired", &self.is_fired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_clones_see_same_change() {
        let (notifier, signal) = ChangeSignal::channel();
        let other = signal.clone();
        let waiter = tokio::spawn(async move { other.changed().await });

        notifier.notify();
        assert!(signal.changed().await.is_ok());
        assert!(waiter.await.unwrap().is_ok());
        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn test_dropped_notifier_is_refresh_error() {
        let (notifier, signal) = ChangeSignal::channel();
        drop(notifier);
        assert!(matches!(signal.changed().await, Err(BridgeError::Refresh(_))));
    }

    #[tokio::test]
    async fn test_never_stays_pending() {
        let signal = ChangeSignal::never();
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.changed()).await;
        assert!(waited.is_err());
        assert!(!signal.is_fired());
    }
}
