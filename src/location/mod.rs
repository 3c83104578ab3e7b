//! Cancellable one-fix geolocation abstraction.
//!
//! The recorder asks a provider for a single position fix per scan cycle.
//! Delivery goes through a oneshot channel, so a provider structurally
//! cannot deliver more than one fix, and dropping the `FixRequest` cancels
//! the subscription so an abandoned cycle never leaks a listener.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// A single position fix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
}

/// Cadence hints handed to the provider when subscribing.
#[derive(Debug, Clone, Copy)]
pub struct FixRequestSettings {
    pub interval: Duration,
    pub fastest_interval: Duration,
    pub high_accuracy: bool,
}

impl Default for FixRequestSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            fastest_interval: Duration::from_secs(5),
            high_accuracy: true,
        }
    }
}

/// Provider half of a fix subscription. Consumed by `send`, so at most one
/// fix can ever be delivered per request.
pub struct FixSender {
    tx: oneshot::Sender<LocationFix>,
    cancel: CancellationToken,
}

impl FixSender {
    /// Delivers the first fix. Ignores the case where the requester has
    /// already gone away.
    pub fn send(self, fix: LocationFix) {
        let _ = self.tx.send(fix);
    }

    /// Resolves when the requester has dropped its end; provider tasks
    /// should stop listening for position updates at that point.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Requester half of a fix subscription.
pub struct FixRequest {
    rx: oneshot::Receiver<LocationFix>,
    cancel: CancellationToken,
}

impl FixRequest {
    /// Creates a linked sender/request pair. Providers hold the sender,
    /// callers await the request.
    pub fn channel() -> (FixSender, FixRequest) {
        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        (
            FixSender {
                tx,
                cancel: cancel.clone(),
            },
            FixRequest { rx, cancel },
        )
    }

    /// Waits for the first fix. Returns `None` when the provider went away
    /// without delivering one.
    pub async fn recv(mut self) -> Option<LocationFix> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for FixRequest {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Source of position fixes. Implementations subscribe to whatever location
/// backend they wrap, deliver the first fix through the returned request's
/// channel, and unsubscribe on delivery or cancellation.
pub trait GeolocationProvider: Send + Sync {
    fn request_one_fix(&self, settings: &FixRequestSettings) -> FixRequest;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fix_is_delivered_once() {
        let (sender, request) = FixRequest::channel();
        sender.send(LocationFix {
            latitude: -11.95,
            longitude: -76.84,
        });

        let fix = request.recv().await.expect("fix should arrive");
        assert_eq!(fix.latitude, -11.95);
        assert_eq!(fix.longitude, -76.84);
    }

    #[tokio::test]
    async fn dropping_the_request_cancels_the_subscription() {
        let (sender, request) = FixRequest::channel();
        assert!(!sender.is_cancelled());

        drop(request);
        sender.cancelled().await;
        assert!(sender.is_cancelled());
    }

    #[tokio::test]
    async fn recv_returns_none_when_provider_disappears() {
        let (sender, request) = FixRequest::channel();
        drop(sender);
        assert!(request.recv().await.is_none());
    }
}
