use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{oneshot, watch};

use super::types::StreamKind;

/// What made a scanner ask for the child to be killed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KillRequest {
    pub trigger: String,
    pub stream: StreamKind,
}

/// One-shot latch guarding the kill. Only the first `trip` across all
/// scanners reaches the supervisor; later calls are no-ops.
///
/// Tripping also publishes a stop flag so scanners blocked on a pipe that a
/// grandchild still holds open can give up their read.
pub(crate) struct KillLatch {
    tx: Mutex<Option<oneshot::Sender<KillRequest>>>,
    tripped: AtomicBool,
    stop: watch::Sender<bool>,
}

impl KillLatch {
    pub fn new() -> (Arc<Self>, oneshot::Receiver<KillRequest>) {
        let (tx, rx) = oneshot::channel();
        let (stop, _) = watch::channel(false);
        let latch = Arc::new(Self {
            tx: Mutex::new(Some(tx)),
            tripped: AtomicBool::new(false),
            stop,
        });
        (latch, rx)
    }

    /// Returns true only for the call that actually tripped the latch.
    pub fn trip(&self, req: KillRequest) -> bool {
        let mut g = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = g.take() else {
            return false;
        };
        self.tripped.store(true, Ordering::Release);
        self.stop.send_replace(true);
        // The supervisor may already have reaped the child and dropped the receiver.
        let _ = tx.send(req);
        true
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Resolves once the latch has been tripped, immediately if it already was.
    pub async fn stopped(&self) {
        let mut rx = self.stop.subscribe();
        // The sender lives as long as `self`, so this only fails on a closed latch.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}
