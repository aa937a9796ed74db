use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Snapshots queued per observer before it counts as stalled.
pub const OBSERVER_QUEUE_DEPTH: usize = 64;

pub type ObserverId = u64;

/// One connected subscriber's receiving end. Dropping the handle (or
/// falling behind by more than [`OBSERVER_QUEUE_DEPTH`] messages) removes
/// the observer on the next broadcast attempt.
#[derive(Debug)]
pub struct ObserverHandle {
    id: ObserverId,
    rx: mpsc::Receiver<String>,
}

impl ObserverHandle {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Next broadcast message, or `None` once the hub has pruned this
    /// observer and dropped its sender.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Best-effort fan-out of serialized snapshots to every registered
/// observer.
///
/// The registry is synchronized independently of the simulator guard;
/// registering or pruning an observer never contends with a tick. Delivery
/// is a non-blocking enqueue per observer: the per-connection task drains
/// its own queue onto the socket, so one stalled connection cannot delay
/// the tick loop or starve the others.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    observers: Mutex<HashMap<ObserverId, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self) -> ObserverHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OBSERVER_QUEUE_DEPTH);
        self.observers.lock().await.insert(id, tx);
        debug!(id, "observer registered");
        ObserverHandle { id, rx }
    }

    pub async fn unregister(&self, id: ObserverId) {
        if self.observers.lock().await.remove(&id).is_some() {
            debug!(id, "observer unregistered");
        }
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.lock().await.len()
    }

    /// Attempts delivery to every registered observer, at most once each.
    /// A failed attempt (closed or full queue) removes that observer.
    /// Returns the number of successful deliveries.
    pub async fn broadcast(&self, message: &str) -> usize {
        let mut observers = self.observers.lock().await;
        let mut dead: Vec<ObserverId> = Vec::new();

        let mut delivered = 0;
        for (&id, tx) in observers.iter() {
            if tx.try_send(message.to_owned()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        for id in dead {
            observers.remove(&id);
            warn!(id, "observer pruned after failed delivery");
        }

        delivered
    }
}
