//! Snapshot channel between the ledger store and its readers.
//!
//! Writers publish a freshly derived view after every change; readers either
//! take the current snapshot or subscribe and wake on each new one. A newer
//! snapshot simply replaces the previous one.

use std::sync::Arc;

use tokio::sync::watch;

// ---

#[derive(Debug)]
pub struct SnapshotFeed<T> {
    tx: Arc<watch::Sender<Arc<T>>>,
}

impl<T> Clone for SnapshotFeed<T> {
    fn clone(&self) -> Self {
        SnapshotFeed {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> SnapshotFeed<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        SnapshotFeed { tx: Arc::new(tx) }
    }

    /// Replace the current snapshot and wake every subscriber.
    pub fn publish(&self, snapshot: T) {
        // `send_replace` succeeds even when nobody is subscribed.
        self.tx.send_replace(Arc::new(snapshot));
    }

    pub fn current(&self) -> Arc<T> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}
