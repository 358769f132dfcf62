//! Single-slot, overwrite-on-write cell for "latest value wins" data.
//!
//! Publishing replaces whatever is in the slot, whether or not anyone has
//! read it. Readers wake once per change and only ever see the newest
//! value; intermediate values are dropped, never queued.

use std::sync::Arc;

use tokio::sync::watch;

/// Receiving side of a [`LatestSlot`].
pub type LatestReceiver<T> = watch::Receiver<Option<Arc<T>>>;

pub struct LatestSlot<T> {
    tx: watch::Sender<Option<Arc<T>>>,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Overwrite the slot and wake readers.
    pub fn publish(&self, value: T) {
        self.tx.send_replace(Some(Arc::new(value)));
    }

    /// Empty the slot.
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> LatestReceiver<T> {
        self.tx.subscribe()
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
