//! Sync progress reporting
//!
//! An explicit listener registry: consumers subscribe, the engine invokes
//! listeners synchronously at checkpoints. No global event bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::models::Collection;

/// Phase a progress checkpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Pushing pending local records
    Upload,
    /// Paging through the remote listing
    Download,
    /// The whole run has finished
    Complete,
}

/// A progress checkpoint emitted during a sync run.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: SyncPhase,
    pub collection: Option<Collection>,
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// Handle returned by [`ProgressNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Listener registry for sync progress events.
#[derive(Default)]
pub struct ProgressNotifier {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl ProgressNotifier {
    /// Register a listener; it is invoked synchronously on every checkpoint
    /// until unsubscribed.
    pub fn subscribe(
        &self,
        listener: impl Fn(&ProgressEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((id, Box::new(listener)));
        SubscriptionId(id)
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|(id, _)| *id != subscription.0);
    }

    pub(crate) fn emit(&self, event: &ProgressEvent) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_, listener) in listeners.iter() {
            listener(event);
        }
    }
}
