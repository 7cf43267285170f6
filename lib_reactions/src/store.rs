//! # Snapshot Store (View State Holder)
//!
//! Holds the last known presentation snapshot. Exactly one writer (the
//! reconciliation controller) and any number of readers; writes are
//! whole-snapshot replacements, never partial field mutation, delivered
//! through a tokio `watch` channel so render layers can react to changes.
//!
//! Replacement is gated by a fetch sequence number: a write carrying a lower
//! sequence than the one already applied is discarded. This is the apply-side
//! half of the ordering-by-issuance rule in the reconciler.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::model::Presentation;

pub struct SnapshotStore {
    /// Sequence of the snapshot currently applied. 0 means "nothing yet".
    applied_seq: Mutex<u64>,
    tx: watch::Sender<Option<Arc<Presentation>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            applied_seq: Mutex::new(0),
            tx,
        }
    }

    /// Subscribes a reader. The receiver resolves on every applied
    /// replacement and starts out seeing the current value.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Presentation>>> {
        self.tx.subscribe()
    }

    /// The current snapshot, if any fetch has applied yet.
    pub fn current(&self) -> Option<Arc<Presentation>> {
        self.tx.borrow().clone()
    }

    /// Replaces the held snapshot iff `seq` is newer than the last applied
    /// sequence. Returns whether the snapshot was applied. The sequence
    /// check and the replacement are atomic with respect to other writers.
    pub fn replace_if_newer(&self, seq: u64, snapshot: Presentation) -> bool {
        let mut applied = self.applied_seq.lock().expect("snapshot store lock poisoned");
        if seq <= *applied {
            return false;
        }
        *applied = seq;
        self.tx.send_replace(Some(Arc::new(snapshot)));
        true
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
