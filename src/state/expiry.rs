use std::time::SystemTime;

use dashmap::DashMap;
use uuid::Uuid;

/// Expiry timer armed for one run of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingExpiry {
    pub epoch: u64,
    pub deadline: SystemTime,
}

/// Latest expiry timer armed per activity.
///
/// Timers from earlier runs may still be sleeping; they are superseded here and
/// find a newer epoch when they wake up.
#[derive(Default)]
pub struct ExpiryRegistry {
    pending: DashMap<Uuid, PendingExpiry>,
}

impl ExpiryRegistry {
    /// Record a timer, replacing any timer from an older epoch.
    pub fn arm(&self, activity_id: Uuid, expiry: PendingExpiry) {
        self.pending
            .entry(activity_id)
            .and_modify(|current| {
                if expiry.epoch >= current.epoch {
                    *current = expiry;
                }
            })
            .or_insert(expiry);
    }

    /// Forget the timer of `epoch` once it has fired.
    pub fn disarm(&self, activity_id: Uuid, epoch: u64) {
        self.pending
            .remove_if(&activity_id, |_, current| current.epoch == epoch);
    }

    /// Forget every timer of an activity.
    pub fn clear(&self, activity_id: Uuid) {
        self.pending.remove(&activity_id);
    }

    pub fn get(&self, activity_id: Uuid) -> Option<PendingExpiry> {
        self.pending.get(&activity_id).map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
