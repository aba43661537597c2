//! The runtime pool.
//!
//! A fixed, ordered set of [`RuntimeSlot`]s created once at startup. Slots are
//! never added or removed.
//!
//! Acquisition scans slots in id order and takes the first one that accepts.
//! There is no queue and no fairness: a slot freed while several jobs wait
//! goes to whichever scan reaches it first, so under sustained load a job can
//! keep losing to later arrivals and starve. Bound the wait with
//! [`DispatchConfig::max_wait`](crate::config::DispatchConfig::max_wait) if
//! that matters.
//!
//! Waiters are woken as soon as any slot is released, with the poll interval
//! as a fallback tick.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::sync::futures::Notified;

use crate::job::JobId;
use crate::runtime::Runtime;
use crate::slot::{RuntimeSlot, SlotId, SlotLease};

/// Fixed set of runtime slots sharing one release signal.
#[derive(Debug)]
pub struct RuntimePool {
    slots: Vec<Arc<RuntimeSlot>>,
    released: Arc<Notify>,
}

impl RuntimePool {
    /// `size` slots sharing one runtime backend.
    pub fn new(size: usize, runtime: Arc<dyn Runtime>) -> Self {
        Self::from_fn(size, |_| runtime.clone())
    }

    /// `size` slots, each with the runtime returned for its id.
    pub fn from_fn(size: usize, mut make: impl FnMut(SlotId) -> Arc<dyn Runtime>) -> Self {
        let released = Arc::new(Notify::new());
        let slots = (1..=size as u32)
            .map(SlotId)
            .map(|id| Arc::new(RuntimeSlot::new(id, make(id), released.clone())))
            .collect();
        Self { slots, released }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` only for a pool built with no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots, in id order.
    pub fn slots(&self) -> &[Arc<RuntimeSlot>] {
        &self.slots
    }

    /// Look up a slot by id.
    pub fn slot(&self, id: SlotId) -> Option<&Arc<RuntimeSlot>> {
        self.slots.iter().find(|s| s.id() == id)
    }

    /// Number of slots nobody holds right now.
    pub fn available(&self) -> usize {
        self.slots.iter().filter(|s| s.is_available()).count()
    }

    /// Current owner of every slot, in pool order.
    pub fn snapshot(&self) -> Vec<(SlotId, Option<JobId>)> {
        self.slots.iter().map(|s| (s.id(), s.owner())).collect()
    }

    /// One first-fit pass over the pool.
    pub fn try_acquire(&self, job: JobId) -> Option<SlotLease> {
        self.slots
            .iter()
            .find_map(|slot| SlotLease::try_new(slot.clone(), job))
    }

    /// Future that completes on the next slot release.
    ///
    /// Enable it before scanning so a release that lands between the scan
    /// and the wait still wakes the caller.
    pub fn released(&self) -> Notified<'_> {
        self.released.notified()
    }
}

/// Wait on an enabled [`RuntimePool::released`] future, giving up after `interval`.
pub async fn wait_for_release(released: Pin<&mut Notified<'_>>, interval: Duration) {
    tokio::select! {
        _ = released => {}
        _ = tokio::time::sleep(interval) => {}
    }
}
