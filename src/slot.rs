//! Runtime slots.
//!
//! A slot is one unit of exclusive execution capacity. Its owner field is the
//! mutual-exclusion device: `None` means available, `Some(job)` means that job
//! holds it. The field is only read and written under the slot's own lock, and
//! the check-then-set in [`RuntimeSlot::try_acquire`] happens inside a single
//! critical section.
//!
//! A successful acquire yields a [`SlotLease`]. The lease releases the slot
//! exactly once: explicitly, on a failed start inside
//! [`SlotLease::execute`], or when dropped.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::job::{JobId, JobMode};
use crate::runtime::Runtime;

/// Stable slot identity, `1..=N` in pool order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(pub u32);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One executable unit in a [`RuntimePool`](crate::pool::RuntimePool).
pub struct RuntimeSlot {
    id: SlotId,
    owner: Mutex<Option<JobId>>,
    runtime: Arc<dyn Runtime>,
    released: Arc<Notify>,
}

impl RuntimeSlot {
    pub(crate) fn new(id: SlotId, runtime: Arc<dyn Runtime>, released: Arc<Notify>) -> Self {
        Self {
            id,
            owner: Mutex::new(None),
            runtime,
            released,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn runtime(&self) -> &dyn Runtime {
        self.runtime.as_ref()
    }

    /// Claim the slot for `job`. Returns `true` iff the caller now owns it.
    ///
    /// Never blocks on availability; a caller that loses must retry later.
    pub fn try_acquire(&self, job: JobId) -> bool {
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        if owner.is_some() {
            return false;
        }
        *owner = Some(job);
        true
    }

    /// Mark the slot available again and wake anyone waiting on the pool.
    ///
    /// Returns the job that held it, if any.
    pub fn release(&self) -> Option<JobId> {
        let previous = self
            .owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            self.released.notify_waiters();
        }
        previous
    }

    pub fn is_available(&self) -> bool {
        self.owner().is_none()
    }

    /// Job currently holding the slot.
    pub fn owner(&self) -> Option<JobId> {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RuntimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeSlot")
            .field("id", &self.id)
            .field("owner", &self.owner())
            .field("runtime", &self.runtime.name())
            .finish()
    }
}

/// Exclusive hold on a slot for one job.
#[derive(Debug)]
pub struct SlotLease {
    slot: Arc<RuntimeSlot>,
    job: JobId,
    released: bool,
}

impl SlotLease {
    /// Acquire `slot` for `job`, or `None` if someone else holds it.
    pub fn try_new(slot: Arc<RuntimeSlot>, job: JobId) -> Option<Self> {
        slot.try_acquire(job).then(|| Self {
            slot,
            job,
            released: false,
        })
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot.id()
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Run the job on this slot's runtime.
    ///
    /// A negative code means the job never started; the slot is released
    /// before returning so it can be acquired again straight away.
    pub async fn execute(&mut self, command: &str, mode: JobMode) -> i32 {
        let code = self.slot.runtime().execute(command, mode).await;
        if code < 0 {
            self.release();
        }
        code
    }

    /// Give the slot back. Later calls are no-ops.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.slot.release() != Some(self.job) {
            tracing::warn!(
                slot_id = %self.slot.id(),
                job_id = %self.job,
                "Released slot was not owned by this lease"
            );
        }
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.release();
    }
}
