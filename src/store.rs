//! Job store trait and the in-memory store.
//!
//! The dispatcher persists every lifecycle transition through a [`JobStore`].
//! Any storage engine can sit behind the trait as long as it honours the
//! contract below.
//!
//! ## Contract
//!
//! | Method | Returns |
//! |--------|---------|
//! | `create()` | fresh `JobId`, record in `Scheduled` |
//! | `update()` | `()` once the write is durable |
//! | `get()` | `JobRecord` |
//! | `list()` | all records, ascending id |
//!
//! - Ids are assigned by the store, increase monotonically and are never reused.
//! - `update()` MUST reject transitions that [`JobStatus::can_transition_to`]
//!   refuses, leaving the record as it was.
//! - A call returns only after the write is persisted.
//! - Calls for distinct ids may arrive concurrently.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::job::{JobId, JobMode, JobRecord, JobStatus, JobUpdate};

/// Persistence for job lifecycle records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a `Scheduled` record and return its id.
    async fn create(&self, command: &str, mode: JobMode) -> StoreResult<JobId>;

    /// Apply one lifecycle transition.
    async fn update(&self, id: JobId, update: JobUpdate) -> StoreResult<()>;

    /// Fetch one record.
    async fn get(&self, id: JobId) -> StoreResult<JobRecord>;

    /// All records in ascending id order.
    async fn list(&self) -> StoreResult<Vec<JobRecord>>;
}

/// Check an update against the record it targets.
pub fn check_transition(record: &JobRecord, update: &JobUpdate) -> StoreResult<()> {
    if record.status.can_transition_to(update.status) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            id: record.id,
            from: record.status,
            to: update.status,
        })
    }
}

#[derive(Debug, Default)]
struct Table {
    last_id: u64,
    rows: BTreeMap<JobId, JobRecord>,
}

/// In-memory implementation for development and testing.
///
/// Records are never evicted.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    table: RwLock<Table>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.table.read().map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records currently in `status`.
    pub fn count_in(&self, status: JobStatus) -> usize {
        self.table
            .read()
            .map(|t| t.rows.values().filter(|r| r.status == status).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, command: &str, mode: JobMode) -> StoreResult<JobId> {
        let mut table = self
            .table
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        table.last_id += 1;
        let id = JobId(table.last_id);
        table.rows.insert(id, JobRecord::scheduled(id, command, mode));
        Ok(id)
    }

    async fn update(&self, id: JobId, update: JobUpdate) -> StoreResult<()> {
        let mut table = self
            .table
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let record = table.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        check_transition(record, &update)?;
        record.apply(update);
        Ok(())
    }

    async fn get(&self, id: JobId) -> StoreResult<JobRecord> {
        let table = self
            .table
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        table.rows.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> StoreResult<Vec<JobRecord>> {
        let table = self
            .table
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(table.rows.values().cloned().collect())
    }
}
