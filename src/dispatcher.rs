//! The dispatcher.
//!
//! ```text
//!   submit() ──→ store.create (Scheduled) ──→ queue ──→ worker
//!                                                        │
//!        ┌───────────────────────────────────────────────┘
//!        ▼
//!   scan pool ──no slot──→ Retrying (once) ──→ wait for release / poll tick ──┐
//!        │  ▲                                                                 │
//!        │  └─────────────────────────────────────────────────────────────────┘
//!        ▼ slot
//!   Started ──→ execute ──→ code < 0 : Retrying, scan again
//!                           code = 0 : Success
//!                           code > 0 : Runtime Error + decoded text
//! ```
//!
//! A fixed number of workers drain a bounded queue; each worker drives one job
//! at a time from `Scheduled` to a terminal state. Workers race for slots and
//! rely only on the slot's exclusive acquire; there is no global ordering.
//!
//! A job's status only advances once the store has accepted the write.
//!
//! Writes made before a job is `Started` are retried
//! [`store_retry_attempts`](DispatchConfig::store_retry_attempts) times; if
//! they keep failing the dispatch is aborted and the record stays at its last
//! persisted status. Once `Started` is persisted the record names a slot, so
//! the write that moves it on is retried with backoff until the store accepts
//! it. A finished job keeps its slot until its terminal status lands, so a
//! store that never recovers pins that slot and blocks
//! [`Dispatcher::shutdown`].
//!
//! At most one record is `Started` per slot, with one exception: after a
//! failed start the slot is released inside
//! [`SlotLease::execute`](crate::slot::SlotLease::execute) before `Retrying`
//! is written. Until that write lands, another job can be `Started` on the
//! same slot while this record still reads `Started`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

use crate::command::JobCommand;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::job::{JobId, JobMode, JobRecord, JobStatus, JobUpdate};
use crate::pool::{RuntimePool, wait_for_release};
use crate::result::Outcome;
use crate::runtime::LookupRuntime;
use crate::store::JobStore;

/// Bounds on the pause between attempts of a write that must land.
const MIN_STORE_BACKOFF: Duration = Duration::from_millis(10);
const MAX_STORE_BACKOFF: Duration = Duration::from_secs(30);

/// A job handed from `submit()` to a worker.
#[derive(Debug)]
struct QueuedJob {
    id: JobId,
    command: JobCommand,
    mode: JobMode,
}

/// Capacity snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchAvailability {
    /// Slots in the pool.
    pub pool_size: usize,
    /// Slots no job holds right now.
    pub free_slots: usize,
    /// Jobs accepted but not yet picked up by a worker.
    pub queue_depth: usize,
}

/// Shared state of every worker.
struct DispatchContext {
    store: Arc<dyn JobStore>,
    pool: Arc<RuntimePool>,
    config: DispatchConfig,
}

/// Accepts jobs, records them and drives each one over the runtime pool.
///
/// Every method takes `&self`, so it can be shared behind an `Arc`.
pub struct Dispatcher {
    ctx: Arc<DispatchContext>,
    queue: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn `config.workers` workers over `pool`. Must run inside a Tokio runtime.
    pub fn start(
        config: DispatchConfig,
        store: Arc<dyn JobStore>,
        pool: Arc<RuntimePool>,
    ) -> DispatchResult<Self> {
        config.validate()?;
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let ctx = Arc::new(DispatchContext {
            store,
            pool,
            config,
        });

        let workers = (0..ctx.config.workers)
            .map(|worker| tokio::spawn(worker_loop(worker, ctx.clone(), rx.clone())))
            .collect();

        tracing::info!(
            pool_size = ctx.pool.len(),
            workers = ctx.config.workers,
            queue_capacity = ctx.config.queue_capacity,
            "Dispatcher started"
        );

        Ok(Self {
            ctx,
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    /// Dispatcher over a pool of `config.pool_size` reference lookup runtimes.
    pub fn with_lookup_runtime(
        config: DispatchConfig,
        store: Arc<dyn JobStore>,
    ) -> DispatchResult<Self> {
        config.validate()?;
        let runtime = Arc::new(LookupRuntime::new(config.execution_delay));
        let pool = Arc::new(RuntimePool::new(config.pool_size, runtime));
        Self::start(config, store, pool)
    }

    /// Settings the dispatcher was started with.
    pub fn config(&self) -> &DispatchConfig {
        &self.ctx.config
    }

    /// The pool jobs run on.
    pub fn pool(&self) -> &Arc<RuntimePool> {
        &self.ctx.pool
    }

    /// Record the job as `Scheduled` and queue it. Returns as soon as it is queued.
    ///
    /// A full queue is refused before anything is written.
    pub async fn submit(&self, command: JobCommand, mode: JobMode) -> DispatchResult<JobId> {
        let sender = self.sender()?;
        let permit = sender.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => DispatchError::QueueFull(self.ctx.config.queue_capacity),
            TrySendError::Closed(()) => DispatchError::ShuttingDown,
        })?;

        let id = self.ctx.store.create(command.as_str(), mode).await?;
        tracing::info!(job_id = %id, command = %command, mode = %mode, "Job scheduled");
        permit.send(QueuedJob { id, command, mode });
        Ok(id)
    }

    /// Current record of one job.
    pub async fn get(&self, id: JobId) -> DispatchResult<JobRecord> {
        Ok(self.ctx.store.get(id).await?)
    }

    /// Every record, in id order.
    pub async fn list(&self) -> DispatchResult<Vec<JobRecord>> {
        Ok(self.ctx.store.list().await?)
    }

    /// Poll the store until `id` is terminal or `timeout` passes.
    pub async fn wait_for(&self, id: JobId, timeout: Duration) -> DispatchResult<JobRecord> {
        let poll_interval = self.ctx.config.poll_interval.min(Duration::from_millis(100));
        let deadline = Instant::now() + timeout;

        loop {
            let record = self.get(id).await?;
            if record.status.is_terminal() {
                return Ok(record);
            }
            if Instant::now() >= deadline {
                return Err(DispatchError::Timeout(id));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Free slots and queued jobs right now. Stale as soon as it returns.
    pub fn availability(&self) -> DispatchAvailability {
        let queue_depth = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0);
        DispatchAvailability {
            pool_size: self.ctx.pool.len(),
            free_slots: self.ctx.pool.available(),
            queue_depth,
        }
    }

    /// Stop accepting jobs and wait for queued and in-flight ones to finish.
    pub async fn shutdown(&self) {
        drop(self.queue.lock().unwrap_or_else(PoisonError::into_inner).take());
        let workers = {
            let mut guard = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Dispatch worker panicked");
            }
        }
        tracing::info!("Dispatcher stopped");
    }

    fn sender(&self) -> DispatchResult<mpsc::Sender<QueuedJob>> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DispatchError::ShuttingDown)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.ctx.config)
            .field("pool", &self.ctx.pool)
            .finish_non_exhaustive()
    }
}

async fn worker_loop(
    worker: usize,
    ctx: Arc<DispatchContext>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedJob>>>,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };

        let id = job.id;
        let span = tracing::info_span!("dispatch", worker, job_id = %id);
        match ctx.run(job).instrument(span).await {
            Ok(status) => tracing::info!(job_id = %id, status = %status, "Job finished"),
            Err(e) => tracing::error!(job_id = %id, error = %e, "Dispatch aborted"),
        }
    }
    tracing::debug!(worker, "Dispatch worker exiting");
}

impl DispatchContext {
    /// Drive one job to a terminal status.
    async fn run(&self, job: QueuedJob) -> DispatchResult<JobStatus> {
        let QueuedJob { id, command, mode } = job;
        let mut status = JobStatus::Scheduled;
        let mut waiting_since = Instant::now();

        loop {
            let released = self.pool.released();
            tokio::pin!(released);
            released.as_mut().enable();

            let Some(mut lease) = self.pool.try_acquire(id) else {
                if status == JobStatus::Scheduled {
                    self.persist(id, JobUpdate::retrying()).await?;
                    status = JobStatus::Retrying;
                }
                if let Some(max_wait) = self.config.max_wait {
                    if waiting_since.elapsed() >= max_wait {
                        tracing::warn!(job_id = %id, ?max_wait, "No runtime slot within wait bound");
                        self.persist(id, JobUpdate::starved()).await?;
                        return Ok(JobStatus::Starved);
                    }
                }
                wait_for_release(released, self.config.poll_interval).await;
                continue;
            };

            let slot_id = lease.slot_id();
            self.persist(id, JobUpdate::started(slot_id)).await?;
            tracing::info!(job_id = %id, slot_id = %slot_id, "Job started");

            let code = lease.execute(command.as_str(), mode).await;
            let update = JobUpdate::from_result(code);
            let next = update.status;

            match Outcome::from_code(code) {
                Outcome::FailedToStart(_) => {
                    tracing::warn!(job_id = %id, slot_id = %slot_id, code, "Runtime failed to start job");
                    self.persist_until_accepted(id, update).await?;
                    status = JobStatus::Retrying;
                    waiting_since = Instant::now();
                }
                Outcome::Success | Outcome::RuntimeError(_) => {
                    self.persist_until_accepted(id, update).await?;
                    drop(lease);
                    tracing::debug!(job_id = %id, slot_id = %slot_id, code, "Slot released");
                    return Ok(next);
                }
            }
        }
    }

    /// Write one transition, retrying transient store failures a bounded
    /// number of times.
    async fn persist(&self, id: JobId, update: JobUpdate) -> DispatchResult<()> {
        let mut attempt = 0;
        loop {
            match self.store.update(id, update.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.config.store_retry_attempts => {
                    attempt += 1;
                    tracing::warn!(
                        job_id = %id,
                        status = %update.status,
                        attempt,
                        error = %e,
                        "Store write failed, retrying"
                    );
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Write the transition out of `Started`, retrying transient store
    /// failures with doubling backoff for as long as they last.
    async fn persist_until_accepted(&self, id: JobId, update: JobUpdate) -> DispatchResult<()> {
        let mut backoff = self.config.poll_interval.max(MIN_STORE_BACKOFF);
        let mut attempt: u32 = 0;
        loop {
            match self.store.update(id, update.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() => {
                    attempt = attempt.saturating_add(1);
                    tracing::warn!(
                        job_id = %id,
                        status = %update.status,
                        attempt,
                        ?backoff,
                        error = %e,
                        "Store write failed, slot held until it lands"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2).min(MAX_STORE_BACKOFF);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
