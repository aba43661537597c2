//! Runtime Dispatch: job dispatch over a fixed pool of execution runtimes
//!
//! Jobs are short textual command sequences (`"X(90), Y(0), Z(90)"`) run in
//! one of three modes. Each submitted job is recorded, placed on a free
//! runtime slot, executed, and its outcome persisted, with every lifecycle
//! transition visible through the [`JobStore`].
//!
//! # Overview
//!
//! - [`RuntimeSlot`] / [`RuntimePool`]: fixed exclusive execution capacity
//! - [`Runtime`]: the pluggable backend a slot executes on
//! - [`decode_error`]: result code → description
//! - [`JobStore`]: lifecycle persistence contract, with [`InMemoryJobStore`]
//! - [`Dispatcher`]: drives each job from `Scheduled` to a terminal status
//!
//! # Lifecycle
//!
//! ```text
//!   submit() ──→ Scheduled ──→ Started ⇄ Retrying ──→ Success | Runtime Error
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use runtime_dispatch::{DispatchConfig, Dispatcher, InMemoryJobStore, JobCommand, JobMode};
//!
//! let dispatcher = Dispatcher::with_lookup_runtime(
//!     DispatchConfig::default(),
//!     Arc::new(InMemoryJobStore::new()),
//! )?;
//! let id = dispatcher.submit(JobCommand::parse("X(0), Y(0), X(0)")?, JobMode::Echo).await?;
//! let record = dispatcher.wait_for(id, Duration::from_secs(10)).await?;
//! ```

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod pool;
pub mod result;
pub mod runtime;
pub mod slot;
pub mod store;

pub use command::{Axis, JobCommand, Rotation};
pub use config::DispatchConfig;
pub use dispatcher::{DispatchAvailability, Dispatcher};
pub use error::{ConfigError, DispatchError, DispatchResult, StoreError, StoreResult};
pub use job::{JobId, JobMode, JobRecord, JobStatus, JobUpdate};
pub use pool::RuntimePool;
pub use result::{Outcome, decode_error};
pub use runtime::{LookupRuntime, Runtime};
pub use slot::{RuntimeSlot, SlotId, SlotLease};
pub use store::{InMemoryJobStore, JobStore};
