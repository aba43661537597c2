//! Runtime trait and the reference lookup runtime.
//!
//! A [`Runtime`] is the black box a slot runs jobs on. The dispatcher only
//! sees the signed result code described in [`crate::result`]; what a job
//! physically does is up to the implementation.
//!
//! ## Contract
//!
//! | Method | Kind | Returns |
//! |--------|------|---------|
//! | `name()` | sync | `&str` |
//! | `execute()` | async | `i32` result code |
//!
//! `execute` occupies the calling task for the whole run. It must not return
//! a negative code for a job that actually ran.

use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::job::JobMode;
use crate::result::UNRECOGNIZED_COMMAND;

/// Trait for execution backends.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Get the name of this runtime.
    fn name(&self) -> &str;

    /// Run `command` through the path selected by `mode`.
    ///
    /// Negative: failed to start. Zero: success. Positive: domain error code.
    async fn execute(&self, command: &str, mode: JobMode) -> i32;
}

/// Runtime that answers from a fixed command → code table after a fixed delay.
///
/// Each mode has its own path; the three currently share the table.
#[derive(Debug, Clone)]
pub struct LookupRuntime {
    outcomes: FxHashMap<String, i32>,
    delay: Duration,
}

impl LookupRuntime {
    /// The reference table.
    pub fn new(delay: Duration) -> Self {
        Self::from_pairs(
            [
                ("X(0), Y(0), X(0)", 0),
                ("X(90), Y(0), Z(90)", 1),
                ("Z(0), Z(180), X(90)", 2),
                ("Z(90), Y(180), X(0)", 3),
            ],
            delay,
        )
    }

    /// Build a runtime from an iterator of (command, code) pairs.
    pub fn from_pairs(
        iter: impl IntoIterator<Item = (impl Into<String>, i32)>,
        delay: Duration,
    ) -> Self {
        Self {
            outcomes: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            delay,
        }
    }

    /// Simulated duration of one execution.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Real-runtime path.
    async fn run(&self, command: &str) -> i32 {
        tokio::time::sleep(self.delay).await;
        self.lookup(command)
    }

    /// Simulation path.
    async fn simulate(&self, command: &str) -> i32 {
        tokio::time::sleep(self.delay).await;
        self.lookup(command)
    }

    /// Echo path.
    async fn echo(&self, command: &str) -> i32 {
        tokio::time::sleep(self.delay).await;
        self.lookup(command)
    }

    fn lookup(&self, command: &str) -> i32 {
        self.outcomes
            .get(command)
            .copied()
            .unwrap_or(UNRECOGNIZED_COMMAND)
    }
}

#[async_trait]
impl Runtime for LookupRuntime {
    fn name(&self) -> &str {
        "lookup"
    }

    async fn execute(&self, command: &str, mode: JobMode) -> i32 {
        match mode {
            JobMode::Verbatim => self.run(command).await,
            JobMode::Simulation => self.simulate(command).await,
            JobMode::Echo => self.echo(command).await,
        }
    }
}
