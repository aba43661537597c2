//! Job lifecycle types.
//!
//! The job state machine:
//!
//! ```text
//!   submit() ──→ Scheduled ──→ Started ──→ Success
//!                   │  │         │  ▲ │
//!                   │  │         ▼  │ └──→ Runtime Error
//!                   │  └────→ Retrying
//!                   │            │
//!                   └────────────┴──→ Starved   (only with a wait bound)
//! ```
//!
//! **Invariants:**
//! - `submit()` returns an id whose record is `Scheduled`.
//! - The only cycle is `Started ↔ Retrying`.
//! - Terminal states (`Success`, `Runtime Error`, `Starved`) are permanent.
//! - `created_at`, `started_at`, `ended_at` are each written once, in that order.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::result::{Outcome, decode_error};
use crate::slot::SlotId;

/// Store-assigned job identifier. Monotonically increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Which execution path on the runtime a job takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    /// Run the command as given on the real runtime.
    Verbatim,
    /// Run the command on a simulation of the runtime.
    Simulation,
    /// Return the canned outcome for the command without running anything.
    Echo,
}

impl JobMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::Verbatim => "verbatim",
            JobMode::Simulation => "simulation",
            JobMode::Echo => "echo",
        }
    }
}

impl FromStr for JobMode {
    type Err = DispatchError;

    /// Case-insensitive; anything outside the three modes is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "verbatim" => Ok(JobMode::Verbatim),
            "simulation" => Ok(JobMode::Simulation),
            "echo" => Ok(JobMode::Echo),
            _ => Err(DispatchError::InvalidMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for JobMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Recorded, not yet placed on a runtime slot.
    Scheduled,
    /// Holding a slot and executing.
    Started,
    /// Waiting for a slot, either after a failed start or because the pool was full.
    Retrying,
    /// Ran to completion with result code 0.
    Success,
    /// Ran to completion with a positive result code.
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    /// Gave up waiting for a slot (only when a wait bound is configured).
    Starved,
}

impl JobStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::RuntimeError | JobStatus::Starved
        )
    }

    /// Check if the job is still waiting for or holding a slot.
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether a record in this state may be moved to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Scheduled, Started | Retrying | Starved)
                | (Started, Retrying | Success | RuntimeError)
                | (Retrying, Started | Starved)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Scheduled => write!(f, "Scheduled"),
            JobStatus::Started => write!(f, "Started"),
            JobStatus::Retrying => write!(f, "Retrying"),
            JobStatus::Success => write!(f, "Success"),
            JobStatus::RuntimeError => write!(f, "Runtime Error"),
            JobStatus::Starved => write!(f, "Starved"),
        }
    }
}

/// Persisted lifecycle record for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub command: String,
    pub mode: JobMode,
    pub status: JobStatus,
    /// Slot the job was last placed on.
    pub assigned_runtime: Option<SlotId>,
    /// Result code of the most recent execution attempt.
    pub result_code: Option<i32>,
    /// Decoded text, present only when `result_code` is positive.
    pub error_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// A fresh `Scheduled` record.
    pub fn scheduled(id: JobId, command: impl Into<String>, mode: JobMode) -> Self {
        Self {
            id,
            command: command.into(),
            mode,
            status: JobStatus::Scheduled,
            assigned_runtime: None,
            result_code: None,
            error_text: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Apply an update, stamping `started_at`/`ended_at` the first time they apply.
    ///
    /// Callers check the transition first; this only mutates.
    pub(crate) fn apply(&mut self, update: JobUpdate) {
        let now = Utc::now();
        self.status = update.status;
        if let Some(slot) = update.assigned_runtime {
            self.assigned_runtime = Some(slot);
        }
        if let Some(code) = update.result_code {
            self.result_code = Some(code);
            self.error_text = update.error_text;
        }
        if update.status == JobStatus::Started && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if update.status.is_terminal() && self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
    }

    /// Read-only view handed to the transport layer.
    pub fn to_view(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id.0,
            "job": self.command,
            "mode": self.mode.as_str(),
            "status": self.status.to_string(),
            "runtime": self.assigned_runtime.map(|s| s.0),
            "return_code": self.result_code,
            "runtime_error": self.error_text,
            "created_time": self.created_at.to_rfc3339(),
            "start_time": self.started_at.map(|t| t.to_rfc3339()),
            "end_time": self.ended_at.map(|t| t.to_rfc3339()),
        })
    }
}

/// One lifecycle write against a [`JobRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub assigned_runtime: Option<SlotId>,
    pub result_code: Option<i32>,
    pub error_text: Option<String>,
}

impl JobUpdate {
    fn status_only(status: JobStatus) -> Self {
        Self {
            status,
            assigned_runtime: None,
            result_code: None,
            error_text: None,
        }
    }

    /// Job has been placed on `slot`.
    pub fn started(slot: SlotId) -> Self {
        Self {
            assigned_runtime: Some(slot),
            ..Self::status_only(JobStatus::Started)
        }
    }

    /// Job is waiting for a slot with no new result code.
    pub fn retrying() -> Self {
        Self::status_only(JobStatus::Retrying)
    }

    /// Job gave up waiting for a slot.
    pub fn starved() -> Self {
        Self::status_only(JobStatus::Starved)
    }

    /// Update for an execution attempt that returned `code`.
    pub fn from_result(code: i32) -> Self {
        let (status, error_text) = match Outcome::from_code(code) {
            Outcome::FailedToStart(_) => (JobStatus::Retrying, None),
            Outcome::Success => (JobStatus::Success, None),
            Outcome::RuntimeError(code) => (JobStatus::RuntimeError, Some(decode_error(code))),
        };
        Self {
            status,
            assigned_runtime: None,
            result_code: Some(code),
            error_text: error_text.map(str::to_string),
        }
    }
}
