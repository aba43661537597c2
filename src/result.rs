//! Runtime result codes.
//!
//! A runtime reports every execution attempt as a signed integer:
//!
//! | Code | Meaning | Dispatcher reaction |
//! |------|---------|---------------------|
//! | `< 0` | failed to start | mark `Retrying`, acquire again |
//! | `0` | completed | mark `Success` |
//! | `> 0` | completed with a domain error | mark `Runtime Error` with decoded text |

use serde::{Deserialize, Serialize};

/// Code returned by the reference runtime for a command it has no outcome for.
pub const UNRECOGNIZED_COMMAND: i32 = 4;

/// Text for any code outside [`KNOWN_ERRORS`].
pub const UNKNOWN_ERROR: &str = "Unknown Error";

/// Positive codes with a fixed description.
pub const KNOWN_ERRORS: &[(i32, &str)] = &[
    (1, "Error Code 1 TBD"),
    (2, "Error Code 2 TBD"),
    (3, "Error Code 3 TBD"),
];

/// Classification of a single execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The runtime could not start the job. Transient.
    FailedToStart(i32),
    /// The job ran to completion.
    Success,
    /// The job ran and the runtime reported a domain error.
    RuntimeError(i32),
}

impl Outcome {
    pub fn from_code(code: i32) -> Self {
        match code {
            c if c < 0 => Outcome::FailedToStart(c),
            0 => Outcome::Success,
            c => Outcome::RuntimeError(c),
        }
    }

    /// Whether the attempt should be retried on another acquisition pass.
    pub fn is_transient(&self) -> bool {
        matches!(self, Outcome::FailedToStart(_))
    }
}

/// Human-readable description of a result code.
///
/// Total: codes without an entry decode to [`UNKNOWN_ERROR`].
pub fn decode_error(code: i32) -> &'static str {
    KNOWN_ERRORS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, text)| *text)
        .unwrap_or(UNKNOWN_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_codes() {
        assert_eq!(decode_error(1), "Error Code 1 TBD");
        assert_eq!(decode_error(2), "Error Code 2 TBD");
        assert_eq!(decode_error(3), "Error Code 3 TBD");
    }

    #[test]
    fn test_decode_unknown_codes() {
        assert_eq!(decode_error(999), "Unknown Error");
        assert_eq!(decode_error(UNRECOGNIZED_COMMAND), "Unknown Error");
        assert_eq!(decode_error(0), "Unknown Error");
        assert_eq!(decode_error(i32::MIN), "Unknown Error");
    }

    #[test]
    fn test_outcome_from_code() {
        assert_eq!(Outcome::from_code(-3), Outcome::FailedToStart(-3));
        assert_eq!(Outcome::from_code(0), Outcome::Success);
        assert_eq!(Outcome::from_code(4), Outcome::RuntimeError(4));
        assert!(Outcome::from_code(-1).is_transient());
        assert!(!Outcome::from_code(1).is_transient());
    }
}
