//! Typed job commands.
//!
//! A job string is a comma-separated list of axis rotations:
//!
//! ```text
//!   AXIS(ANGLE)(, AXIS(ANGLE))*      AXIS ∈ {X, Y, Z}, ANGLE = 1..3 digits
//! ```
//!
//! The dispatcher only accepts a [`JobCommand`], so any text that reaches a
//! runtime has already passed this check. The submitted text is kept as-is
//! because runtimes key their outcomes on the exact string.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Format hint returned with every rejection.
pub const EXPECTED_FORMAT: &str = "{Axis}({Angle}), {Axis}({Angle}), ...";

/// Whole-string grammar. Digits are ASCII only.
static COMMAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[XYZ]\([0-9]{1,3}\)(, [XYZ]\([0-9]{1,3}\))*$").unwrap()
});

/// One step, applied only to text that already matched [`COMMAND_PATTERN`].
static ROTATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([XYZ])\(([0-9]{1,3})\)").unwrap());

/// Rotation axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'X' => Some(Axis::X),
            'Y' => Some(Axis::Y),
            'Z' => Some(Axis::Z),
            _ => None,
        }
    }
}

/// One `AXIS(ANGLE)` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rotation {
    pub axis: Axis,
    /// Angle in degrees, at most three digits.
    pub angle: u16,
}

/// A job string that matches the axis/angle grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCommand {
    text: String,
    rotations: Vec<Rotation>,
}

impl JobCommand {
    /// Parse and validate a job string.
    pub fn parse(text: &str) -> Result<Self, DispatchError> {
        let rotations = rotations(text)
            .ok_or_else(|| DispatchError::InvalidCommand(format!("expected {EXPECTED_FORMAT}")))?;

        Ok(Self {
            text: text.to_string(),
            rotations,
        })
    }

    /// The command exactly as submitted.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The parsed steps, in submission order.
    pub fn rotations(&self) -> &[Rotation] {
        &self.rotations
    }
}

fn rotations(text: &str) -> Option<Vec<Rotation>> {
    if !COMMAND_PATTERN.is_match(text) {
        return None;
    }
    ROTATION_PATTERN
        .captures_iter(text)
        .map(|caps| {
            Some(Rotation {
                axis: Axis::from_char(caps[1].chars().next()?)?,
                angle: caps[2].parse().ok()?,
            })
        })
        .collect()
}

impl FromStr for JobCommand {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for JobCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_commands() {
        let cmd = JobCommand::parse("X(90), Y(180), X(90)").unwrap();
        assert_eq!(cmd.as_str(), "X(90), Y(180), X(90)");
        assert_eq!(
            cmd.rotations(),
            &[
                Rotation { axis: Axis::X, angle: 90 },
                Rotation { axis: Axis::Y, angle: 180 },
                Rotation { axis: Axis::X, angle: 90 },
            ]
        );

        let cmd = JobCommand::parse("Z(999)").unwrap();
        assert_eq!(cmd.rotations().len(), 1);
        assert_eq!(cmd.rotations()[0].angle, 999);
    }

    #[test]
    fn test_parse_rejects_malformed_commands() {
        for input in [
            "aX(0), Y(0), X(0)",
            "X(0), Y(0), X(0)b",
            "X(0), cY(0), X(0)",
            "X(0",
            ", X(0)",
            "X(1000)",
            "X()",
            "x(0)",
            "X(0),Y(0)",
            "X(0),  Y(0)",
            "X(+1)",
            "X(0)\n",
            "X(\u{0663})",
            "",
        ] {
            let err = JobCommand::parse(input).unwrap_err();
            assert!(
                matches!(err, DispatchError::InvalidCommand(_)),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejection_carries_format_hint() {
        let err = "W(1)".parse::<JobCommand>().unwrap_err();
        assert!(err.to_string().contains(EXPECTED_FORMAT));
    }
}
