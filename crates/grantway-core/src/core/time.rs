// crates/grantway-core/src/core/time.rs
// ============================================================================
// Module: Grantway Duration Parsing
// Description: Duration strings for appeal access windows.
// Purpose: Turn author-supplied duration text into concrete access lifetimes.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Appeal options carry access duration as text (`"1h"`, `"90m"`, `"1h30m"`).
//! The empty string and `"0"` are reserved for permanent access and handled by
//! the caller; everything else must parse as a sequence of integer magnitudes
//! with `s`, `m`, or `h` units. Parsing is deterministic and never consults
//! the wall clock; the core only adds parsed durations to caller-supplied
//! timestamps.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::Duration;

// ============================================================================
// SECTION: Parse Errors
// ============================================================================

/// Errors raised while parsing a duration string.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    /// The duration string is empty.
    #[error("duration string is empty")]
    Empty,
    /// A magnitude is missing before a unit.
    #[error("duration {raw:?} has a unit with no magnitude")]
    MissingMagnitude {
        /// Offending duration text.
        raw: String,
    },
    /// A magnitude has no trailing unit.
    #[error("duration {raw:?} has a magnitude with no unit")]
    MissingUnit {
        /// Offending duration text.
        raw: String,
    },
    /// An unknown unit character was found.
    #[error("duration {raw:?} has unknown unit {unit:?}")]
    UnknownUnit {
        /// Offending duration text.
        raw: String,
        /// Unrecognized unit character.
        unit: char,
    },
    /// A magnitude overflows the representable range.
    #[error("duration {raw:?} is out of range")]
    OutOfRange {
        /// Offending duration text.
        raw: String,
    },
}

// ============================================================================
// SECTION: Duration Parsing
// ============================================================================

/// Parses a duration string of the form `<int><unit>[<int><unit>...]`.
///
/// Supported units are `s` (seconds), `m` (minutes), and `h` (hours).
/// Segments accumulate, so `"1h30m"` parses to ninety minutes.
///
/// # Errors
///
/// Returns [`DurationParseError`] when the string is empty, a segment lacks a
/// magnitude or unit, a unit is unknown, or the total overflows.
pub fn parse_duration(raw: &str) -> Result<Duration, DurationParseError> {
    if raw.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let mut total = Duration::ZERO;
    let mut chars = raw.chars().peekable();
    while let Some(&next) = chars.peek() {
        if !next.is_ascii_digit() {
            if next_is_unit(next) {
                return Err(DurationParseError::MissingMagnitude {
                    raw: raw.to_string(),
                });
            }
            return Err(DurationParseError::UnknownUnit {
                raw: raw.to_string(),
                unit: next,
            });
        }

        let mut magnitude: i64 = 0;
        while let Some(&digit) = chars.peek() {
            let Some(value) = digit.to_digit(10) else {
                break;
            };
            chars.next();
            magnitude = magnitude
                .checked_mul(10)
                .and_then(|m| m.checked_add(i64::from(value)))
                .ok_or_else(|| DurationParseError::OutOfRange {
                    raw: raw.to_string(),
                })?;
        }

        let Some(unit) = chars.next() else {
            return Err(DurationParseError::MissingUnit {
                raw: raw.to_string(),
            });
        };
        let seconds_per_unit = match unit {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            other => {
                return Err(DurationParseError::UnknownUnit {
                    raw: raw.to_string(),
                    unit: other,
                });
            }
        };

        let seconds = magnitude.checked_mul(seconds_per_unit).ok_or_else(|| {
            DurationParseError::OutOfRange {
                raw: raw.to_string(),
            }
        })?;
        total = total
            .checked_add(Duration::seconds(seconds))
            .ok_or_else(|| DurationParseError::OutOfRange {
                raw: raw.to_string(),
            })?;
    }

    Ok(total)
}

/// Returns true when the character is a recognized unit.
const fn next_is_unit(next: char) -> bool {
    matches!(next, 's' | 'm' | 'h')
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::DurationParseError;
    use super::parse_duration;
    use time::Duration;

    type TestResult = Result<(), String>;

    fn assert_parses(raw: &str, expected: Duration) -> TestResult {
        match parse_duration(raw) {
            Ok(parsed) if parsed == expected => Ok(()),
            Ok(parsed) => Err(format!("{raw}: expected {expected}, got {parsed}")),
            Err(err) => Err(format!("{raw}: unexpected error {err}")),
        }
    }

    #[test]
    fn parses_single_segment() -> TestResult {
        assert_parses("1h", Duration::hours(1))
    }

    #[test]
    fn parses_compound_segments() -> TestResult {
        assert_parses("1h30m", Duration::minutes(90))?;
        assert_parses("90m", Duration::minutes(90))?;
        assert_parses("45s", Duration::seconds(45))
    }

    #[test]
    fn parses_zero_magnitude() -> TestResult {
        assert_parses("0s", Duration::ZERO)
    }

    #[test]
    fn rejects_empty_string() -> TestResult {
        match parse_duration("") {
            Err(DurationParseError::Empty) => Ok(()),
            other => Err(format!("expected empty error, got {other:?}")),
        }
    }

    #[test]
    fn rejects_missing_unit() -> TestResult {
        match parse_duration("15") {
            Err(DurationParseError::MissingUnit {
                ..
            }) => Ok(()),
            other => Err(format!("expected missing unit error, got {other:?}")),
        }
    }

    #[test]
    fn rejects_unknown_unit() -> TestResult {
        match parse_duration("3d") {
            Err(DurationParseError::UnknownUnit {
                unit: 'd', ..
            }) => Ok(()),
            other => Err(format!("expected unknown unit error, got {other:?}")),
        }
    }

    #[test]
    fn rejects_bare_unit() -> TestResult {
        match parse_duration("h") {
            Err(DurationParseError::MissingMagnitude {
                ..
            }) => Ok(()),
            other => Err(format!("expected missing magnitude error, got {other:?}")),
        }
    }
}
