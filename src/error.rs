//! Error types shared across the bridge
//!
//! Validation and transport failures are kept apart so the dispatch loop can
//! report them as distinct terminal states.

use thiserror::Error;

/// A command parameter fell outside its declared domain
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} {value} is out of range (valid: {min}-{max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{field} must be a positive number, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} {value} is too slow to schedule")]
    TooSlow { field: &'static str, value: f64 },

    #[error("unknown {field} '{name}'")]
    UnknownName { field: &'static str, name: String },
}

impl ValidationError {
    /// Check `value` against an inclusive range
    pub(crate) fn check_range(
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    ) -> Result<(), Self> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(ValidationError::OutOfRange { field, value, min, max })
        }
    }
}

/// The MIDI transport could not be opened or stopped accepting messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{direction} port '{pattern}' not found")]
    PortNotFound {
        direction: &'static str,
        pattern: String,
    },

    #[error("failed to initialize MIDI client: {0}")]
    Init(String),

    #[error("failed to connect to '{port}': {reason}")]
    Connect { port: String, reason: String },

    #[error("MIDI send failed: {0}")]
    Send(String),

    #[error("MIDI port closed")]
    Closed,
}

/// Any failure that ends a dispatch run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
