//! Protocol-level messages sent to the Quad Cortex

use std::fmt;

use crate::error::ValidationError;
use crate::midi::MidiMessage;

/// The two message kinds the unit is driven with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    ProgramChange,
    ControlChange,
}

/// A validated outbound message
///
/// Only the encoder builds these; every field is range-checked on
/// construction and the value is immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolMessage {
    kind: ProtocolKind,
    channel: u8,
    payload: [u8; 2],
}

impl ProtocolMessage {
    pub(crate) fn program_change(channel: u8, program: u8) -> Result<Self, ValidationError> {
        ValidationError::check_range("channel", channel as i64, 0, 15)?;
        ValidationError::check_range("program", program as i64, 0, 127)?;
        Ok(Self {
            kind: ProtocolKind::ProgramChange,
            channel,
            payload: [program, 0],
        })
    }

    pub(crate) fn control_change(
        channel: u8,
        controller: u8,
        value: u8,
    ) -> Result<Self, ValidationError> {
        ValidationError::check_range("channel", channel as i64, 0, 15)?;
        ValidationError::check_range("controller", controller as i64, 0, 127)?;
        ValidationError::check_range("value", value as i64, 0, 127)?;
        Ok(Self {
            kind: ProtocolKind::ControlChange,
            channel,
            payload: [controller, value],
        })
    }

    pub fn kind(&self) -> ProtocolKind {
        self.kind
    }

    /// Zero-based MIDI channel
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Payload bytes: one for program change, two for control change
    pub fn payload(&self) -> &[u8] {
        match self.kind {
            ProtocolKind::ProgramChange => &self.payload[..1],
            ProtocolKind::ControlChange => &self.payload,
        }
    }

    pub fn to_midi(&self) -> MidiMessage {
        match self.kind {
            ProtocolKind::ProgramChange => MidiMessage::ProgramChange {
                channel: self.channel,
                program: self.payload[0],
            },
            ProtocolKind::ControlChange => MidiMessage::ControlChange {
                channel: self.channel,
                controller: self.payload[0],
                value: self.payload[1],
            },
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_midi().encode()
    }
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ProtocolKind::ProgramChange => {
                write!(f, "PC {} (ch {})", self.payload[0], self.channel + 1)
            }
            ProtocolKind::ControlChange => write!(
                f,
                "CC#{} = {} (ch {})",
                self.payload[0],
                self.payload[1],
                self.channel + 1
            ),
        }
    }
}
