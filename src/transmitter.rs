//! Command transmitter
//!
//! Owns the outbound MIDI connection. Messages are forwarded in call order:
//! nothing is buffered, reordered or retried, and transport failures go
//! straight back to the caller.

use parking_lot::Mutex;
use tracing::{info, trace};

use crate::error::TransportError;
use crate::midi::format_hex;
use crate::protocol::ProtocolMessage;

/// Anything that accepts raw outbound MIDI bytes
pub trait MidiSink: Send {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

impl MidiSink for midir::MidiOutputConnection {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        midir::MidiOutputConnection::send(self, bytes).map_err(|e| TransportError::Send(e.to_string()))
    }
}

/// Outbound side of the bridge
///
/// The sink sits behind a mutex so the dispatch path and a pending tap
/// pulse can share one connection without interleaving bytes.
pub struct Transmitter {
    sink: Mutex<Box<dyn MidiSink>>,
    channel: u8,
    trace: bool,
}

impl Transmitter {
    /// Create a transmitter addressing the unit on `channel` (0-15)
    pub fn new(sink: Box<dyn MidiSink>, channel: u8) -> Self {
        Self {
            sink: Mutex::new(sink),
            channel,
            trace: false,
        }
    }

    /// Log every outbound message at info level instead of trace
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Zero-based channel the unit listens on
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn send(&self, message: &ProtocolMessage) -> Result<(), TransportError> {
        let bytes = message.to_bytes();
        self.sink.lock().send(&bytes)?;

        if self.trace {
            info!(kind = ?message.kind(), channel = message.channel(), payload = ?message.payload(), "[QC → MIDI] {}", message);
        } else {
            trace!("[QC → MIDI] {} | {}", message, format_hex(&bytes));
        }
        Ok(())
    }

    /// Send a batch in order, stopping at the first failure
    pub fn send_all(&self, messages: &[ProtocolMessage]) -> Result<(), TransportError> {
        for message in messages {
            self.send(message)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::midi::MidiMessage;

    #[test]
    fn test_send_all_preserves_order() {
        let (transmitter, sink) = recording_transmitter(0);
        let messages = [
            ProtocolMessage::control_change(0, 0, 1).unwrap(),
            ProtocolMessage::program_change(0, 5).unwrap(),
        ];
        transmitter.send_all(&messages).unwrap();

        assert_eq!(
            sink.messages(),
            vec![
                MidiMessage::ControlChange { channel: 0, controller: 0, value: 1 },
                MidiMessage::ProgramChange { channel: 0, program: 5 },
            ]
        );
    }

    #[test]
    fn test_failure_propagates_unchanged() {
        let (transmitter, sink) = recording_transmitter(0);
        sink.break_port();
        let message = ProtocolMessage::control_change(0, 45, 127).unwrap();
        assert_eq!(transmitter.send(&message), Err(TransportError::Closed));
        assert_eq!(sink.len(), 0);
    }
}
