//! Command execution
//!
//! The Controller is the only place commands are encoded. Immediate messages
//! go straight to the transmitter; tap tempo goes to the sequencer in the
//! configured mode.

use std::sync::Arc;
use tracing::debug;

use crate::command::Command;
use crate::config::TapMode;
use crate::encoder::{encode, Encoded};
use crate::error::EngineError;
use crate::tap::{TapOutcome, TapSequencer};
use crate::transmitter::Transmitter;

pub struct Controller {
    transmitter: Arc<Transmitter>,
    tap: TapSequencer,
    tap_mode: TapMode,
}

impl Controller {
    pub fn new(transmitter: Arc<Transmitter>, tap_mode: TapMode) -> Self {
        Self {
            tap: TapSequencer::new(transmitter.clone()),
            transmitter,
            tap_mode,
        }
    }

    /// Encode and send one command
    ///
    /// Nothing is sent when the command fails validation. A tap request that
    /// overlaps a running sequence is dropped and still counts as success.
    pub async fn execute(&self, command: &Command) -> Result<(), EngineError> {
        let encoded = encode(command, self.transmitter.channel())?;
        debug!("[QC] {}", command);

        match encoded {
            Encoded::Immediate(messages) => self.transmitter.send_all(&messages)?,
            Encoded::Tap(plan) => match self.tap_mode {
                TapMode::Async => {
                    if self.tap.tap(plan)? == TapOutcome::Dropped {
                        debug!("[QC] {} dropped", command);
                    }
                }
                TapMode::Inline => self.tap.tap_inline(plan).await?,
            },
        }
        Ok(())
    }

    pub fn tap(&self) -> &TapSequencer {
        &self.tap
    }

    /// Abort any scheduled tempo pulse
    pub fn cancel_pending(&self) {
        self.tap.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, ValidationError};
    use crate::midi::MidiMessage;
    use crate::transmitter::testing::recording_transmitter;
    use std::time::Duration;

    fn cc(channel: u8, controller: u8, value: u8) -> MidiMessage {
        MidiMessage::ControlChange { channel, controller, value }
    }

    #[tokio::test]
    async fn test_execute_preset_sends_bank_then_program() {
        let (transmitter, sink) = recording_transmitter(3);
        let controller = Controller::new(transmitter, TapMode::Async);

        controller.execute(&Command::preset(200).unwrap()).await.unwrap();

        assert_eq!(
            sink.messages(),
            vec![cc(3, 0, 1), MidiMessage::ProgramChange { channel: 3, program: 71 }]
        );
    }

    #[tokio::test]
    async fn test_invalid_command_sends_nothing() {
        let (transmitter, sink) = recording_transmitter(0);
        let controller = Controller::new(transmitter, TapMode::Async);

        let result = controller.execute(&Command::SelectScene(9)).await;
        assert!(matches!(
            result,
            Err(EngineError::Validation(ValidationError::OutOfRange { field: "scene", .. }))
        ));
        assert_eq!(sink.len(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces() {
        let (transmitter, sink) = recording_transmitter(0);
        let controller = Controller::new(transmitter, TapMode::Async);
        sink.break_port();

        assert_eq!(
            controller.execute(&Command::tuner(true)).await,
            Err(EngineError::Transport(TransportError::Closed))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_tap_returns_after_first_pulse() {
        let (transmitter, sink) = recording_transmitter(0);
        let controller = Controller::new(transmitter, TapMode::Async);

        controller.execute(&Command::TapTempo(120.0)).await.unwrap();
        assert_eq!(sink.len(), 1);
        assert!(controller.tap().is_busy());

        // Overlapping request is dropped without error
        controller.execute(&Command::TapTempo(90.0)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.messages(), vec![cc(0, 44, 0), cc(0, 44, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_tap_completes_before_returning() {
        let (transmitter, sink) = recording_transmitter(0);
        let controller = Controller::new(transmitter, TapMode::Inline);

        controller.execute(&Command::TapTempo(60.0)).await.unwrap();
        assert_eq!(sink.len(), 2);
        assert!(!controller.tap().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_drops_second_pulse() {
        let (transmitter, sink) = recording_transmitter(0);
        let controller = Controller::new(transmitter, TapMode::Async);

        controller.execute(&Command::TapTempo(40.0)).await.unwrap();
        controller.cancel_pending();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(sink.len(), 1);
    }
}
