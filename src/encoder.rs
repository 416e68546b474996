//! Command encoder
//!
//! Pure translation of a [`Command`] into Quad Cortex protocol messages. No
//! I/O happens here; tap tempo comes back as a [`TapPlan`] for the sequencer.

use std::time::Duration;

use crate::command::{beat_interval, Command};
use crate::error::ValidationError;
use crate::protocol::ProtocolMessage;

/// Controller numbers understood by the unit
pub mod cc {
    pub const BANK_SELECT: u8 = 0;
    pub const SETLIST: u8 = 32;
    /// Footswitch A; B..H follow contiguously up to 42
    pub const FOOTSWITCH_BASE: u8 = 35;
    pub const SCENE: u8 = 43;
    pub const TAP_TEMPO: u8 = 44;
    pub const TUNER: u8 = 45;
    pub const GIG_VIEW: u8 = 46;
    pub const FOOTSWITCH_MODE: u8 = 47;
}

const ON: u8 = 127;
const OFF: u8 = 0;

/// Two identical pulses spaced `interval` apart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapPlan {
    pub pulse: ProtocolMessage,
    pub interval: Duration,
}

impl TapPlan {
    pub fn for_bpm(channel: u8, bpm: f64) -> Result<Self, ValidationError> {
        Ok(Self {
            pulse: ProtocolMessage::control_change(channel, cc::TAP_TEMPO, 0)?,
            interval: beat_interval(bpm)?,
        })
    }
}

/// Result of encoding one command
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    /// Send these in order, right away
    Immediate(Vec<ProtocolMessage>),
    /// Hand over to the tap sequencer
    Tap(TapPlan),
}

/// Encode a command for the unit listening on `channel` (0-15)
///
/// Either every message is built or none is: validation happens before
/// anything is returned.
pub fn encode(command: &Command, channel: u8) -> Result<Encoded, ValidationError> {
    command.validate()?;

    let control = |controller: u8, value: u8| ProtocolMessage::control_change(channel, controller, value);
    let switch = |on: bool| if on { ON } else { OFF };

    let messages = match *command {
        Command::SelectPreset(n) => {
            let bank = n / 128;
            let program = (n - 1) % 128;
            vec![
                control(cc::BANK_SELECT, bank as u8)?,
                ProtocolMessage::program_change(channel, program as u8)?,
            ]
        }
        Command::SelectSetlist(n) => vec![control(cc::SETLIST, n - 1)?],
        Command::SelectScene(n) => vec![control(cc::SCENE, n - 1)?],
        Command::SelectFootswitch(n) => vec![control(cc::FOOTSWITCH_BASE + n - 1, 0)?],
        Command::SetTunerVisible(on) => vec![control(cc::TUNER, switch(on))?],
        Command::SetGigViewVisible(on) => vec![control(cc::GIG_VIEW, switch(on))?],
        Command::SetFootswitchMode(mode) => vec![control(cc::FOOTSWITCH_MODE, mode.index() - 1)?],
        Command::TapTempo(bpm) => return TapPlan::for_bpm(channel, bpm).map(Encoded::Tap),
        Command::RawProgramChange(program) => vec![ProtocolMessage::program_change(channel, program)?],
        Command::RawControlChange { controller, value } => vec![control(controller, value)?],
    };

    Ok(Encoded::Immediate(messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{FootswitchMode, PRESET_MAX};
    use crate::protocol::ProtocolKind;
    use proptest::prelude::*;

    fn immediate(command: Command) -> Vec<ProtocolMessage> {
        match encode(&command, 0).unwrap() {
            Encoded::Immediate(messages) => messages,
            Encoded::Tap(_) => panic!("expected immediate messages"),
        }
    }

    fn control(controller: u8, value: u8) -> ProtocolMessage {
        ProtocolMessage::control_change(0, controller, value).unwrap()
    }

    #[test]
    fn test_preset_bank_and_program() {
        assert_eq!(
            immediate(Command::SelectPreset(1)),
            vec![control(0, 0), ProtocolMessage::program_change(0, 0).unwrap()]
        );
        assert_eq!(
            immediate(Command::SelectPreset(129)),
            vec![control(0, 1), ProtocolMessage::program_change(0, 0).unwrap()]
        );
        // 128 lands in bank 1 with program 127
        assert_eq!(
            immediate(Command::SelectPreset(128)),
            vec![control(0, 1), ProtocolMessage::program_change(0, 127).unwrap()]
        );
    }

    #[test]
    fn test_invalid_preset_produces_nothing() {
        assert!(matches!(
            encode(&Command::SelectPreset(0), 0),
            Err(ValidationError::OutOfRange { field: "preset", .. })
        ));
    }

    #[test]
    fn test_single_cc_commands() {
        assert_eq!(immediate(Command::SelectSetlist(5)), vec![control(32, 4)]);
        assert_eq!(immediate(Command::SelectScene(3)), vec![control(43, 2)]);
        assert_eq!(immediate(Command::SelectFootswitch(1)), vec![control(35, 0)]);
        assert_eq!(immediate(Command::SelectFootswitch(8)), vec![control(42, 0)]);
        assert_eq!(immediate(Command::SetTunerVisible(true)), vec![control(45, 127)]);
        assert_eq!(immediate(Command::SetGigViewVisible(false)), vec![control(46, 0)]);
        assert_eq!(
            immediate(Command::SetFootswitchMode(FootswitchMode::Stomp)),
            vec![control(47, 2)]
        );
        assert_eq!(
            immediate(Command::RawControlChange { controller: 7, value: 100 }),
            vec![control(7, 100)]
        );
    }

    #[test]
    fn test_scene_letters_match_numbers_on_the_wire() {
        for (i, letter) in ('A'..='H').enumerate() {
            let by_letter = Command::scene(letter.to_string().as_str()).unwrap();
            let by_number = Command::scene(i as i64 + 1).unwrap();
            assert_eq!(immediate(by_letter), immediate(by_number));
        }
    }

    #[test]
    fn test_channel_is_carried_through() {
        match encode(&Command::RawProgramChange(9), 4).unwrap() {
            Encoded::Immediate(messages) => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].kind(), ProtocolKind::ProgramChange);
                assert_eq!(messages[0].channel(), 4);
                assert_eq!(messages[0].to_bytes(), vec![0xC4, 9]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tap_tempo_plan() {
        match encode(&Command::TapTempo(120.0), 0).unwrap() {
            Encoded::Tap(plan) => {
                assert_eq!(plan.pulse, control(44, 0));
                assert_eq!(plan.interval, Duration::from_millis(500));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(encode(&Command::TapTempo(0.0), 0).is_err());
    }

    #[test]
    fn test_extreme_tempos_never_panic() {
        for bpm in [1e-18, f64::MIN_POSITIVE, 5e-324, f64::INFINITY, -0.0] {
            assert!(encode(&Command::TapTempo(bpm), 0).is_err(), "bpm {} accepted", bpm);
        }
        match encode(&Command::TapTempo(0.5), 0).unwrap() {
            Encoded::Tap(plan) => assert_eq!(plan.interval, Duration::from_secs(120)),
            other => panic!("unexpected {:?}", other),
        }
        match encode(&Command::TapTempo(f64::MAX), 0).unwrap() {
            Encoded::Tap(plan) => assert_eq!(plan.interval, Duration::ZERO),
            other => panic!("unexpected {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_preset_arithmetic(n in 1i64..=PRESET_MAX) {
            let messages = immediate(Command::preset(n).unwrap());
            prop_assert_eq!(messages.len(), 2);
            prop_assert_eq!(messages[0].payload(), &[0u8, (n / 128) as u8][..]);
            prop_assert_eq!(messages[1].payload(), &[((n - 1) % 128) as u8][..]);
        }

        #[test]
        fn prop_non_positive_presets_rejected(n in i64::MIN..1i64) {
            prop_assert!(Command::preset(n).is_err());
        }
    }
}
