//! Tests for Router module

use super::*;
use crate::command::FootswitchMode;
use proptest::prelude::*;

fn zone(action: ZoneAction, start: u16, end: u16) -> Zone {
    Zone::new(action, start, end, None, None).unwrap()
}

fn make_test_router() -> Router {
    let mut router = Router::new([MessageKind::Clock, MessageKind::ControlChange, MessageKind::NoteOff])
        .with_performance_start(Some(0));

    let modes = vec!["stomp".to_string(), "scene".to_string(), "preset".to_string()];
    router
        .map_channel(
            0,
            ZoneMap::new(vec![
                Zone::new(ZoneAction::Mode, 40, 43, None, Some(&modes)).unwrap(),
                zone(ZoneAction::GigView, 45, 50),
                zone(ZoneAction::Tuner, 50, 55),
                zone(ZoneAction::Footswitch, 55, 63),
                zone(ZoneAction::Scene, 64, 72),
            ])
            .unwrap(),
        )
        .unwrap();

    let setlists: Vec<String> = ["Factory Presets", "My Presets", "Artists", "Users", "Rabea"]
        .iter()
        .map(|name| name.to_string())
        .collect();
    router
        .map_channel(
            2,
            ZoneMap::new(vec![
                Zone::new(ZoneAction::Setlist, 40, 64, None, Some(&setlists)).unwrap(),
                zone(ZoneAction::Preset, 64, 127),
            ])
            .unwrap(),
        )
        .unwrap();

    router
}

fn note_on(channel: u8, note: u8) -> MidiMessage {
    MidiMessage::NoteOn {
        channel,
        note,
        velocity: 100,
    }
}

#[test]
fn test_zone_lower_bounds() {
    let router = make_test_router();
    let route = |note| router.route(&note_on(0, note)).unwrap();

    assert_eq!(route(40), Routed::Command(Command::SetFootswitchMode(FootswitchMode::Stomp)));
    assert_eq!(route(45), Routed::Command(Command::SetGigViewVisible(false)));
    assert_eq!(route(50), Routed::Command(Command::SetTunerVisible(false)));
    assert_eq!(route(55), Routed::Command(Command::SelectFootswitch(1)));
    assert_eq!(route(64), Routed::Command(Command::SelectScene(1)));
}

#[test]
fn test_one_past_zone_end() {
    let router = make_test_router();
    let route = |note| router.route(&note_on(0, note)).unwrap();

    // Mode ends at 43; 43 and 44 are a gap
    assert_eq!(
        route(43),
        Routed::Ignored(IgnoreReason::OutsideZones { channel: 0, note: 43 })
    );
    // GigView ends at 50, where Tuner starts
    assert_eq!(route(50), Routed::Command(Command::SetTunerVisible(false)));
    // Footswitch ends at 63, one note before Scene
    assert_eq!(
        route(63),
        Routed::Ignored(IgnoreReason::OutsideZones { channel: 0, note: 63 })
    );
}

#[test]
fn test_setlist_by_name_table() {
    let router = make_test_router();
    assert_eq!(
        router.route(&note_on(2, 44)).unwrap(),
        Routed::Command(Command::SelectSetlist(5))
    );
}

#[test]
fn test_setlist_past_name_table_is_ignored() {
    let router = make_test_router();
    assert_eq!(
        router.route(&note_on(2, 50)).unwrap(),
        Routed::Ignored(IgnoreReason::NameIndexOutOfRange {
            channel: 2,
            note: 50,
            index: 10,
            len: 5,
        })
    );
}

#[test]
fn test_velocity_does_not_affect_routing() {
    let router = make_test_router();
    let soft = MidiMessage::NoteOn { channel: 2, note: 70, velocity: 1 };
    let hard = MidiMessage::NoteOn { channel: 2, note: 70, velocity: 127 };
    assert_eq!(router.route(&soft).unwrap(), router.route(&hard).unwrap());
    assert_eq!(router.route(&soft).unwrap(), Routed::Command(Command::SelectPreset(7)));
}

#[test]
fn test_unmapped_channel_is_ignored() {
    let router = make_test_router();
    assert_eq!(
        router.route(&note_on(7, 60)).unwrap(),
        Routed::Ignored(IgnoreReason::UnmappedChannel(7))
    );
}

#[test]
fn test_performance_start_marker() {
    let router = make_test_router();
    let marker = MidiMessage::ProgramChange { channel: 0, program: 0 };
    assert_eq!(router.route(&marker).unwrap(), Routed::PerformanceStart);

    // Program changes elsewhere carry no intent
    let other = MidiMessage::ProgramChange { channel: 1, program: 0 };
    assert_eq!(
        router.route(&other).unwrap(),
        Routed::Ignored(IgnoreReason::Unhandled(MessageKind::ProgramChange))
    );
}

#[test]
fn test_ignore_set_wins_over_marker() {
    let router = Router::new([MessageKind::ProgramChange]).with_performance_start(Some(0));
    let marker = MidiMessage::ProgramChange { channel: 0, program: 0 };
    assert_eq!(
        router.route(&marker).unwrap(),
        Routed::Ignored(IgnoreReason::Filtered(MessageKind::ProgramChange))
    );
}

#[test]
fn test_duplicate_channel_rejected() {
    let mut router = make_test_router();
    assert_eq!(
        router.map_channel(2, ZoneMap::default()),
        Err(ZoneError::DuplicateChannel(3))
    );
}

#[test]
fn test_note_off_from_zero_velocity_is_filtered() {
    let router = make_test_router();
    let message = MidiMessage::parse(&[0x90, 55, 0]).unwrap();
    assert_eq!(
        router.route(&message).unwrap(),
        Routed::Ignored(IgnoreReason::Filtered(MessageKind::NoteOff))
    );
}

fn any_message() -> impl Strategy<Value = MidiMessage> {
    let channel = 0u8..16;
    let data = 0u8..128;
    prop_oneof![
        (channel.clone(), data.clone(), 1u8..128)
            .prop_map(|(channel, note, velocity)| MidiMessage::NoteOn { channel, note, velocity }),
        (channel.clone(), data.clone(), data.clone())
            .prop_map(|(channel, note, velocity)| MidiMessage::NoteOff { channel, note, velocity }),
        (channel.clone(), data.clone(), data.clone()).prop_map(|(channel, controller, value)| {
            MidiMessage::ControlChange { channel, controller, value }
        }),
        (channel, data).prop_map(|(channel, program)| MidiMessage::ProgramChange { channel, program }),
        Just(MidiMessage::Clock),
        Just(MidiMessage::ActiveSensing),
    ]
}

proptest! {
    #[test]
    fn prop_ignored_kinds_never_produce_commands(message in any_message()) {
        let router = make_test_router();
        let routed = router.route(&message).unwrap();
        if router.is_ignored(message.kind()) {
            prop_assert_eq!(routed, Routed::Ignored(IgnoreReason::Filtered(message.kind())));
        }
    }

    #[test]
    fn prop_everything_ignored_when_kind_filtered(message in any_message()) {
        let router = Router::new([message.kind()]).with_performance_start(Some(0));
        prop_assert!(!matches!(router.route(&message).unwrap(), Routed::Command(_)));
    }
}
