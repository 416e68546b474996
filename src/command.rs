//! Semantic Quad Cortex commands
//!
//! A [`Command`] is what the operator (or a zone on the input side) asks the
//! unit to do. Parameters that accept either a number or a name go through
//! [`Selector`] and are resolved to one canonical number by the checked
//! constructors, so a built `Command` always carries in-range values.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::error::ValidationError;

/// Highest preset whose bank number still fits in a 7-bit bank select
pub const PRESET_MAX: i64 = 128 * 128 - 1;
pub const SETLIST_COUNT: i64 = 128;
pub const SCENE_COUNT: i64 = 8;
pub const FOOTSWITCH_COUNT: i64 = 8;

/// Named setlists as they appear on the unit, with their 1-based index
///
/// Lookups are case-insensitive and treat spaces and underscores alike.
pub const SETLISTS: &[(&str, u8)] = &[
    ("factory_presets", 1),
    ("my_presets", 2),
    ("artists", 3),
    ("users", 4),
    ("rabea", 5),
    ("neural_dsp", 6),
    ("songs", 7),
];

/// Either a numeric index or a name to resolve against a static table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Index(i64),
    Name(String),
}

impl From<i64> for Selector {
    fn from(index: i64) -> Self {
        Selector::Index(index)
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::Name(name.to_string())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Selector::Name(name)
    }
}

impl FromStr for Selector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_matches('"');
        Ok(match s.parse::<i64>() {
            Ok(index) => Selector::Index(index),
            Err(_) => Selector::Name(s.to_string()),
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(index) => write!(f, "{}", index),
            Selector::Name(name) => write!(f, "{}", name),
        }
    }
}

/// What the footswitch row controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FootswitchMode {
    Preset = 1,
    Scene = 2,
    Stomp = 3,
}

impl FootswitchMode {
    const ALL: [FootswitchMode; 3] = [
        FootswitchMode::Preset,
        FootswitchMode::Scene,
        FootswitchMode::Stomp,
    ];

    /// 1-based index used on the wire (as `index - 1`)
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            FootswitchMode::Preset => "preset",
            FootswitchMode::Scene => "scene",
            FootswitchMode::Stomp => "stomp",
        }
    }

    pub fn resolve(selector: &Selector) -> Result<Self, ValidationError> {
        match selector {
            Selector::Index(index) => {
                ValidationError::check_range("mode", *index, 1, Self::ALL.len() as i64)?;
                Ok(Self::ALL[(*index - 1) as usize])
            }
            Selector::Name(name) => {
                let wanted = name.trim().to_lowercase();
                Self::ALL
                    .into_iter()
                    .find(|mode| mode.name() == wanted)
                    .ok_or_else(|| ValidationError::UnknownName {
                        field: "mode",
                        name: name.clone(),
                    })
            }
        }
    }
}

/// Resolve a setlist name against [`SETLISTS`]
pub fn setlist_index(name: &str) -> Result<u8, ValidationError> {
    let key = name.trim().to_lowercase().replace(' ', "_");
    SETLISTS
        .iter()
        .find(|(entry, _)| *entry == key)
        .map(|(_, index)| *index)
        .ok_or_else(|| ValidationError::UnknownName {
            field: "setlist",
            name: name.to_string(),
        })
}

/// Resolve `A`-`H` (or a number) to a 1-based slot
fn lettered_slot(field: &'static str, selector: &Selector, count: i64) -> Result<u8, ValidationError> {
    let index = match selector {
        Selector::Index(index) => *index,
        Selector::Name(name) => {
            let mut chars = name.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(letter), None) if letter.is_ascii_alphabetic() => {
                    (letter.to_ascii_uppercase() as i64) - ('A' as i64) + 1
                }
                _ => {
                    return Err(ValidationError::UnknownName {
                        field,
                        name: name.clone(),
                    })
                }
            }
        }
    };
    ValidationError::check_range(field, index, 1, count)?;
    Ok(index as u8)
}

/// Time between two beats at `bpm`
///
/// Rates so low that the interval overflows a [`Duration`] are rejected.
pub fn beat_interval(bpm: f64) -> Result<Duration, ValidationError> {
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(ValidationError::NotPositive { field: "bpm", value: bpm });
    }
    Duration::try_from_secs_f64(60.0 / bpm)
        .map_err(|_| ValidationError::TooSlow { field: "bpm", value: bpm })
}

/// A semantic command for the unit
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// 1-based preset number
    SelectPreset(u16),
    /// 1-based setlist number
    SelectSetlist(u8),
    /// Scene 1-8 (A-H)
    SelectScene(u8),
    /// Footswitch 1-8 (A-H)
    SelectFootswitch(u8),
    SetTunerVisible(bool),
    SetGigViewVisible(bool),
    SetFootswitchMode(FootswitchMode),
    /// Target tempo in beats per minute
    TapTempo(f64),
    RawProgramChange(u8),
    RawControlChange { controller: u8, value: u8 },
}

impl Command {
    pub fn preset(number: i64) -> Result<Self, ValidationError> {
        ValidationError::check_range("preset", number, 1, PRESET_MAX)?;
        Ok(Command::SelectPreset(number as u16))
    }

    pub fn setlist(selector: impl Into<Selector>) -> Result<Self, ValidationError> {
        let index = match selector.into() {
            Selector::Index(index) => {
                ValidationError::check_range("setlist", index, 1, SETLIST_COUNT)?;
                index as u8
            }
            Selector::Name(name) => setlist_index(&name)?,
        };
        Ok(Command::SelectSetlist(index))
    }

    pub fn scene(selector: impl Into<Selector>) -> Result<Self, ValidationError> {
        lettered_slot("scene", &selector.into(), SCENE_COUNT).map(Command::SelectScene)
    }

    pub fn footswitch(selector: impl Into<Selector>) -> Result<Self, ValidationError> {
        lettered_slot("footswitch", &selector.into(), FOOTSWITCH_COUNT)
            .map(Command::SelectFootswitch)
    }

    pub fn tuner(visible: bool) -> Self {
        Command::SetTunerVisible(visible)
    }

    pub fn gig_view(visible: bool) -> Self {
        Command::SetGigViewVisible(visible)
    }

    pub fn footswitch_mode(selector: impl Into<Selector>) -> Result<Self, ValidationError> {
        FootswitchMode::resolve(&selector.into()).map(Command::SetFootswitchMode)
    }

    pub fn tap_tempo(bpm: f64) -> Result<Self, ValidationError> {
        beat_interval(bpm)?;
        Ok(Command::TapTempo(bpm))
    }

    pub fn program_change(program: i64) -> Result<Self, ValidationError> {
        ValidationError::check_range("program", program, 0, 127)?;
        Ok(Command::RawProgramChange(program as u8))
    }

    pub fn control_change(controller: i64, value: i64) -> Result<Self, ValidationError> {
        ValidationError::check_range("controller", controller, 0, 127)?;
        ValidationError::check_range("value", value, 0, 127)?;
        Ok(Command::RawControlChange {
            controller: controller as u8,
            value: value as u8,
        })
    }

    /// Re-check the canonical fields
    ///
    /// The variants are public, so a command built without the checked
    /// constructors is validated again before it is encoded.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            Command::SelectPreset(n) => ValidationError::check_range("preset", n as i64, 1, PRESET_MAX),
            Command::SelectSetlist(n) => {
                ValidationError::check_range("setlist", n as i64, 1, SETLIST_COUNT)
            }
            Command::SelectScene(n) => ValidationError::check_range("scene", n as i64, 1, SCENE_COUNT),
            Command::SelectFootswitch(n) => {
                ValidationError::check_range("footswitch", n as i64, 1, FOOTSWITCH_COUNT)
            }
            Command::SetTunerVisible(_)
            | Command::SetGigViewVisible(_)
            | Command::SetFootswitchMode(_) => Ok(()),
            Command::TapTempo(bpm) => Command::tap_tempo(bpm).map(|_| ()),
            Command::RawProgramChange(p) => ValidationError::check_range("program", p as i64, 0, 127),
            Command::RawControlChange { controller, value } => {
                ValidationError::check_range("controller", controller as i64, 0, 127)?;
                ValidationError::check_range("value", value as i64, 0, 127)
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_off = |on: bool| if on { "on" } else { "off" };
        match *self {
            Command::SelectPreset(n) => write!(f, "preset {}", n),
            Command::SelectSetlist(n) => write!(f, "setlist {}", n),
            Command::SelectScene(n) => write!(f, "scene {}", n),
            Command::SelectFootswitch(n) => write!(f, "footswitch {}", n),
            Command::SetTunerVisible(on) => write!(f, "tuner {}", on_off(on)),
            Command::SetGigViewVisible(on) => write!(f, "gigview {}", on_off(on)),
            Command::SetFootswitchMode(mode) => write!(f, "mode {}", mode.name()),
            Command::TapTempo(bpm) => write!(f, "tempo {}", bpm),
            Command::RawProgramChange(p) => write!(f, "pc {}", p),
            Command::RawControlChange { controller, value } => write!(f, "cc {} {}", controller, value),
        }
    }
}

/// Operator text could not be turned into a [`Command`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    UnknownVerb(String),

    #[error("'{verb}' expects {expected}")]
    BadArgument { verb: String, expected: &'static str },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

fn parse_switch(arg: &str) -> Option<bool> {
    match arg.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl FromStr for Command {
    type Err = ParseCommandError;

    /// Parse text such as `scene A`, `setlist "Neural DSP"`, `tempo 96`, `cc 7 100`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let verb = words.next().ok_or(ParseCommandError::Empty)?.to_lowercase();
        let args: Vec<&str> = words.collect();
        let rest = args.join(" ");

        let bad = |expected: &'static str| ParseCommandError::BadArgument {
            verb: verb.clone(),
            expected,
        };
        let number = |arg: Option<&&str>, expected: &'static str| {
            arg.and_then(|a| a.parse::<i64>().ok()).ok_or_else(|| bad(expected))
        };
        let selector = |expected: &'static str| {
            if rest.is_empty() {
                Err(bad(expected))
            } else {
                Ok(rest.parse::<Selector>().unwrap_or(Selector::Name(rest.clone())))
            }
        };

        let command = match verb.as_str() {
            "preset" => Command::preset(number(args.first(), "a preset number")?)?,
            "setlist" => Command::setlist(selector("a setlist name or 1-128")?)?,
            "scene" => Command::scene(selector("a scene A-H or 1-8")?)?,
            "footswitch" | "fs" => Command::footswitch(selector("a footswitch A-H or 1-8")?)?,
            "mode" => Command::footswitch_mode(selector("preset, scene, stomp or 1-3")?)?,
            "tuner" => Command::tuner(args.first().and_then(|a| parse_switch(a)).ok_or_else(|| bad("on or off"))?),
            "gigview" | "gig_view" => {
                Command::gig_view(args.first().and_then(|a| parse_switch(a)).ok_or_else(|| bad("on or off"))?)
            }
            "tempo" | "tap" => {
                let bpm = args
                    .first()
                    .and_then(|a| a.parse::<f64>().ok())
                    .ok_or_else(|| bad("a tempo in BPM"))?;
                Command::tap_tempo(bpm)?
            }
            "pc" => Command::program_change(number(args.first(), "a program 0-127")?)?,
            "cc" => Command::control_change(
                number(args.first(), "a controller and a value")?,
                number(args.get(1), "a controller and a value")?,
            )?,
            _ => return Err(ParseCommandError::UnknownVerb(verb)),
        };
        Ok(command)
    }
}
