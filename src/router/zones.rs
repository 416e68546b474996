//! Note-range zones
//!
//! A [`ZoneMap`] splits one input channel's 0-127 note space into
//! non-overlapping zones, each bound to a command family. Everything that can
//! be checked about a zone is checked when the map is built, so lookups on
//! the hot path never fail on configuration grounds.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::command::{setlist_index, Command, FootswitchMode, Selector};
use crate::error::ValidationError;

/// Command family a zone produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneAction {
    Mode,
    GigView,
    Tuner,
    Footswitch,
    Scene,
    Setlist,
    Preset,
    Tempo,
}

impl ZoneAction {
    /// Value added to `note - start` when the zone has no name table
    pub fn default_base(self) -> i64 {
        match self {
            ZoneAction::Mode
            | ZoneAction::Footswitch
            | ZoneAction::Scene
            | ZoneAction::Setlist
            | ZoneAction::Preset => 1,
            ZoneAction::Tempo => 40,
            ZoneAction::GigView | ZoneAction::Tuner => 0,
        }
    }

    fn accepts_names(self) -> bool {
        matches!(self, ZoneAction::Mode | ZoneAction::Setlist)
    }

    /// Build the command for a resolved numeric parameter
    fn command(self, value: i64) -> Result<Command, ValidationError> {
        match self {
            ZoneAction::Mode => Command::footswitch_mode(value),
            // The first note of a toggle zone switches off, the rest switch on
            ZoneAction::GigView => Ok(Command::gig_view(value != 0)),
            ZoneAction::Tuner => Ok(Command::tuner(value != 0)),
            ZoneAction::Footswitch => Command::footswitch(value),
            ZoneAction::Scene => Command::scene(value),
            ZoneAction::Setlist => Command::setlist(value),
            ZoneAction::Preset => Command::preset(value),
            ZoneAction::Tempo => Command::tap_tempo(value as f64),
        }
    }
}

impl fmt::Display for ZoneAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ZoneAction::Mode => "mode",
            ZoneAction::GigView => "gig_view",
            ZoneAction::Tuner => "tuner",
            ZoneAction::Footswitch => "footswitch",
            ZoneAction::Scene => "scene",
            ZoneAction::Setlist => "setlist",
            ZoneAction::Preset => "preset",
            ZoneAction::Tempo => "tempo",
        };
        f.write_str(name)
    }
}

/// Zone configuration problems, reported when a map is built
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZoneError {
    #[error("{action} zone {start}..{end} is empty")]
    Empty { action: ZoneAction, start: u16, end: u16 },

    #[error("{action} zone {start}..{end} exceeds the MIDI note range")]
    OutOfNoteRange { action: ZoneAction, start: u16, end: u16 },

    #[error("{first} zone overlaps {second} zone at note {note}")]
    Overlap {
        first: ZoneAction,
        second: ZoneAction,
        note: u8,
    },

    #[error("{action} zone does not take a name table")]
    UnexpectedNames { action: ZoneAction },

    #[error("{action} zone produces invalid commands: {source}")]
    Parameter {
        action: ZoneAction,
        #[source]
        source: ValidationError,
    },

    #[error("channel {0} is mapped more than once")]
    DuplicateChannel(u8),
}

/// Outcome of resolving a note inside a zone
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneHit {
    Command(Command),
    /// The note points past the end of the zone's name table
    NameIndexOutOfRange { index: usize, len: usize },
}

/// One contiguous note range bound to a command family
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    action: ZoneAction,
    start: u8,
    end: u8,
    base: i64,
    /// Resolved 1-based indices, for zones addressed through names
    table: Option<Vec<i64>>,
}

impl Zone {
    /// Create a zone over notes `start..end` (end exclusive)
    ///
    /// `base` defaults to 0 for named zones and to the action's default
    /// otherwise. Every name is resolved here; an unknown name fails.
    pub fn new(
        action: ZoneAction,
        start: u16,
        end: u16,
        base: Option<i64>,
        names: Option<&[String]>,
    ) -> Result<Self, ZoneError> {
        if start >= end {
            return Err(ZoneError::Empty { action, start, end });
        }
        if end > 128 {
            return Err(ZoneError::OutOfNoteRange { action, start, end });
        }

        let table = match names {
            Some(_) if !action.accepts_names() => {
                return Err(ZoneError::UnexpectedNames { action });
            }
            Some(names) => {
                let resolved = names
                    .iter()
                    .map(|name| resolve_name(action, name))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|source| ZoneError::Parameter { action, source })?;
                Some(resolved)
            }
            None => None,
        };

        let base = base.unwrap_or(if table.is_some() { 0 } else { action.default_base() });
        let zone = Self {
            action,
            start: start as u8,
            end: end as u8,
            base,
            table,
        };
        zone.check_parameters()?;
        Ok(zone)
    }

    /// Parameters are monotonic in the note, so checking both ends is enough
    fn check_parameters(&self) -> Result<(), ZoneError> {
        let invalid = |source| ZoneError::Parameter {
            action: self.action,
            source,
        };
        let lowest = self.base;
        let width = (self.end - self.start) as i64 - 1;
        let highest = lowest.checked_add(width).ok_or_else(|| {
            invalid(ValidationError::OutOfRange {
                field: "base",
                value: lowest,
                min: i64::MIN,
                max: i64::MAX - width,
            })
        })?;

        match &self.table {
            Some(_) => ValidationError::check_range("name index", lowest, 0, i64::MAX).map_err(invalid),
            None => {
                self.action.command(lowest).map_err(invalid)?;
                self.action.command(highest).map_err(invalid)?;
                Ok(())
            }
        }
    }

    pub fn action(&self) -> ZoneAction {
        self.action
    }

    pub fn contains(&self, note: u8) -> bool {
        (self.start..self.end).contains(&note)
    }

    /// Map a note inside this zone to a command
    pub fn resolve(&self, note: u8) -> Result<ZoneHit, ValidationError> {
        let parameter = (note - self.start) as i64 + self.base;
        let value = match &self.table {
            Some(table) => match table.get(parameter as usize) {
                Some(&value) => value,
                None => {
                    return Ok(ZoneHit::NameIndexOutOfRange {
                        index: parameter as usize,
                        len: table.len(),
                    })
                }
            },
            None => parameter,
        };
        self.action.command(value).map(ZoneHit::Command)
    }
}

fn resolve_name(action: ZoneAction, name: &str) -> Result<i64, ValidationError> {
    match action {
        ZoneAction::Mode => {
            FootswitchMode::resolve(&Selector::Name(name.to_string())).map(|mode| mode.index() as i64)
        }
        _ => setlist_index(name).map(|index| index as i64),
    }
}

/// The zones of one input channel, in declaration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZoneMap {
    zones: Vec<Zone>,
}

impl ZoneMap {
    /// Build a map, rejecting overlapping zones
    pub fn new(zones: Vec<Zone>) -> Result<Self, ZoneError> {
        let mut sorted: Vec<&Zone> = zones.iter().collect();
        sorted.sort_by_key(|zone| zone.start);
        for pair in sorted.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(ZoneError::Overlap {
                    first: pair[0].action,
                    second: pair[1].action,
                    note: pair[1].start,
                });
            }
        }
        Ok(Self { zones })
    }

    /// Zone containing `note`, if any
    pub fn find(&self, note: u8) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.contains(note))
    }
}
