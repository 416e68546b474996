//! Router module - classification of inbound Guitar Pro events
//!
//! The Router decides, for each inbound message, whether it carries control
//! intent and which command it stands for:
//! - Kinds in the ignore set are discarded first
//! - Note-on events are looked up in the ZoneMap of their channel
//! - A program change on the performance-start channel is reported as a marker
//!
//! Nothing here performs I/O; the engine hands the resulting command to the
//! controller.

pub mod zones;

#[cfg(test)]
mod tests;

pub use zones::{Zone, ZoneAction, ZoneError, ZoneHit, ZoneMap};

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace, warn};

use crate::command::Command;
use crate::config::AppConfig;
use crate::error::ValidationError;
use crate::midi::{MessageKind, MidiMessage};

/// Why an inbound message produced no command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Kind is in the ignore set
    Filtered(MessageKind),
    /// Kind carries no control intent
    Unhandled(MessageKind),
    /// No ZoneMap registered for this channel
    UnmappedChannel(u8),
    /// Note falls in a gap between zones
    OutsideZones { channel: u8, note: u8 },
    /// Note points past the end of a zone's name table
    NameIndexOutOfRange {
        channel: u8,
        note: u8,
        index: usize,
        len: usize,
    },
}

/// Classification of one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Command(Command),
    /// Out-of-band marker, observed but otherwise a no-op
    PerformanceStart,
    Ignored(IgnoreReason),
}

/// Per-channel zone lookup plus the ignore set
#[derive(Debug, Clone)]
pub struct Router {
    channels: HashMap<u8, ZoneMap>,
    ignore: HashSet<MessageKind>,
    /// Zero-based channel of the performance-start marker
    performance_start_channel: Option<u8>,
}

impl Router {
    /// Create a Router with no channels mapped
    pub fn new(ignore: impl IntoIterator<Item = MessageKind>) -> Self {
        Self {
            channels: HashMap::new(),
            ignore: ignore.into_iter().collect(),
            performance_start_channel: None,
        }
    }

    /// Report program changes on `channel` (0-15) as the performance-start marker
    pub fn with_performance_start(mut self, channel: Option<u8>) -> Self {
        self.performance_start_channel = channel;
        self
    }

    /// Register the zones of a zero-based input channel
    pub fn map_channel(&mut self, channel: u8, zones: ZoneMap) -> Result<(), ZoneError> {
        if self.channels.contains_key(&channel) {
            return Err(ZoneError::DuplicateChannel(channel + 1));
        }
        self.channels.insert(channel, zones);
        Ok(())
    }

    /// Build the Router described by a configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, ZoneError> {
        let mut router = Self::new(config.ignore.iter().copied())
            .with_performance_start(config.performance_start_channel.map(|ch| ch.saturating_sub(1)));

        for channel in &config.channels {
            let zones = channel
                .zones
                .iter()
                .map(|zone| {
                    let base_note = channel.base_note as u16;
                    Zone::new(
                        zone.action,
                        base_note + zone.start as u16,
                        base_note + zone.end as u16,
                        zone.base,
                        zone.names.as_deref(),
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;
            router.map_channel(channel.channel.saturating_sub(1), ZoneMap::new(zones)?)?;
        }

        Ok(router)
    }

    pub fn is_ignored(&self, kind: MessageKind) -> bool {
        self.ignore.contains(&kind)
    }

    pub fn performance_start_channel(&self) -> Option<u8> {
        self.performance_start_channel
    }

    /// Classify one inbound message
    ///
    /// Routing misses are not errors. The only error is a zone producing a
    /// command outside its domain, which a validated ZoneMap rules out.
    pub fn route(&self, message: &MidiMessage) -> Result<Routed, ValidationError> {
        let kind = message.kind();
        if self.is_ignored(kind) {
            trace!("Ignored {} (filtered)", kind);
            return Ok(Routed::Ignored(IgnoreReason::Filtered(kind)));
        }

        match *message {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => self.route_note(channel, note, velocity),
            MidiMessage::ProgramChange { channel, program }
                if Some(channel) == self.performance_start_channel =>
            {
                info!("[GP] Performance start (ch {} PC {})", channel + 1, program);
                Ok(Routed::PerformanceStart)
            }
            _ => {
                trace!("Ignored {}", message);
                Ok(Routed::Ignored(IgnoreReason::Unhandled(kind)))
            }
        }
    }

    fn route_note(&self, channel: u8, note: u8, velocity: u8) -> Result<Routed, ValidationError> {
        let Some(map) = self.channels.get(&channel) else {
            trace!("Ignored note {} on unmapped ch {}", note, channel + 1);
            return Ok(Routed::Ignored(IgnoreReason::UnmappedChannel(channel)));
        };

        let Some(zone) = map.find(note) else {
            trace!("Ignored note {} on ch {} (no zone)", note, channel + 1);
            return Ok(Routed::Ignored(IgnoreReason::OutsideZones { channel, note }));
        };

        match zone.resolve(note)? {
            ZoneHit::Command(command) => {
                debug!(
                    "[GP → QC] ch {} note {} vel {} → {} ({})",
                    channel + 1,
                    note,
                    velocity,
                    command,
                    zone.action()
                );
                Ok(Routed::Command(command))
            }
            ZoneHit::NameIndexOutOfRange { index, len } => {
                warn!(
                    "Note {} on ch {} selects {} entry {} but only {} are named",
                    note,
                    channel + 1,
                    zone.action(),
                    index + 1,
                    len
                );
                Ok(Routed::Ignored(IgnoreReason::NameIndexOutOfRange {
                    channel,
                    note,
                    index,
                    len,
                }))
            }
        }
    }
}
