//! Configuration management for the QC bridge
//!
//! Handles loading, parsing and validation of YAML configuration files.
//! Channels are 1-based here, as printed on every MIDI device; the rest of
//! the crate works with zero-based channels.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::fs;

use crate::command::SETLISTS;
use crate::midi::MessageKind;
use crate::router::{Router, ZoneAction};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
    /// Log every outbound message at info level
    #[serde(default)]
    pub trace: bool,
    /// Inbound message kinds discarded before routing
    #[serde(default = "default_ignore")]
    pub ignore: Vec<MessageKind>,
    /// Channel whose program changes mark the start of playback
    #[serde(default = "default_performance_start_channel")]
    pub performance_start_channel: Option<u8>,
    #[serde(default)]
    pub tempo: TempoConfig,
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelConfig>,
}

/// MIDI port configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Substring (or index) of the port Guitar Pro plays into
    pub input_port: String,
    /// Substring (or index) of the Quad Cortex port
    pub output_port: String,
    /// Channel the Quad Cortex listens on
    #[serde(default = "default_device_channel")]
    pub device_channel: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TempoConfig {
    #[serde(default)]
    pub mode: TapMode,
}

/// How the second tempo pulse is sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TapMode {
    /// From a background task; overlapping taps are dropped
    #[default]
    Async,
    /// From the dispatch loop, which waits out the beat
    Inline,
}

/// Zones of one inbound channel
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChannelConfig {
    pub channel: u8,
    /// Note that zone offsets are counted from
    #[serde(default = "default_base_note")]
    pub base_note: u8,
    pub zones: Vec<ZoneConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ZoneConfig {
    pub action: ZoneAction,
    /// First offset from `base_note`
    pub start: u8,
    /// One past the last offset
    pub end: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
}

impl ZoneConfig {
    fn new(action: ZoneAction, start: u8, end: u8) -> Self {
        Self {
            action,
            start,
            end,
            base: None,
            names: None,
        }
    }

    fn named(mut self, names: &[&str]) -> Self {
        self.names = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            midi: MidiConfig {
                input_port: "loopMIDI".to_string(),
                output_port: "Quad Cortex".to_string(),
                device_channel: default_device_channel(),
            },
            trace: false,
            ignore: default_ignore(),
            performance_start_channel: default_performance_start_channel(),
            tempo: TempoConfig::default(),
            channels: default_channels(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.input_port.is_empty() {
            anyhow::bail!("MIDI input_port cannot be empty");
        }
        if self.midi.output_port.is_empty() {
            anyhow::bail!("MIDI output_port cannot be empty");
        }
        check_channel("midi.device_channel", self.midi.device_channel)?;
        if let Some(channel) = self.performance_start_channel {
            check_channel("performance_start_channel", channel)?;
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            check_channel("channel", channel.channel)?;
            if !seen.insert(channel.channel) {
                anyhow::bail!("Channel {} is configured more than once", channel.channel);
            }
            if channel.base_note > 127 {
                anyhow::bail!(
                    "base_note {} of channel {} is invalid (must be 0-127)",
                    channel.base_note,
                    channel.channel
                );
            }
            for zone in &channel.zones {
                if zone.action == ZoneAction::Mode && zone.names.is_none() {
                    anyhow::bail!(
                        "mode zone {}..{} on channel {} needs a names list",
                        zone.start,
                        zone.end,
                        channel.channel
                    );
                }
            }
        }

        self.build_router()?;
        Ok(())
    }

    /// Build the dispatcher's Router from the channel layout
    pub fn build_router(&self) -> Result<Router> {
        Router::from_config(self).context("Invalid channel layout")
    }

    /// Zero-based channel of the Quad Cortex
    pub fn device_channel(&self) -> u8 {
        self.midi.device_channel.saturating_sub(1)
    }
}

fn check_channel(field: &str, channel: u8) -> Result<()> {
    if !(1..=16).contains(&channel) {
        anyhow::bail!("{} {} is invalid (must be 1-16)", field, channel);
    }
    Ok(())
}

fn default_device_channel() -> u8 { 1 }
fn default_base_note() -> u8 { 40 }
fn default_performance_start_channel() -> Option<u8> { Some(1) }

fn default_ignore() -> Vec<MessageKind> {
    vec![
        MessageKind::Clock,
        MessageKind::ActiveSensing,
        MessageKind::ControlChange,
        MessageKind::NoteOff,
    ]
}

/// Guitar Pro layout: one string per command family, frets counted from E2
fn default_channels() -> Vec<ChannelConfig> {
    let setlists: Vec<&str> = SETLISTS.iter().map(|(name, _)| *name).collect();
    vec![
        ChannelConfig {
            channel: 1,
            base_note: default_base_note(),
            zones: vec![
                ZoneConfig::new(ZoneAction::Mode, 0, 3).named(&["stomp", "scene", "preset"]),
                ZoneConfig::new(ZoneAction::GigView, 5, 10),
                ZoneConfig::new(ZoneAction::Tuner, 10, 15),
                ZoneConfig::new(ZoneAction::Footswitch, 15, 23),
                ZoneConfig::new(ZoneAction::Scene, 24, 32),
            ],
        },
        ChannelConfig {
            channel: 3,
            base_note: default_base_note(),
            zones: vec![
                ZoneConfig::new(ZoneAction::Setlist, 0, 24).named(&setlists),
                ZoneConfig::new(ZoneAction::Preset, 24, 87),
            ],
        },
        ChannelConfig {
            channel: 5,
            base_note: default_base_note(),
            zones: vec![ZoneConfig::new(ZoneAction::Tempo, 0, 87)],
        },
    ]
}
