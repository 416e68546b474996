//! MIDI wire messages
//!
//! Parsing of inbound bytes into [`MidiMessage`], encoding back to bytes, and the
//! fieldless [`MessageKind`] used by the ignore set.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One complete MIDI message; channels are zero-based
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Velocity is never 0 here, see [`MidiMessage::parse`]
    NoteOn { channel: u8, note: u8, velocity: u8 },
    PolyPressure { channel: u8, note: u8, pressure: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    /// 14-bit value, 8192 is centre
    PitchBend { channel: u8, value: u16 },
    /// Payload without the F0/F7 framing
    SysEx { data: Vec<u8> },
    TimeCode { frame: u8 },
    SongPosition { beats: u16 },
    SongSelect { song: u8 },
    TuneRequest,
    Clock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    Reset,
}

/// Kind of a [`MidiMessage`], without its payload
///
/// Names follow the snake_case spelling used in the config file. The aliases
/// accept the names other MIDI tools print for the same kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    NoteOff,
    NoteOn,
    #[serde(alias = "polytouch")]
    PolyPressure,
    ControlChange,
    ProgramChange,
    #[serde(alias = "aftertouch")]
    ChannelPressure,
    #[serde(alias = "pitchwheel")]
    PitchBend,
    Sysex,
    #[serde(alias = "quarter_frame")]
    TimeCode,
    #[serde(alias = "songpos")]
    SongPosition,
    SongSelect,
    TuneRequest,
    Clock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    Reset,
}

impl MessageKind {
    /// Config-file spelling
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::NoteOff => "note_off",
            MessageKind::NoteOn => "note_on",
            MessageKind::PolyPressure => "poly_pressure",
            MessageKind::ControlChange => "control_change",
            MessageKind::ProgramChange => "program_change",
            MessageKind::ChannelPressure => "channel_pressure",
            MessageKind::PitchBend => "pitch_bend",
            MessageKind::Sysex => "sysex",
            MessageKind::TimeCode => "time_code",
            MessageKind::SongPosition => "song_position",
            MessageKind::SongSelect => "song_select",
            MessageKind::TuneRequest => "tune_request",
            MessageKind::Clock => "clock",
            MessageKind::Start => "start",
            MessageKind::Continue => "continue",
            MessageKind::Stop => "stop",
            MessageKind::ActiveSensing => "active_sensing",
            MessageKind::Reset => "reset",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn split_14bit(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

fn join_14bit(lsb: u8, msb: u8) -> u16 {
    ((msb as u16) << 7) | lsb as u16
}

impl MidiMessage {
    /// Parse one message from raw bytes
    ///
    /// Returns `None` for truncated messages, undefined status bytes and
    /// running status (data byte first). A note-on with velocity 0 comes back
    /// as a note-off.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;
        let byte = |i: usize| rest.get(i).map(|b| b & 0x7F);

        if status < 0x80 {
            return None;
        }

        if status < 0xF0 {
            let channel = status & 0x0F;
            let message = match status >> 4 {
                0x8 => MidiMessage::NoteOff { channel, note: byte(0)?, velocity: byte(1)? },
                0x9 => match (byte(0)?, byte(1)?) {
                    (note, 0) => MidiMessage::NoteOff { channel, note, velocity: 0 },
                    (note, velocity) => MidiMessage::NoteOn { channel, note, velocity },
                },
                0xA => MidiMessage::PolyPressure { channel, note: byte(0)?, pressure: byte(1)? },
                0xB => MidiMessage::ControlChange { channel, controller: byte(0)?, value: byte(1)? },
                0xC => MidiMessage::ProgramChange { channel, program: byte(0)? },
                0xD => MidiMessage::ChannelPressure { channel, pressure: byte(0)? },
                _ => MidiMessage::PitchBend { channel, value: join_14bit(byte(0)?, byte(1)?) },
            };
            return Some(message);
        }

        let message = match status {
            0xF0 => {
                let end = rest.iter().position(|&b| b == 0xF7)?;
                MidiMessage::SysEx { data: rest[..end].to_vec() }
            }
            0xF1 => MidiMessage::TimeCode { frame: byte(0)? },
            0xF2 => MidiMessage::SongPosition { beats: join_14bit(byte(0)?, byte(1)?) },
            0xF3 => MidiMessage::SongSelect { song: byte(0)? },
            0xF6 => MidiMessage::TuneRequest,
            0xF8 => MidiMessage::Clock,
            0xFA => MidiMessage::Start,
            0xFB => MidiMessage::Continue,
            0xFC => MidiMessage::Stop,
            0xFE => MidiMessage::ActiveSensing,
            0xFF => MidiMessage::Reset,
            _ => return None,
        };
        Some(message)
    }

    /// Encode to wire bytes, masking every data byte to 7 bits
    pub fn encode(&self) -> Vec<u8> {
        let voice = |high: u8, channel: u8, data: &[u8]| {
            let mut bytes = vec![high | (channel & 0x0F)];
            bytes.extend(data.iter().map(|b| b & 0x7F));
            bytes
        };

        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => voice(0x80, channel, &[note, velocity]),
            MidiMessage::NoteOn { channel, note, velocity } => voice(0x90, channel, &[note, velocity]),
            MidiMessage::PolyPressure { channel, note, pressure } => voice(0xA0, channel, &[note, pressure]),
            MidiMessage::ControlChange { channel, controller, value } => {
                voice(0xB0, channel, &[controller, value])
            }
            MidiMessage::ProgramChange { channel, program } => voice(0xC0, channel, &[program]),
            MidiMessage::ChannelPressure { channel, pressure } => voice(0xD0, channel, &[pressure]),
            MidiMessage::PitchBend { channel, value } => voice(0xE0, channel, &split_14bit(value)),
            MidiMessage::SysEx { ref data } => {
                let mut bytes = Vec::with_capacity(data.len() + 2);
                bytes.push(0xF0);
                bytes.extend_from_slice(data);
                bytes.push(0xF7);
                bytes
            }
            MidiMessage::TimeCode { frame } => vec![0xF1, frame & 0x7F],
            MidiMessage::SongPosition { beats } => {
                let [lsb, msb] = split_14bit(beats);
                vec![0xF2, lsb, msb]
            }
            MidiMessage::SongSelect { song } => vec![0xF3, song & 0x7F],
            MidiMessage::TuneRequest => vec![0xF6],
            MidiMessage::Clock => vec![0xF8],
            MidiMessage::Start => vec![0xFA],
            MidiMessage::Continue => vec![0xFB],
            MidiMessage::Stop => vec![0xFC],
            MidiMessage::ActiveSensing => vec![0xFE],
            MidiMessage::Reset => vec![0xFF],
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            MidiMessage::NoteOff { .. } => MessageKind::NoteOff,
            MidiMessage::NoteOn { .. } => MessageKind::NoteOn,
            MidiMessage::PolyPressure { .. } => MessageKind::PolyPressure,
            MidiMessage::ControlChange { .. } => MessageKind::ControlChange,
            MidiMessage::ProgramChange { .. } => MessageKind::ProgramChange,
            MidiMessage::ChannelPressure { .. } => MessageKind::ChannelPressure,
            MidiMessage::PitchBend { .. } => MessageKind::PitchBend,
            MidiMessage::SysEx { .. } => MessageKind::Sysex,
            MidiMessage::TimeCode { .. } => MessageKind::TimeCode,
            MidiMessage::SongPosition { .. } => MessageKind::SongPosition,
            MidiMessage::SongSelect { .. } => MessageKind::SongSelect,
            MidiMessage::TuneRequest => MessageKind::TuneRequest,
            MidiMessage::Clock => MessageKind::Clock,
            MidiMessage::Start => MessageKind::Start,
            MidiMessage::Continue => MessageKind::Continue,
            MidiMessage::Stop => MessageKind::Stop,
            MidiMessage::ActiveSensing => MessageKind::ActiveSensing,
            MidiMessage::Reset => MessageKind::Reset,
        }
    }

    /// Zero-based channel of a channel-voice message
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::PolyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => Some(channel),
            _ => None,
        }
    }
}

/// `kind field=value ...`, with 1-based channels
impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        if let Some(channel) = self.channel() {
            write!(f, " channel={}", channel + 1)?;
        }
        match *self {
            MidiMessage::NoteOff { note, velocity, .. } | MidiMessage::NoteOn { note, velocity, .. } => {
                write!(f, " note={} velocity={}", note, velocity)
            }
            MidiMessage::PolyPressure { note, pressure, .. } => write!(f, " note={} pressure={}", note, pressure),
            MidiMessage::ControlChange { controller, value, .. } => {
                write!(f, " control={} value={}", controller, value)
            }
            MidiMessage::ProgramChange { program, .. } => write!(f, " program={}", program),
            MidiMessage::ChannelPressure { pressure, .. } => write!(f, " pressure={}", pressure),
            MidiMessage::PitchBend { value, .. } => write!(f, " pitch={}", value as i32 - 8192),
            MidiMessage::SysEx { ref data } => write!(f, " ({} bytes)", data.len()),
            MidiMessage::TimeCode { frame } => write!(f, " frame={}", frame),
            MidiMessage::SongPosition { beats } => write!(f, " pos={}", beats),
            MidiMessage::SongSelect { song } => write!(f, " song={}", song),
            _ => Ok(()),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
