//! MIDI port discovery and connection
//!
//! Thin layer over midir. Ports are picked by case-insensitive substring
//! match on their name, falling back to the numeric index shown by
//! `--list-ports`.

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::midi::{format_hex, MidiMessage};

const CLIENT_NAME: &str = "QC-Bridge";

/// Inbound messages buffered between the midir callback and the engine
const INBOUND_QUEUE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

/// Information about a MIDI port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
    pub is_virtual: bool,
}

impl PortInfo {
    fn new(index: usize, name: String) -> Self {
        let is_virtual = name.contains("Virtual") || name.contains("loopMIDI") || name.contains("IAC");
        Self {
            index,
            name,
            is_virtual,
        }
    }
}

/// Enumerate the ports of one direction
pub fn list_ports(direction: Direction) -> Result<Vec<PortInfo>, TransportError> {
    let names = match direction {
        Direction::Input => {
            let midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| TransportError::Init(e.to_string()))?;
            midi_in
                .ports()
                .iter()
                .filter_map(|port| midi_in.port_name(port).ok())
                .collect::<Vec<_>>()
        }
        Direction::Output => {
            let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| TransportError::Init(e.to_string()))?;
            midi_out
                .ports()
                .iter()
                .filter_map(|port| midi_out.port_name(port).ok())
                .collect::<Vec<_>>()
        }
    };

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(index, name)| PortInfo::new(index, name))
        .collect())
}

/// Pick a port: substring match first, then a bare index
fn select_port(names: &[String], pattern: &str) -> Option<usize> {
    let wanted = pattern.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    names
        .iter()
        .position(|name| name.to_lowercase().contains(&wanted))
        .or_else(|| wanted.parse::<usize>().ok().filter(|&index| index < names.len()))
}

/// Open the output port matching `pattern`
pub fn open_output(pattern: &str) -> Result<(MidiOutputConnection, String), TransportError> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| TransportError::Init(e.to_string()))?;
    let ports = midi_out.ports();
    let names: Vec<String> = ports
        .iter()
        .map(|port| midi_out.port_name(port).unwrap_or_default())
        .collect();
    debug!("Found {} MIDI output ports", names.len());

    let index = select_port(&names, pattern).ok_or_else(|| TransportError::PortNotFound {
        direction: Direction::Output.label(),
        pattern: pattern.to_string(),
    })?;
    let name = names[index].clone();
    debug!("Found port '{}' matching pattern '{}'", name, pattern);

    let connection = midi_out
        .connect(&ports[index], CLIENT_NAME)
        .map_err(|e| TransportError::Connect {
            port: name.clone(),
            reason: e.to_string(),
        })?;

    info!("Connected to output port: {}", name);
    Ok((connection, name))
}

/// An open input port and the stream of messages it produces
///
/// Dropping the port closes the connection and ends the stream.
pub struct InboundPort {
    name: String,
    rx: mpsc::Receiver<MidiMessage>,
    _connection: MidiInputConnection<()>,
}

impl InboundPort {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stream of parsed inbound messages, in arrival order
    pub fn receiver(&mut self) -> &mut mpsc::Receiver<MidiMessage> {
        &mut self.rx
    }
}

/// Open the input port matching `pattern`
///
/// Every message kind is let through; filtering is the router's job.
pub fn open_input(pattern: &str) -> Result<InboundPort, TransportError> {
    let mut midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| TransportError::Init(e.to_string()))?;
    midi_in.ignore(Ignore::None);

    let ports = midi_in.ports();
    let names: Vec<String> = ports
        .iter()
        .map(|port| midi_in.port_name(port).unwrap_or_default())
        .collect();
    debug!("Found {} MIDI input ports", names.len());

    let index = select_port(&names, pattern).ok_or_else(|| TransportError::PortNotFound {
        direction: Direction::Input.label(),
        pattern: pattern.to_string(),
    })?;
    let name = names[index].clone();
    debug!("Found port '{}' matching pattern '{}'", name, pattern);

    let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
    let connection = midi_in
        .connect(
            &ports[index],
            CLIENT_NAME,
            move |_timestamp, data, _| match MidiMessage::parse(data) {
                Some(message) => match tx.try_send(message) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(message)) => {
                        warn!("Inbound queue full, dropping {}", message);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {}
                },
                None => debug!("Failed to parse MIDI: {}", format_hex(data)),
            },
            (),
        )
        .map_err(|e| TransportError::Connect {
            port: name.clone(),
            reason: e.to_string(),
        })?;

    info!("Connected to input port: {}", name);
    Ok(InboundPort {
        name,
        rx,
        _connection: connection,
    })
}
