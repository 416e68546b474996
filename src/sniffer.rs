//! MIDI monitor for setting up the Guitar Pro track
//!
//! Lists the available ports and prints inbound traffic so fret positions can
//! be matched against the configured zones.

use anyhow::{Context, Result};
use colored::*;
use std::time::Instant;
use tokio::sync::watch;

use crate::midi::{format_hex, MidiMessage};
use crate::router::Router;
use crate::transport::{self, Direction, PortInfo};

/// One line of monitor output, without colors
fn describe(message: &MidiMessage, performance_start_channel: Option<u8>) -> String {
    match *message {
        MidiMessage::NoteOn {
            channel,
            note,
            velocity,
        } => format!("ch {:2} | note {:3} | vel {:3}", channel + 1, note, velocity),
        MidiMessage::ProgramChange { channel, program } if Some(channel) == performance_start_channel => {
            format!("ch {:2} | performance start (PC {})", channel + 1, program)
        }
        ref other => other.to_string(),
    }
}

/// Print inbound messages until shutdown
///
/// Kinds in the router's ignore set are not shown.
pub async fn run_monitor(pattern: &str, router: &Router, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let mut port = transport::open_input(pattern).context("Failed to open input port")?;
    let performance_start_channel = router.performance_start_channel();
    let start_time = Instant::now();

    println!("{}", "=== MIDI Monitor ===".bold().cyan());
    println!("Listening on {} (Ctrl+C to exit)", port.name().bright_white());
    println!("{}", "Format: [timestamp] HEX => PARSED".dimmed());
    println!("{}\n", "─".repeat(60).dimmed());

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            message = port.receiver().recv() => {
                let Some(message) = message else { break };
                if router.is_ignored(message.kind()) {
                    continue;
                }

                let timestamp = format!("{:08}ms", start_time.elapsed().as_millis());
                let hex = format_hex(&message.encode());
                let line = describe(&message, performance_start_channel);
                let line = match message {
                    MidiMessage::NoteOn { .. } => line.bright_green(),
                    MidiMessage::ProgramChange { channel, .. } if Some(channel) == performance_start_channel => {
                        line.bold().bright_magenta()
                    }
                    MidiMessage::ControlChange { .. } => line.bright_yellow(),
                    _ => line.normal(),
                };
                println!("[{}] {:9} => {}", timestamp.dimmed(), hex, line);
            }
        }
    }

    println!("\n{}", "Monitor stopped".yellow());
    Ok(())
}

fn print_port_list(title: &str, ports: &[PortInfo]) {
    println!("\n{}", title.bold());
    if ports.is_empty() {
        println!("  {}", "No ports found".dimmed());
        return;
    }
    for port in ports {
        let marker = if port.is_virtual {
            "[VIRTUAL] ".yellow()
        } else {
            "[PHYSICAL]".green()
        };
        println!("  {:2}: {} {}", port.index, marker, port.name);
    }
}

/// List all ports in a formatted way
pub fn list_ports_formatted() -> Result<()> {
    let inputs = transport::list_ports(Direction::Input).context("Failed to list input ports")?;
    let outputs = transport::list_ports(Direction::Output).context("Failed to list output ports")?;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    print_port_list("Input Ports (Guitar Pro):", &inputs);
    print_port_list("Output Ports (Quad Cortex):", &outputs);
    println!();
    Ok(())
}
