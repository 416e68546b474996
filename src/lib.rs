//! QC Bridge - drive a Neural DSP Quad Cortex from Guitar Pro
//!
//! Note-on events played by a Guitar Pro track are classified by channel and
//! note range, turned into Quad Cortex commands and sent over MIDI.

pub mod command;
pub mod config;
pub mod controller;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod midi;
pub mod protocol;
pub mod router;
pub mod sniffer;
pub mod tap;
pub mod transmitter;
pub mod transport;

pub use command::{Command, FootswitchMode, Selector};
pub use config::AppConfig;
pub use controller::Controller;
pub use engine::{Engine, RunOutcome, RunStatus};
pub use error::{EngineError, TransportError, ValidationError};
pub use router::{Routed, Router};
pub use transmitter::{MidiSink, Transmitter};
