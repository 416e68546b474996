//! QC Bridge - Guitar Pro to Quad Cortex MIDI bridge

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qc_bridge::config::AppConfig;
use qc_bridge::{sniffer, transport, Command, Controller, Engine, RunOutcome, Transmitter};

/// QC Bridge - Control a Neural DSP Quad Cortex from Guitar Pro
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "QC_BRIDGE_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Input port pattern, overrides midi.input_port
    #[arg(short, long, env = "QC_BRIDGE_INPUT")]
    input: Option<String>,

    /// Output port pattern, overrides midi.output_port
    #[arg(short, long, env = "QC_BRIDGE_OUTPUT")]
    output: Option<String>,

    /// Log every message sent to the Quad Cortex
    #[arg(long)]
    trace: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Print inbound MIDI instead of bridging it
    #[arg(long)]
    monitor: bool,

    /// Send a command and exit, e.g. --send "scene B" (repeatable)
    #[arg(long, value_name = "COMMAND")]
    send: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        return sniffer::list_ports_formatted();
    }

    let config = load_config(&args).await?;
    let router = config.build_router()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    if args.monitor {
        return sniffer::run_monitor(&config.midi.input_port, &router, shutdown_rx).await;
    }

    info!("Starting QC Bridge...");

    let (connection, output_name) = transport::open_output(&config.midi.output_port)?;
    let transmitter = Arc::new(
        Transmitter::new(Box::new(connection), config.device_channel()).with_trace(config.trace),
    );
    let controller = Controller::new(transmitter, config.tempo.mode);
    info!("[MIDI OUT] Transmitting to: {} (ch {})", output_name, config.midi.device_channel);

    if !args.send.is_empty() {
        return send_commands(&controller, &args.send).await;
    }

    let mut inbound = transport::open_input(&config.midi.input_port)?;
    info!("[MIDI IN ] Listening on: {}", inbound.name());

    let engine = Engine::new(router, controller);
    match engine.run(inbound.receiver(), shutdown_rx).await {
        RunOutcome::Stopped => {
            info!("QC Bridge shutdown complete");
            Ok(())
        }
        RunOutcome::Failed(e) => Err(e).context("Bridge stopped on error"),
    }
}

/// Load the config file, or the built-in layout when there is none
async fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if Path::new(&args.config).exists() {
        let config = AppConfig::load(&args.config).await?;
        info!("Configuration loaded from {}", args.config);
        config
    } else {
        warn!("{} not found, using the built-in Guitar Pro layout", args.config);
        AppConfig::default()
    };

    if let Some(input) = &args.input {
        config.midi.input_port = input.clone();
    }
    if let Some(output) = &args.output {
        config.midi.output_port = output.clone();
    }
    config.trace |= args.trace;

    config.validate()?;
    Ok(config)
}

async fn send_commands(controller: &Controller, commands: &[String]) -> Result<()> {
    for text in commands {
        let command: Command = text
            .parse()
            .with_context(|| format!("Invalid command: {}", text))?;
        info!("[QC] {}", command);
        controller.execute(&command).await?;
        // Let a tap sequence finish before the next command
        controller.tap().wait_idle().await;
    }
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
