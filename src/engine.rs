//! Dispatch loop
//!
//! One task reads the inbound stream in arrival order, routes each message
//! and executes the resulting command before looking at the next one. The
//! loop ends on shutdown, when the inbound stream closes, or on the first
//! engine error; a failure is reported distinctly from a clean stop.

use std::fmt;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::controller::Controller;
use crate::error::EngineError;
use crate::midi::MidiMessage;
use crate::router::{Routed, Router};

/// Lifecycle of the dispatch loop, as shown to front-ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    Stopped,
    Failed(String),
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Idle => write!(f, "idle"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Stopped => write!(f, "stopped"),
            RunStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Shutdown requested or inbound stream closed
    Stopped,
    Failed(EngineError),
}

pub struct Engine {
    router: Router,
    controller: Controller,
    status: watch::Sender<RunStatus>,
}

impl Engine {
    pub fn new(router: Router, controller: Controller) -> Self {
        let (status, _) = watch::channel(RunStatus::Idle);
        Self {
            router,
            controller,
            status,
        }
    }

    /// Subscribe to status changes
    pub fn status(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Route and execute one inbound message
    pub async fn handle(&self, message: &MidiMessage) -> Result<(), EngineError> {
        match self.router.route(message)? {
            Routed::Command(command) => self.controller.execute(&command).await,
            Routed::PerformanceStart | Routed::Ignored(_) => Ok(()),
        }
    }

    /// Run until shutdown, end of input or the first error
    ///
    /// `shutdown` is level-triggered: once it reads `true` no further message
    /// is taken from `inbound`. Any scheduled tempo pulse is cancelled before
    /// returning.
    pub async fn run(
        &self,
        inbound: &mut mpsc::Receiver<MidiMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> RunOutcome {
        self.status.send_replace(RunStatus::Running);
        info!("Dispatch loop running");

        let mut shutdown_open = true;
        let outcome = loop {
            if *shutdown.borrow_and_update() {
                info!("Shutdown requested");
                break RunOutcome::Stopped;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed(), if shutdown_open => {
                    // Sender gone: nobody can ask for shutdown any more
                    if changed.is_err() {
                        shutdown_open = false;
                    }
                }
                message = inbound.recv() => match message {
                    Some(message) => {
                        if let Err(e) = self.handle(&message).await {
                            break RunOutcome::Failed(e);
                        }
                    }
                    None => {
                        info!("Inbound stream closed");
                        break RunOutcome::Stopped;
                    }
                },
            }
        };

        self.controller.cancel_pending();

        match &outcome {
            RunOutcome::Stopped => {
                info!("Dispatch loop stopped");
                self.status.send_replace(RunStatus::Stopped);
            }
            RunOutcome::Failed(e) => {
                error!("Dispatch loop failed: {}", e);
                self.status.send_replace(RunStatus::Failed(e.to_string()));
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, TapMode};
    use crate::error::TransportError;
    use crate::transmitter::testing::{recording_transmitter, RecordingSink};
    use std::time::Duration;

    fn make_engine(tap_mode: TapMode) -> (Engine, RecordingSink) {
        let (transmitter, sink) = recording_transmitter(0);
        let router = AppConfig::default().build_router().unwrap();
        (Engine::new(router, Controller::new(transmitter, tap_mode)), sink)
    }

    fn note_on(channel: u8, note: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            channel,
            note,
            velocity: 80,
        }
    }

    fn cc(controller: u8, value: u8) -> MidiMessage {
        MidiMessage::ControlChange {
            channel: 0,
            controller,
            value,
        }
    }

    /// Feed `messages`, close the stream and run to completion
    async fn run_with(engine: &Engine, messages: Vec<MidiMessage>) -> RunOutcome {
        let (tx, mut rx) = mpsc::channel(messages.len().max(1));
        for message in messages {
            tx.send(message).await.unwrap();
        }
        drop(tx);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        engine.run(&mut rx, shutdown_rx).await
    }

    #[tokio::test]
    async fn test_footswitch_lower_bound_sends_one_cc() {
        let (engine, sink) = make_engine(TapMode::Async);
        assert_eq!(run_with(&engine, vec![note_on(0, 55)]).await, RunOutcome::Stopped);
        assert_eq!(sink.messages(), vec![cc(35, 0)]);
    }

    #[tokio::test]
    async fn test_setlist_fifth_entry() {
        let (engine, sink) = make_engine(TapMode::Async);
        run_with(&engine, vec![note_on(2, 44)]).await;
        // Fifth default entry is setlist 5
        assert_eq!(sink.messages(), vec![cc(32, 4)]);
    }

    #[tokio::test]
    async fn test_note_outside_zones_sends_nothing() {
        let (engine, sink) = make_engine(TapMode::Async);
        run_with(&engine, vec![note_on(0, 43), note_on(0, 63), note_on(0, 20)]).await;
        assert_eq!(sink.len(), 0);
    }

    #[tokio::test]
    async fn test_ignored_kinds_send_nothing() {
        let (engine, sink) = make_engine(TapMode::Async);
        run_with(
            &engine,
            vec![
                MidiMessage::Clock,
                MidiMessage::ActiveSensing,
                MidiMessage::NoteOff { channel: 0, note: 55, velocity: 0 },
                cc(35, 0),
                MidiMessage::ProgramChange { channel: 0, program: 3 },
            ],
        )
        .await;
        assert_eq!(sink.len(), 0);
    }

    #[tokio::test]
    async fn test_messages_are_sent_in_arrival_order() {
        let (engine, sink) = make_engine(TapMode::Async);
        run_with(&engine, vec![note_on(0, 64), note_on(0, 51), note_on(0, 40)]).await;
        assert_eq!(sink.messages(), vec![cc(43, 0), cc(45, 127), cc(47, 2)]);
    }

    #[tokio::test]
    async fn test_transport_failure_is_terminal() {
        let (engine, sink) = make_engine(TapMode::Async);
        let status = engine.status();
        sink.break_port();

        let outcome = run_with(&engine, vec![note_on(0, 55), note_on(0, 56)]).await;
        assert_eq!(outcome, RunOutcome::Failed(EngineError::Transport(TransportError::Closed)));
        assert!(matches!(*status.borrow(), RunStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_clean_stop_status() {
        let (engine, _sink) = make_engine(TapMode::Async);
        let status = engine.status();
        assert_eq!(*status.borrow(), RunStatus::Idle);

        run_with(&engine, vec![]).await;
        assert_eq!(*status.borrow(), RunStatus::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_next_message() {
        let (engine, sink) = make_engine(TapMode::Async);
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(note_on(0, 55)).await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();

        assert_eq!(engine.run(&mut rx, shutdown_rx).await, RunOutcome::Stopped);
        assert_eq!(sink.len(), 0);
        // The pending message is still queued
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_for_input() {
        let (engine, _sink) = make_engine(TapMode::Async);
        let (_tx, mut rx) = mpsc::channel::<MidiMessage>(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            shutdown_tx.send(true).unwrap();
        });

        assert_eq!(engine.run(&mut rx, shutdown_rx).await, RunOutcome::Stopped);
        stopper.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_cancels_pending_tempo_pulse() {
        let (engine, sink) = make_engine(TapMode::Async);
        run_with(&engine, vec![note_on(4, 60)]).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(sink.messages(), vec![cc(44, 0)]);
        assert!(!engine.controller().tap().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_tempo_finishes_before_next_command() {
        let (engine, sink) = make_engine(TapMode::Inline);
        run_with(&engine, vec![note_on(4, 60), note_on(0, 45)]).await;
        assert_eq!(sink.messages(), vec![cc(44, 0), cc(44, 0), cc(46, 0)]);
    }
}
