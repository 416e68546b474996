//! Tap tempo sequencer
//!
//! The unit has no "set tempo" message, so a tempo is taught by sending the
//! tap-tempo CC twice, one beat apart. `Idle -> Tapping -> Idle`: while a
//! sequence is in flight any further tap request is dropped, not queued,
//! because overlapping pulses would corrupt the unit's tap window.
//!
//! Other time-sensitive traffic on the same port while a sequence is
//! outstanding can still throw off the unit's tap detection; only the busy
//! flag is enforced here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::encoder::TapPlan;
use crate::error::TransportError;
use crate::transmitter::Transmitter;

/// What happened to an asynchronous tap request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// First pulse sent, second one scheduled
    Scheduled,
    /// Another sequence was in flight; nothing was sent
    Dropped,
}

/// Clears the busy flag when the pulse task ends, however it ends
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct TapSequencer {
    transmitter: Arc<Transmitter>,
    busy: Arc<AtomicBool>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl TapSequencer {
    pub fn new(transmitter: Arc<Transmitter>) -> Self {
        Self {
            transmitter,
            busy: Arc::new(AtomicBool::new(false)),
            pending: Mutex::new(None),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Send pulse 1 now and pulse 2 from a background task
    ///
    /// Must be called from within a Tokio runtime. A failure on pulse 1 is
    /// returned and leaves the sequencer idle; a failure on pulse 2 can only
    /// be logged.
    pub fn tap(&self, plan: TapPlan) -> Result<TapOutcome, TransportError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("[QC] Tempo tap dropped (sequence already in flight)");
            return Ok(TapOutcome::Dropped);
        }
        let guard = BusyGuard(self.busy.clone());

        debug!("[QC] Tempo → {:.0} BPM ({:?} between taps)", 60.0 / plan.interval.as_secs_f64(), plan.interval);
        self.transmitter.send(&plan.pulse)?;

        let transmitter = self.transmitter.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            tokio::time::sleep(plan.interval).await;
            if let Err(e) = transmitter.send(&plan.pulse) {
                error!("Second tempo tap failed: {}", e);
            }
        });
        *self.pending.lock() = Some(handle);

        Ok(TapOutcome::Scheduled)
    }

    /// Send both pulses from the calling task, waiting out the interval
    ///
    /// Ignores the busy flag entirely; the caller is responsible for not
    /// overlapping sequences.
    pub async fn tap_inline(&self, plan: TapPlan) -> Result<(), TransportError> {
        self.transmitter.send(&plan.pulse)?;
        tokio::time::sleep(plan.interval).await;
        self.transmitter.send(&plan.pulse)
    }

    /// Abort a scheduled second pulse, if any
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().take() {
            if !handle.is_finished() {
                debug!("Cancelling pending tempo tap");
            }
            handle.abort();
        }
    }

    /// Wait until a scheduled second pulse has gone out (or was cancelled)
    pub async fn wait_idle(&self) {
        let handle = self.pending.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
