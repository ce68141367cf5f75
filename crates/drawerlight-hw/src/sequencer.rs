//! Diagnostic sweep sequence.
//!
//! The sweep blanks the matrix, walks every assigned drawer in row-major
//! order, flashes everything on once and ends dark:
//!
//! ```text
//! Idle -> AllOff -> Sweeping -> AllOn -> AllOffFinal -> Idle
//! ```
//!
//! It runs on its own tokio task. Holds only suspend that task; the
//! controller's write lock is taken per write, so request handlers are
//! serviced normally while a sweep is in progress. Only one run exists at a
//! time and a second start is rejected.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{Error, LineController, Result};

/// Hold after the initial blanking.
const BLANK_HOLD: Duration = Duration::from_millis(500);
/// How long each drawer stays lit during the walk.
const STEP_HOLD: Duration = Duration::from_millis(150);
/// Pause between the walk and the all-on flash.
const SETTLE_HOLD: Duration = Duration::from_millis(500);
/// How long the all-on flash lasts.
const FLASH_HOLD: Duration = Duration::from_millis(1000);

/// Where a diagnostic run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencePhase {
    #[default]
    Idle,
    AllOff,
    Sweeping,
    AllOn,
    AllOffFinal,
}

impl fmt::Display for SequencePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencePhase::Idle => write!(f, "idle"),
            SequencePhase::AllOff => write!(f, "all-off"),
            SequencePhase::Sweeping => write!(f, "sweeping"),
            SequencePhase::AllOn => write!(f, "all-on"),
            SequencePhase::AllOffFinal => write!(f, "all-off-final"),
        }
    }
}

struct Run {
    id: u64,
    cancel: watch::Sender<bool>,
    /// Closes when the task drops its sender, i.e. when the run is over.
    alive: watch::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Launches and tracks diagnostic runs.
pub struct Sequencer {
    controller: Arc<LineController>,
    phase: Arc<watch::Sender<SequencePhase>>,
    run: Mutex<Option<Run>>,
    started: AtomicU64,
}

impl Sequencer {
    /// Creates an idle sequencer over `controller`.
    pub fn new(controller: Arc<LineController>) -> Self {
        let (phase, _) = watch::channel(SequencePhase::Idle);
        Self {
            controller,
            phase: Arc::new(phase),
            run: Mutex::new(None),
            started: AtomicU64::new(0),
        }
    }

    fn lock_run(&self) -> MutexGuard<'_, Option<Run>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current phase.
    pub fn phase(&self) -> SequencePhase {
        *self.phase.borrow()
    }

    /// Receiver that observes phase changes.
    pub fn subscribe(&self) -> watch::Receiver<SequencePhase> {
        self.phase.subscribe()
    }

    /// True while a run task is alive.
    pub fn is_running(&self) -> bool {
        self.lock_run()
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Starts a run and returns immediately.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`Error::SequenceRunning`] while a previous run is still active.
    pub fn start(&self) -> Result<()> {
        let mut run = self.lock_run();
        if run.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(Error::SequenceRunning);
        }

        let (cancel, cancel_rx) = watch::channel(false);
        let (alive_tx, alive) = watch::channel(());
        let controller = self.controller.clone();
        let phase = self.phase.clone();
        let handle = tokio::spawn(async move {
            let _alive = alive_tx;
            run_sequence(controller, phase, cancel_rx).await;
        });
        let id = self.started.fetch_add(1, Ordering::Relaxed);
        *run = Some(Run {
            id,
            cancel,
            alive,
            handle,
        });
        info!("Diagnostic sequence started");
        Ok(())
    }

    /// Signals the active run to stop. Returns false if nothing was running.
    pub fn cancel(&self) -> bool {
        match self.lock_run().as_ref() {
            Some(run) if !run.handle.is_finished() => {
                run.cancel.send_replace(true);
                true
            }
            _ => false,
        }
    }

    /// Waits for the active run, if any, to finish on its own.
    ///
    /// The run stays registered while waiting, so it can still be cancelled
    /// and overlapping starts are still rejected.
    pub async fn join(&self) {
        let (id, mut alive) = match self.lock_run().as_ref() {
            Some(run) => (run.id, run.alive.clone()),
            None => return,
        };

        // Nothing is ever sent; this only returns once the sender is gone.
        while alive.changed().await.is_ok() {}

        let finished = {
            let mut run = self.lock_run();
            if run.as_ref().is_some_and(|r| r.id == id) {
                run.take()
            } else {
                None
            }
        };
        if let Some(run) = finished {
            if let Err(e) = run.handle.await {
                warn!("Diagnostic task ended abnormally: {}", e);
            }
        }
    }

    /// Cancels the active run and waits for it to wind down.
    pub async fn shutdown(&self) {
        self.cancel();
        self.join().await;
    }
}

/// Sleeps for `hold`, returning true if cancellation arrived first.
async fn hold(cancel: &mut watch::Receiver<bool>, hold: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(hold) => false,
        _ = cancel.wait_for(|stop| *stop) => true,
    }
}

async fn run_sequence(
    controller: Arc<LineController>,
    phase: Arc<watch::Sender<SequencePhase>>,
    mut cancel: watch::Receiver<bool>,
) {
    match sweep(&controller, &phase, &mut cancel).await {
        Ok(true) => info!("Diagnostic sequence completed"),
        Ok(false) => {
            info!("Diagnostic sequence cancelled");
            if let Err(e) = controller.set_all(false) {
                warn!("Failed to blank LEDs after cancel: {}", e);
            }
        }
        Err(e) => warn!("Diagnostic sequence aborted: {}", e),
    }
    phase.send_replace(SequencePhase::Idle);
}

/// Runs the choreography. Ok(false) means it was cancelled.
async fn sweep(
    controller: &LineController,
    phase: &watch::Sender<SequencePhase>,
    cancel: &mut watch::Receiver<bool>,
) -> Result<bool> {
    phase.send_replace(SequencePhase::AllOff);
    controller.set_all(false)?;
    if hold(cancel, BLANK_HOLD).await {
        return Ok(false);
    }

    phase.send_replace(SequencePhase::Sweeping);
    let drawers: Vec<_> = controller.pin_map().assigned().map(|(c, _)| c).collect();
    for coord in drawers {
        debug!("Diagnostic step {}", coord);
        controller.set_state(coord, true)?;
        let cancelled = hold(cancel, STEP_HOLD).await;
        controller.set_state(coord, false)?;
        if cancelled {
            return Ok(false);
        }
    }
    if hold(cancel, SETTLE_HOLD).await {
        return Ok(false);
    }

    phase.send_replace(SequencePhase::AllOn);
    controller.set_all(true)?;
    if hold(cancel, FLASH_HOLD).await {
        return Ok(false);
    }

    phase.send_replace(SequencePhase::AllOffFinal);
    controller.set_all(false)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coordinate, PinMap, SimulatedBank, DEFAULT_CHANNELS};
    use tokio::time::Instant;

    fn setup() -> (Arc<LineController>, SimulatedBank, Sequencer) {
        let bank = SimulatedBank::new();
        let lines = bank.clone();
        let ctl = Arc::new(LineController::new(
            PinMap::build(&DEFAULT_CHANNELS),
            move |ch| Box::new(lines.line(ch)),
        ));
        ctl.initialize().unwrap();
        let seq = Sequencer::new(ctl.clone());
        (ctl, bank, seq)
    }

    fn all_off(ctl: &LineController) -> bool {
        ctl.snapshot().iter().all(|(_, on)| !on)
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_ends_dark() {
        let (ctl, _, seq) = setup();
        let started = Instant::now();
        seq.start().unwrap();
        seq.join().await;

        assert!(all_off(&ctl));
        assert_eq!(seq.phase(), SequencePhase::Idle);
        // 500 + 28 * 150 + 500 + 1000
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(6200), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(6300), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_walk_follows_row_major_order() {
        let (_, bank, seq) = setup();
        let before = bank.history().len();
        seq.start().unwrap();
        seq.join().await;

        let lit: Vec<u32> = bank.history()[before..]
            .iter()
            .skip(28) // initial blanking
            .filter(|(_, on)| *on)
            .take(28)
            .map(|(ch, _)| *ch)
            .collect();
        assert_eq!(lit, DEFAULT_CHANNELS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_rejected() {
        let (_, _, seq) = setup();
        seq.start().unwrap();
        assert!(seq.is_running());
        assert!(matches!(seq.start(), Err(Error::SequenceRunning)));
        seq.join().await;
        assert!(!seq.is_running());
        seq.start().unwrap();
        seq.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_observed_in_order() {
        let (_, _, seq) = setup();
        let mut rx = seq.subscribe();
        seq.start().unwrap();

        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let p = *rx.borrow_and_update();
            seen.push(p);
            if p == SequencePhase::Idle {
                break;
            }
        }
        // AllOffFinal and Idle are published back to back, so the final
        // blanking may be coalesced into Idle
        assert_eq!(
            seen[..3],
            [
                SequencePhase::AllOff,
                SequencePhase::Sweeping,
                SequencePhase::AllOn,
            ]
        );
        assert_eq!(seen.last(), Some(&SequencePhase::Idle));
        seq.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_served_during_hold() {
        let (ctl, _, seq) = setup();
        seq.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(seq.phase(), SequencePhase::AllOff);
        let c: Coordinate = "5-1".parse().unwrap();
        assert!(ctl.set_state(c, true).unwrap());
        assert!(ctl.get_state(c));
        seq.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_blanks_and_returns_idle() {
        let (ctl, _, seq) = setup();
        seq.start().unwrap();
        tokio::time::sleep(Duration::from_millis(5700)).await;
        assert_eq!(seq.phase(), SequencePhase::AllOn);

        let started = Instant::now();
        assert!(seq.cancel());
        seq.join().await;
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(all_off(&ctl));
        assert_eq!(seq.phase(), SequencePhase::Idle);
        assert!(!seq.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_ends_run_without_panic() {
        let (ctl, bank, seq) = setup();
        let started = Instant::now();
        seq.start().unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(seq.phase(), SequencePhase::Sweeping);

        // drawer 2-2 is reached at 1250ms
        bank.set_failing(DEFAULT_CHANNELS[5], true);
        seq.join().await;

        assert_eq!(seq.phase(), SequencePhase::Idle);
        assert!(started.elapsed() < Duration::from_millis(1500));
        assert!(!bank.history().contains(&(DEFAULT_CHANNELS[6], true)));
        assert!(!ctl.get_state("2-2".parse().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stays_exclusive_while_joined() {
        let (ctl, _, seq) = setup();
        let seq = Arc::new(seq);
        seq.start().unwrap();

        let waiter = {
            let seq = seq.clone();
            tokio::spawn(async move { seq.join().await })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(seq.is_running());
        assert!(matches!(seq.start(), Err(Error::SequenceRunning)));
        assert!(seq.cancel());

        waiter.await.unwrap();
        assert!(!seq.is_running());
        assert!(all_off(&ctl));

        // a fresh run is accepted once the first is gone
        seq.start().unwrap();
        seq.shutdown().await;
        assert_eq!(seq.phase(), SequencePhase::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_without_run() {
        let (_, _, seq) = setup();
        seq.shutdown().await;
        assert_eq!(seq.phase(), SequencePhase::Idle);
    }
}
