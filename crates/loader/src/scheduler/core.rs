//! [`ReloadScheduler`]: the single background thread that drives reload cycles.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use dynacmd_core::Config;
use tracing::{debug, error, info};

use crate::compiler::CommandCompiler;
use crate::loader::{CommandLoader, CycleReport, Result};

/// Something the scheduler can run once per firing.
pub trait ReloadCycle: Send + 'static {
    fn run_cycle(&self) -> Result<CycleReport>;
}

impl<C: CommandCompiler> ReloadCycle for CommandLoader<C> {
    fn run_cycle(&self) -> Result<CycleReport> {
        CommandLoader::run_cycle(self)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Quiet period a nudge waits for before rescanning.
    pub debounce: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            debounce: Duration::from_millis(500),
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.rescan_interval,
            debounce: config.rescan_debounce,
        }
    }
}

enum Signal {
    Nudge,
    Shutdown,
}

/// Cloneable control handle for a running [`ReloadScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: Sender<Signal>,
}

impl SchedulerHandle {
    /// Ask for a cycle as soon as the debounce window is quiet.
    ///
    /// Nudges sent while a cycle runs are served right after it.
    pub fn nudge(&self) {
        let _ = self.tx.send(Signal::Nudge);
    }

    /// Stop the scheduler after any cycle in progress.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Signal::Shutdown);
    }
}

/// Owns the reload thread. Dropping it stops and joins the thread.
pub struct ReloadScheduler {
    handle: SchedulerHandle,
    cycles: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl ReloadScheduler {
    /// Spawn the reload thread. The first cycle runs one interval from now.
    pub fn start<R: ReloadCycle>(cycle: R, config: SchedulerConfig) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let cycles = Arc::new(AtomicU64::new(0));
        let thread_cycles = Arc::clone(&cycles);

        let thread = thread::Builder::new()
            .name("dynacmd-reload".to_string())
            .spawn(move || run_loop(cycle, config, rx, thread_cycles))?;

        Ok(Self {
            handle: SchedulerHandle { tx },
            cycles,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Cycles finished so far, successful or not.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Stop the thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("command reload thread panicked");
            }
        }
    }
}

impl Drop for ReloadScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<R: ReloadCycle>(
    cycle: R,
    config: SchedulerConfig,
    rx: Receiver<Signal>,
    cycles: Arc<AtomicU64>,
) {
    info!(
        interval_secs = config.interval.as_secs(),
        "command reload scheduler started"
    );

    let mut next_due = Instant::now() + config.interval;
    loop {
        let wait = next_due.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(Signal::Nudge) => {
                if !debounce(&rx, &config) {
                    break;
                }
                debug!("rescan requested");
            }
            Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        // Disarmed until the cycle returns.
        run_guarded(&cycle);
        cycles.fetch_add(1, Ordering::Relaxed);
        next_due = Instant::now() + config.interval;
    }

    info!("command reload scheduler stopped");
}

/// Swallow nudges until the channel is quiet for one debounce window, capped
/// at one interval. Returns `false` if shutdown arrived meanwhile.
fn debounce(rx: &Receiver<Signal>, config: &SchedulerConfig) -> bool {
    let deadline = Instant::now() + config.interval;
    loop {
        let window = config
            .debounce
            .min(deadline.saturating_duration_since(Instant::now()));
        if window.is_zero() {
            return true;
        }
        match rx.recv_timeout(window) {
            Ok(Signal::Nudge) => continue,
            Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => return false,
            Err(RecvTimeoutError::Timeout) => return true,
        }
    }
}

/// Run one cycle, logging failures and panics instead of propagating them.
fn run_guarded<R: ReloadCycle>(cycle: &R) {
    let started = Instant::now();
    match panic::catch_unwind(AssertUnwindSafe(|| cycle.run_cycle())) {
        Ok(Ok(report)) if report.events_detected > 0 => info!(
            tenants = report.tenants_scanned,
            detected = report.events_detected,
            delivered = report.events_delivered,
            compile_failures = report.compile_failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "command reload cycle complete"
        ),
        Ok(Ok(report)) => debug!(
            tenants = report.tenants_scanned,
            "command reload cycle found no changes"
        ),
        Ok(Err(e)) => error!(error = %e, "command reload cycle failed"),
        Err(payload) => error!(
            panic = %panic_message(payload.as_ref()),
            "command reload cycle panicked"
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
