//! # Telemetry Blackboard
//!
//! Thread-safe progress tracking for the SEM pipeline.
//! Uses atomic counters that can be cheaply updated from rayon parallel iterators.
//!
//! The blackboard pattern decouples work execution from progress reporting:
//! - Worker threads update atomic counters with minimal overhead
//! - A background heartbeat thread periodically reads and reports progress

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Processing stage for high-level progress tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    Initializing = 0,
    LoadingData = 1,
    BurnIn = 2,
    Sem = 3,
    ObservedProbability = 4,
    GibbsRun = 5,
    WritingOutput = 6,
    Complete = 7,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initializing => "Initializing",
            Stage::LoadingData => "Loading Data",
            Stage::BurnIn => "Burn-in",
            Stage::Sem => "SEM",
            Stage::ObservedProbability => "Observed Probability",
            Stage::GibbsRun => "Gibbs Run",
            Stage::WritingOutput => "Writing Output",
            Stage::Complete => "Complete",
        }
    }

    fn from_u64(val: u64) -> Self {
        match val {
            0 => Stage::Initializing,
            1 => Stage::LoadingData,
            2 => Stage::BurnIn,
            3 => Stage::Sem,
            4 => Stage::ObservedProbability,
            5 => Stage::GibbsRun,
            6 => Stage::WritingOutput,
            _ => Stage::Complete,
        }
    }
}

/// Global telemetry state, updated from hot loops.
///
/// All counters use relaxed ordering; the heartbeat thread only needs
/// approximate values.
pub struct TelemetryBlackboard {
    // --- Macro Progress (Stage) ---
    stage: AtomicU64,

    // --- Meso Progress (Iteration) ---
    current_iteration: AtomicU64,
    total_iterations: AtomicU64,

    // --- Micro Progress (within-iteration counters) ---
    individuals_processed: AtomicU64,
    total_individuals: AtomicU64,

    // --- Timing ---
    start_time: Instant,
    last_progress_nanos: AtomicU64,

    // --- Control ---
    shutdown: AtomicBool,
}

impl TelemetryBlackboard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // === Stage Updates ===

    #[inline]
    pub fn set_stage(&self, stage: Stage) {
        self.stage.store(stage as u64, Ordering::Relaxed);
        self.touch_progress();
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        Stage::from_u64(self.stage.load(Ordering::Relaxed))
    }

    // === Iteration Updates ===

    /// Set the current iteration and total, and reset the individual counter
    pub fn set_iteration(&self, current: usize, total: usize) {
        self.current_iteration.store(current as u64, Ordering::Relaxed);
        self.total_iterations.store(total as u64, Ordering::Relaxed);
        self.individuals_processed.store(0, Ordering::Relaxed);
        self.touch_progress();
    }

    pub fn set_total_individuals(&self, total: usize) {
        self.total_individuals.store(total as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_individuals(&self, n: u64) {
        self.individuals_processed.fetch_add(n, Ordering::Relaxed);
        self.touch_progress();
    }

    pub fn individuals_processed(&self) -> u64 {
        self.individuals_processed.load(Ordering::Relaxed)
    }

    pub fn current_iteration(&self) -> u64 {
        self.current_iteration.load(Ordering::Relaxed)
    }

    // === Timing ===

    #[inline]
    fn touch_progress(&self) {
        let elapsed = self.start_time.elapsed().as_nanos() as u64;
        self.last_progress_nanos.store(elapsed, Ordering::Relaxed);
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    // === Snapshot for Heartbeat ===

    fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            stage: self.stage(),
            current_iteration: self.current_iteration.load(Ordering::Relaxed),
            total_iterations: self.total_iterations.load(Ordering::Relaxed),
            individuals_processed: self.individuals_processed.load(Ordering::Relaxed),
            total_individuals: self.total_individuals.load(Ordering::Relaxed),
            elapsed_secs: self.elapsed_secs(),
            last_progress_nanos: self.last_progress_nanos.load(Ordering::Relaxed),
            current_nanos: self.start_time.elapsed().as_nanos() as u64,
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl Default for TelemetryBlackboard {
    fn default() -> Self {
        Self {
            stage: AtomicU64::new(Stage::Initializing as u64),
            current_iteration: AtomicU64::new(0),
            total_iterations: AtomicU64::new(0),
            individuals_processed: AtomicU64::new(0),
            total_individuals: AtomicU64::new(0),
            start_time: Instant::now(),
            last_progress_nanos: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        }
    }
}

/// Snapshot of telemetry state at a point in time
struct TelemetrySnapshot {
    stage: Stage,
    current_iteration: u64,
    total_iterations: u64,
    individuals_processed: u64,
    total_individuals: u64,
    elapsed_secs: f64,
    last_progress_nanos: u64,
    current_nanos: u64,
}

/// Heartbeat output configuration
pub struct HeartbeatConfig {
    /// Interval between heartbeats (seconds)
    pub interval_secs: u64,
    /// Stall warning threshold (seconds with no progress)
    pub stall_threshold_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            stall_threshold_secs: 300, // 5 minutes
        }
    }
}

/// Handle to the heartbeat thread
pub struct HeartbeatHandle {
    handle: Option<JoinHandle<()>>,
    blackboard: Arc<TelemetryBlackboard>,
}

impl HeartbeatHandle {
    /// Spawn the heartbeat thread
    pub fn spawn(blackboard: Arc<TelemetryBlackboard>, config: HeartbeatConfig) -> io::Result<Self> {
        let bb = blackboard.clone();
        let is_tty = io::stderr().is_terminal();

        let handle = thread::Builder::new()
            .name("heartbeat".to_string())
            .spawn(move || {
                heartbeat_loop(bb, config, is_tty);
            })?;

        Ok(Self {
            handle: Some(handle),
            blackboard,
        })
    }

    /// Signal shutdown and wait for thread to finish
    pub fn shutdown(mut self) {
        self.blackboard.signal_shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.blackboard.signal_shutdown();
        // Don't block in drop - just signal shutdown
    }
}

/// Format duration in human-readable form
fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.0}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{:.0}m{:.0}s", mins, remaining_secs)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

/// Main heartbeat loop
fn heartbeat_loop(bb: Arc<TelemetryBlackboard>, config: HeartbeatConfig, is_tty: bool) {
    let interval = Duration::from_secs(config.interval_secs);
    // Poll in short slices so shutdown is not delayed by a full interval
    let tick = Duration::from_millis(100).min(interval.max(Duration::from_millis(1)));
    let mut next_beat = Instant::now() + interval;

    loop {
        thread::sleep(tick);
        if bb.is_shutdown() {
            break;
        }
        if Instant::now() < next_beat {
            continue;
        }
        next_beat += interval;

        let snap = bb.snapshot();
        let stall_secs =
            (snap.current_nanos.saturating_sub(snap.last_progress_nanos)) / 1_000_000_000;
        let is_stalled = stall_secs > config.stall_threshold_secs;

        if is_tty {
            print_tty_progress(&snap, is_stalled);
        } else {
            print_log_progress(&snap, is_stalled);
        }
    }

    // Clear TTY line on shutdown
    if is_tty {
        eprint!("\r\x1b[K");
        let _ = io::stderr().flush();
    }
}

/// Print progress for TTY (rewriting single line)
fn print_tty_progress(snap: &TelemetrySnapshot, is_stalled: bool) {
    let iter_str = if snap.total_iterations > 0 {
        format!("I{}/{}", snap.current_iteration, snap.total_iterations)
    } else {
        String::new()
    };

    let progress_pct = if snap.total_iterations > 0 {
        (snap.current_iteration as f64 / snap.total_iterations as f64 * 100.0).min(100.0)
    } else {
        0.0
    };

    let ind_str = if snap.total_individuals > 0 {
        format!("N{}/{}", snap.individuals_processed, snap.total_individuals)
    } else {
        String::new()
    };

    // Build progress bar (20 chars)
    let bar_width = 20;
    let filled = ((progress_pct / 100.0) * bar_width as f64) as usize;
    let bar: String = "=".repeat(filled.min(bar_width))
        + &" ".repeat(bar_width.saturating_sub(filled));

    let stall_str = if is_stalled { " [STALLED]" } else { "" };

    let context_parts: Vec<&str> = [iter_str.as_str(), ind_str.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    let context = context_parts.join(" ");

    eprint!(
        "\r[{}] {:>5.1}% | {} {} | {}{}    \x1b[K",
        bar,
        progress_pct,
        snap.stage.as_str(),
        context,
        format_duration(snap.elapsed_secs),
        stall_str
    );
    let _ = io::stderr().flush();
}

/// Print progress for non-TTY (structured log line)
fn print_log_progress(snap: &TelemetrySnapshot, is_stalled: bool) {
    eprintln!(
        "[HEARTBEAT] stage=\"{}\" iter={}/{} individuals={}/{} elapsed={:.0}s stalled={}",
        snap.stage.as_str(),
        snap.current_iteration,
        snap.total_iterations,
        snap.individuals_processed,
        snap.total_individuals,
        snap.elapsed_secs,
        is_stalled
    );
}
