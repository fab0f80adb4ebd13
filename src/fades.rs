//! Transition scheduler - timed parameter fades
//!
//! A fade request is expanded once into the full list of 7-bit values to send,
//! one per tick. All active fades share a single tick; the owner of the
//! scheduler drives it by calling [`TransitionScheduler::tick`] every
//! [`TransitionScheduler::tick_interval_ms`] while
//! [`TransitionScheduler::is_running`] reports true.
//!
//! ## Key Features:
//! - **One job per path**: a new fade on a path replaces the old one outright
//! - **dB-aware interpolation**: optional stepping in fader-position space
//! - **Lazy tick**: nothing to service once the last job finishes
//! - **No errors**: invalid durations degrade to an immediate write

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use crate::codec::{
    fader_byte_to_position, fader_byte_to_position01, position01_to_fader_byte,
    position_to_fader_byte,
};
use crate::easing::Easing;
use crate::state::{ParameterPath, ParameterStore};

/// Default tick interval (ms)
pub const DEFAULT_TICK_MS: u64 = 50;
/// Shortest accepted tick interval (ms)
pub const MIN_TICK_MS: u64 = 10;
/// Longest accepted tick interval (ms)
pub const MAX_TICK_MS: u64 = 1000;
/// Longest fade (ms); longer requests are shortened to this
pub const MAX_DURATION_MS: f64 = 60_000.0;

/// A fade request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub path: ParameterPath,
    /// Current value, `None` when the console has not reported it yet
    pub from: Option<u8>,
    pub to: u8,
    pub duration_ms: f64,
    pub easing: Easing,
    /// Interpolate in fader-position space instead of raw byte space
    pub map_db: bool,
}

/// Outcome of [`TransitionScheduler::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Write this value now; no job was created
    Immediate(u8),
    /// A job with this many steps is waiting for ticks
    Scheduled { steps: usize },
}

#[derive(Debug)]
struct TransitionJob {
    steps: VecDeque<u8>,
    last_sent: Option<u8>,
}

/// Path-keyed fade jobs sharing one tick
#[derive(Debug)]
pub struct TransitionScheduler {
    jobs: HashMap<ParameterPath, TransitionJob>,
    tick_interval_ms: u64,
    running: bool,
}

impl TransitionScheduler {
    pub fn new(tick_interval_ms: u64) -> Self {
        Self {
            jobs: HashMap::new(),
            tick_interval_ms: clamp_tick(tick_interval_ms),
            running: false,
        }
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    /// Change the tick interval; returns the clamped value actually applied
    ///
    /// Steps already computed are kept, so the owner must retime its tick at
    /// once or running fades would drift from their step count.
    pub fn set_tick_interval(&mut self, ms: u64) -> u64 {
        self.tick_interval_ms = clamp_tick(ms);
        self.tick_interval_ms
    }

    /// Whether the shared tick must keep firing
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Start a fade, replacing any fade already running on the same path
    ///
    /// The store is set to the target right away so that later requests fade
    /// from where this one is heading.
    pub fn run(&mut self, store: &mut ParameterStore, transition: Transition) -> Schedule {
        let Transition {
            path,
            from,
            to,
            duration_ms,
            easing,
            map_db,
        } = transition;
        let to = to & 0x7F;
        store.set(path, to);

        let step_count = self.step_count(duration_ms);
        let from = match from {
            Some(from) if step_count > 1 => from & 0x7F,
            _ => {
                self.cancel(&path);
                trace!(%path, to, "Immediate write");
                return Schedule::Immediate(to);
            }
        };

        let steps = build_steps(from, to, step_count, easing, map_db);
        debug!(
            %path,
            from,
            to,
            steps = steps.len(),
            %easing,
            map_db,
            "Fade scheduled"
        );

        self.jobs.insert(
            path,
            TransitionJob {
                steps,
                last_sent: None,
            },
        );
        self.running = true;

        Schedule::Scheduled { steps: step_count }
    }

    /// Advance every job by one step and return the writes to perform
    ///
    /// A step equal to the last value written for its job is not repeated.
    /// A fader moved by hand during a slow fade is therefore only corrected
    /// on the next step that changes the value, not on every tick.
    pub fn tick(&mut self) -> Vec<(ParameterPath, u8)> {
        let mut writes = Vec::with_capacity(self.jobs.len());

        self.jobs.retain(|path, job| {
            if let Some(value) = job.steps.pop_front() {
                if job.last_sent != Some(value) {
                    job.last_sent = Some(value);
                    writes.push((*path, value));
                }
            }
            !job.steps.is_empty()
        });

        if self.jobs.is_empty() && self.running {
            trace!("Fade tick idle");
            self.running = false;
        }

        writes
    }

    /// Drop the fade on `path`; returns whether one was running
    pub fn cancel(&mut self, path: &ParameterPath) -> bool {
        let removed = self.jobs.remove(path).is_some();
        if self.jobs.is_empty() {
            self.running = false;
        }
        removed
    }

    /// Drop every fade and stop the tick
    pub fn stop_all(&mut self) -> usize {
        let count = self.jobs.len();
        self.jobs.clear();
        self.running = false;
        count
    }

    /// Number of ticks a fade of `duration_ms` spans; 0 for unusable durations
    fn step_count(&self, duration_ms: f64) -> usize {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return 0;
        }
        let duration = duration_ms.min(MAX_DURATION_MS);
        (duration / self.tick_interval_ms as f64).ceil() as usize
    }
}

impl Default for TransitionScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_MS)
    }
}

fn clamp_tick(ms: u64) -> u64 {
    ms.clamp(MIN_TICK_MS, MAX_TICK_MS)
}

fn build_steps(from: u8, to: u8, step_count: usize, easing: Easing, map_db: bool) -> VecDeque<u8> {
    let (start, end) = if map_db {
        (fader_byte_to_position(from), fader_byte_to_position(to))
    } else {
        (fader_byte_to_position01(from), fader_byte_to_position01(to))
    };
    let diff = end - start;

    let mut steps: VecDeque<u8> = (1..=step_count)
        .map(|i| {
            let position = start + diff * easing.apply(i as f64 / step_count as f64);
            if map_db {
                position_to_fader_byte(position)
            } else {
                position01_to_fader_byte(position)
            }
        })
        .collect();

    // The mapped round trip may land one off; the fade must end on target
    if let Some(last) = steps.back_mut() {
        *last = to;
    }
    steps
}
