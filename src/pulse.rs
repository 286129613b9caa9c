//! Edge-triggered HOT/COLD pulse monitor.
//!
//! Measures how long the gated signal (detected AND stable) stays in each state. The
//! resulting pulse widths confirm the transmitter's physical timing independently of
//! whether bit decoding succeeds.

use std::fmt;
use std::time::{Duration, Instant};

/// Transitions closer together than this are treated as contact bounce and not reported.
pub const DEFAULT_MIN_PULSE: Duration = Duration::from_millis(2);

/// State a pulse was measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PulseLevel {
    /// Signal present and stable.
    Hot,
    /// Signal absent or unstable.
    Cold,
}

impl PulseLevel {
    fn from_state(state: bool) -> Self {
        if state {
            PulseLevel::Hot
        } else {
            PulseLevel::Cold
        }
    }
}

impl fmt::Display for PulseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PulseLevel::Hot => "HOT",
            PulseLevel::Cold => "COLD",
        })
    }
}

/// A completed pulse: the state that just ended and how long it lasted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEvent {
    /// State that ended.
    pub level: PulseLevel,
    /// Time spent in that state.
    pub duration: Duration,
}

impl PulseEvent {
    /// Pulse width in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

impl fmt::Display for PulseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pulse: {:<4} {:4.0}ms", self.level.to_string(), self.duration_ms())
    }
}

/// Emits a [`PulseEvent`] whenever `detected && stable` changes state.
#[derive(Debug, Clone)]
pub struct PulseMonitor {
    min_pulse: Duration,
    last_state: bool,
    last_change: Instant,
}

impl PulseMonitor {
    /// Monitor starting COLD at `now`.
    pub fn new(min_pulse: Duration, now: Instant) -> Self {
        Self {
            min_pulse,
            last_state: false,
            last_change: now,
        }
    }

    /// Feed the two gate inputs. Returns the pulse that just ended, if any.
    ///
    /// The change time is updated on every transition, including filtered bounces.
    pub fn feed(&mut self, detected: bool, stable: bool, now: Instant) -> Option<PulseEvent> {
        let trigger = detected && stable;
        if trigger == self.last_state {
            return None;
        }

        let duration = now.saturating_duration_since(self.last_change);
        let event = (duration > self.min_pulse).then_some(PulseEvent {
            level: PulseLevel::from_state(self.last_state),
            duration,
        });

        self.last_state = trigger;
        self.last_change = now;
        event
    }

    /// Current gated state.
    pub fn is_hot(&self) -> bool {
        self.last_state
    }
}
