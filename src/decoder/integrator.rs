//! Duty-cycle bit integrator.
//!
//! The light-on signal arrives at whatever rate the sensor is polled, which is neither
//! regular nor aligned to the transmitter. Instead of sampling it instantaneously, the
//! integrator measures how long the signal was active inside each `bit_duration` window
//! and quantizes the duty cycle into one bit per window.

use crate::error::{AppResult, VlcError};
use std::time::{Duration, Instant};

/// Duty cycle above which a window decodes as `1`.
///
/// Deliberately low so that fast or dim transmitters that only light up for a fraction
/// of the window still register.
pub const DEFAULT_DUTY_THRESHOLD: f64 = 0.05;

/// Converts a continuous "light is on" signal into a stream of bits.
#[derive(Debug, Clone)]
pub struct BitIntegrator {
    bit_duration: Duration,
    duty_threshold: f64,
    last_update: Instant,
    accumulated_active: Duration,
    bit_progress: Duration,
    active: bool,
}

impl BitIntegrator {
    /// Create an integrator whose first window starts at `now`.
    ///
    /// # Errors
    /// Returns [`VlcError::Configuration`] if `bit_duration` is zero or `duty_threshold`
    /// is not within `[0, 1)`.
    pub fn new(bit_duration: Duration, duty_threshold: f64, now: Instant) -> AppResult<Self> {
        if bit_duration.is_zero() {
            return Err(VlcError::configuration("bit_duration must be positive"));
        }
        if !duty_threshold.is_finite() || !(0.0..1.0).contains(&duty_threshold) {
            return Err(VlcError::configuration(format!(
                "duty_threshold {duty_threshold} must be within [0, 1)"
            )));
        }

        Ok(Self {
            bit_duration,
            duty_threshold,
            last_update: now,
            accumulated_active: Duration::ZERO,
            bit_progress: Duration::ZERO,
            active: false,
        })
    }

    /// Create an integrator from a bit duration in (fractional) seconds.
    pub fn from_secs(bit_duration_secs: f64, duty_threshold: f64, now: Instant) -> AppResult<Self> {
        let bit_duration = secs_to_duration(bit_duration_secs)?;
        Self::new(bit_duration, duty_threshold, now)
    }

    /// Feed the current detection state.
    ///
    /// The interval since the previous call is attributed to the state supplied by the
    /// *previous* call. Returns the decoded bit when the current window is complete.
    pub fn feed(&mut self, detected: bool, now: Instant) -> Option<bool> {
        let dt = now.saturating_duration_since(self.last_update);
        self.last_update = now;

        if self.active {
            self.accumulated_active += dt;
        }
        self.bit_progress += dt;
        self.active = detected;

        if self.bit_progress < self.bit_duration {
            return None;
        }

        let bit = self.duty() > self.duty_threshold;
        self.bit_progress = Duration::ZERO;
        self.accumulated_active = Duration::ZERO;
        Some(bit)
    }

    /// Active fraction of the window accumulated so far (0.0 for an empty window).
    pub fn duty(&self) -> f64 {
        if self.bit_progress.is_zero() {
            return 0.0;
        }
        self.accumulated_active.as_secs_f64() / self.bit_progress.as_secs_f64()
    }

    /// Configured window length.
    pub fn bit_duration(&self) -> Duration {
        self.bit_duration
    }

    /// Time elapsed in the current window.
    pub fn bit_progress(&self) -> Duration {
        self.bit_progress
    }

    /// Active time accumulated in the current window.
    pub fn accumulated_active(&self) -> Duration {
        self.accumulated_active
    }

    /// Detection state carried into the next interval.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Convert a positive, finite number of seconds into a `Duration`.
pub(crate) fn secs_to_duration(secs: f64) -> AppResult<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(VlcError::configuration(format!(
            "bit_duration {secs}s must be a positive, finite number of seconds"
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| VlcError::configuration(e.to_string()))
}
