//! Anchor-based stability classification.
//!
//! A transmitter held in front of the camera shows up as a point that barely moves;
//! hand tremor, reflections and camera motion show up as points that jump around. Each
//! sample is compared with an anchor: inside `radius` it is stable and the anchor stays put,
//! otherwise it is a jump and the anchor moves to the new point. A slow drift therefore
//! reads as a jump once it has carried the point `radius` away from where it settled.

use crate::error::{AppResult, VlcError};
use crate::tracker::Point2D;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Default jump radius in sensor units.
pub const DEFAULT_RADIUS: f64 = 60.0;

/// Default number of classifications kept in the rolling window.
pub const DEFAULT_WINDOW: usize = 100;

/// How long the anchor survives without any point before it is dropped.
pub const DEFAULT_ANCHOR_TIMEOUT: Duration = Duration::from_millis(500);

/// Coarse label for the rolling stability factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalQuality {
    /// Factor above 0.8: a held, steady source.
    Fixed,
    /// Factor above 0.2: visible but moving.
    Jitter,
    /// Anything lower.
    Lost,
}

impl SignalQuality {
    /// Label for a stability factor in `[0, 1]`.
    pub fn from_factor(factor: f64) -> Self {
        if factor > 0.8 {
            SignalQuality::Fixed
        } else if factor > 0.2 {
            SignalQuality::Jitter
        } else {
            SignalQuality::Lost
        }
    }

    /// Upper-case label used in diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            SignalQuality::Fixed => "FIXED",
            SignalQuality::Jitter => "JITTER",
            SignalQuality::Lost => "LOST",
        }
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies point samples as stable or jumping and tracks a rolling stability factor.
#[derive(Debug, Clone)]
pub struct StabilityClassifier {
    radius: f64,
    window: usize,
    anchor_timeout: Duration,
    anchor: Option<Point2D>,
    last_seen: Option<Instant>,
    history: VecDeque<bool>,
    stable_count: usize,
}

impl StabilityClassifier {
    /// Create a classifier.
    ///
    /// # Errors
    /// Returns [`VlcError::Configuration`] for a non-positive or non-finite `radius`, or a
    /// zero-length window.
    pub fn new(radius: f64, window: usize, anchor_timeout: Duration) -> AppResult<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(VlcError::configuration(format!(
                "stability radius {radius} must be positive"
            )));
        }
        if window == 0 {
            return Err(VlcError::configuration("stability window must hold at least one sample"));
        }

        Ok(Self {
            radius,
            window,
            anchor_timeout,
            anchor: None,
            last_seen: None,
            history: VecDeque::with_capacity(window),
            stable_count: 0,
        })
    }

    /// Classifier with the given radius and default window and timeout.
    pub fn with_radius(radius: f64) -> AppResult<Self> {
        Self::new(radius, DEFAULT_WINDOW, DEFAULT_ANCHOR_TIMEOUT)
    }

    /// Classify one sample and update the rolling factor.
    pub fn feed(&mut self, point: Option<Point2D>, now: Instant) -> bool {
        let stable = match point {
            None => {
                let expired = self
                    .last_seen
                    .map_or(true, |seen| now.saturating_duration_since(seen) > self.anchor_timeout);
                if expired && self.anchor.take().is_some() {
                    tracing::trace!("anchor dropped after timeout");
                }
                false
            }
            Some(p) => {
                let stable = match self.anchor {
                    None => {
                        self.anchor = Some(p);
                        true
                    }
                    Some(anchor) => {
                        let distance = p.distance(anchor);
                        if distance >= self.radius {
                            tracing::trace!(?p, ?anchor, distance, "point jumped");
                            self.anchor = Some(p);
                            false
                        } else {
                            true
                        }
                    }
                };
                self.last_seen = Some(now);
                stable
            }
        };

        self.record(stable);
        stable
    }

    fn record(&mut self, stable: bool) {
        if self.history.len() == self.window {
            if let Some(true) = self.history.pop_front() {
                self.stable_count -= 1;
            }
        }
        self.history.push_back(stable);
        if stable {
            self.stable_count += 1;
        }
    }

    /// Fraction of stable samples in the rolling window (0.0 before any sample).
    pub fn stability_factor(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.stable_count as f64 / self.history.len() as f64
    }

    /// Label for the current factor.
    pub fn quality(&self) -> SignalQuality {
        SignalQuality::from_factor(self.stability_factor())
    }

    /// Current reference point.
    pub fn anchor(&self) -> Option<Point2D> {
        self.anchor
    }

    /// Number of classifications in the window.
    pub fn samples(&self) -> usize {
        self.history.len()
    }

    /// Configured jump radius.
    pub fn radius(&self) -> f64 {
        self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: u16, y: u16) -> Option<Point2D> {
        Some(Point2D::new(x, y))
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn classifier() -> StabilityClassifier {
        StabilityClassifier::with_radius(DEFAULT_RADIUS).unwrap()
    }

    #[test]
    fn first_point_defines_anchor_and_is_stable() {
        let mut sc = classifier();
        assert!(sc.feed(pt(512, 384), Instant::now()));
        assert_eq!(sc.anchor(), pt(512, 384));
        assert_eq!(sc.stability_factor(), 1.0);
    }

    #[test]
    fn repeated_point_drives_factor_to_one() {
        let t0 = Instant::now();
        let mut sc = classifier();
        for i in 0..50 {
            assert!(!sc.feed(None, t0 + ms(i)));
        }
        let mut previous = sc.stability_factor();
        assert_eq!(previous, 0.0);

        for i in 50..200 {
            assert!(sc.feed(pt(300, 300), t0 + ms(i)));
            let factor = sc.stability_factor();
            assert!(factor >= previous);
            previous = factor;
        }
        assert_eq!(sc.stability_factor(), 1.0);
        assert_eq!(sc.quality(), SignalQuality::Fixed);
    }

    #[test]
    fn anchor_follows_a_jump() {
        let t0 = Instant::now();
        let mut sc = classifier();
        assert!(sc.feed(pt(100, 100), t0));
        assert!(!sc.feed(pt(600, 500), t0 + ms(5)));
        assert_eq!(sc.anchor(), pt(600, 500));
        assert!(sc.feed(pt(600, 500), t0 + ms(10)));
    }

    #[test]
    fn small_steps_keep_anchor_until_drift_reaches_radius() {
        let t0 = Instant::now();
        let mut sc = classifier();
        let seen: Vec<bool> = (0..5u16)
            .map(|i| sc.feed(pt(i * 20, 0), t0 + ms(u64::from(i) * 5)))
            .collect();
        assert_eq!(seen, vec![true, true, true, false, true]);
        assert_eq!(sc.anchor(), pt(60, 0));
    }

    #[test]
    fn stable_sample_leaves_anchor_in_place() {
        let t0 = Instant::now();
        let mut sc = classifier();
        sc.feed(pt(100, 100), t0);
        assert!(sc.feed(pt(130, 100), t0 + ms(5)));
        assert_eq!(sc.anchor(), pt(100, 100));
    }

    #[test]
    fn distance_equal_to_radius_is_a_jump() {
        let t0 = Instant::now();
        let mut sc = classifier();
        sc.feed(pt(0, 0), t0);
        // 36-48-60 triangle.
        assert!(!sc.feed(pt(36, 48), t0));
        assert!(sc.feed(pt(36, 107), t0));
    }

    #[test]
    fn short_dropout_keeps_anchor() {
        let t0 = Instant::now();
        let mut sc = classifier();
        sc.feed(pt(200, 200), t0);
        assert!(!sc.feed(None, t0 + ms(400)));
        assert_eq!(sc.anchor(), pt(200, 200));
        // Far point is still judged against the old anchor.
        assert!(!sc.feed(pt(800, 800), t0 + ms(450)));
    }

    #[test]
    fn long_dropout_forces_reacquisition() {
        let t0 = Instant::now();
        let mut sc = classifier();
        sc.feed(pt(200, 200), t0);
        sc.feed(None, t0 + ms(500));
        assert!(sc.anchor().is_some());
        sc.feed(None, t0 + ms(501));
        assert!(sc.anchor().is_none());
        assert!(sc.feed(pt(800, 800), t0 + ms(510)));
    }

    #[test]
    fn window_is_capped() {
        let t0 = Instant::now();
        let mut sc = StabilityClassifier::new(10.0, 4, DEFAULT_ANCHOR_TIMEOUT).unwrap();
        for _ in 0..4 {
            sc.feed(None, t0);
        }
        assert_eq!(sc.stability_factor(), 0.0);
        sc.feed(pt(1, 1), t0);
        sc.feed(pt(1, 1), t0);
        assert_eq!(sc.samples(), 4);
        assert_eq!(sc.stability_factor(), 0.5);
        sc.feed(pt(1, 1), t0);
        sc.feed(pt(1, 1), t0);
        assert_eq!(sc.stability_factor(), 1.0);
    }

    #[test]
    fn quality_label_boundaries() {
        assert_eq!(SignalQuality::from_factor(0.81), SignalQuality::Fixed);
        assert_eq!(SignalQuality::from_factor(0.8), SignalQuality::Jitter);
        assert_eq!(SignalQuality::from_factor(0.21), SignalQuality::Jitter);
        assert_eq!(SignalQuality::from_factor(0.2), SignalQuality::Lost);
        assert_eq!(SignalQuality::from_factor(0.0), SignalQuality::Lost);
        assert_eq!(SignalQuality::Jitter.to_string(), "JITTER");
    }

    #[test]
    fn rejects_invalid_radius_and_window() {
        assert!(StabilityClassifier::with_radius(0.0).is_err());
        assert!(StabilityClassifier::with_radius(-5.0).is_err());
        assert!(StabilityClassifier::with_radius(f64::NAN).is_err());
        assert!(StabilityClassifier::new(50.0, 0, DEFAULT_ANCHOR_TIMEOUT).is_err());
    }
}
