//! Per-tick receiver pipeline.
//!
//! One call to [`Receiver::process`] is one polling tick:
//!
//! ```text
//! raw events ──► PointTracker ──► slot 0 ──► StabilityClassifier
//!                     │                            │ detected && stable
//!                     │                 ┌──────────┴──────────┐
//!                     │            VlcDecoder            PulseMonitor
//!                     │           (bits → bytes)       (HOT/COLD widths)
//!                     └──► SessionRecorder (all four slots)
//! ```
//!
//! The decode gate (button B) decides whether the decoder and pulse monitor are fed and
//! whether a recording session is running. The classifier sees every tick so the
//! stability factor is meaningful the moment the gate opens.

use crate::config::ReceiverConfig;
use crate::decoder::VlcDecoder;
use crate::error::AppResult;
use crate::pulse::{PulseEvent, PulseMonitor};
use crate::recorder::{Recording, SessionRecorder};
use crate::stability::{SignalQuality, StabilityClassifier};
use crate::tracker::{InputEvent, Point2D, PointTracker, SlotUpdate, Slots};
use std::fmt;
use std::time::{Duration, Instant};

/// A byte delivered to the application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedId {
    /// Decoded byte.
    pub value: u8,
    /// Stability factor at the moment the frame completed.
    pub stability_factor: f64,
}

impl fmt::Display for DecodedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DECODED: 0x{:02X} (SF:{:.2})", self.value, self.stability_factor)
    }
}

/// Callback receiving every reported identifier.
pub type IdListener = Box<dyn FnMut(DecodedId) + Send>;

/// Human-oriented diagnostic produced during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Raw axis event (raw mode only).
    RawEvent { code: u16, value: u16 },
    /// A slot went from empty to visible (raw mode only).
    Burst { slot: usize, point: Point2D },
    /// Most recent bits after a bit was integrated.
    BitTrace(String),
    /// A completed HOT/COLD pulse.
    Pulse(PulseEvent),
    /// Periodic status while the gate is released.
    Monitor {
        p0: Option<Point2D>,
        quality: SignalQuality,
        stability_factor: f64,
    },
    /// A byte reported to the application.
    Decoded(DecodedId),
    /// A framed byte held back because the signal was not stable enough.
    Suppressed { value: u8, stability_factor: f64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::RawEvent { code, value } => write!(f, "[RAW IR] code:{code:2} val:{value:4}"),
            Diagnostic::Burst { slot, point } => write!(f, "[IR BURST] P{slot}:{point}"),
            Diagnostic::BitTrace(bits) => write!(f, "[VLC Trace: ...{bits}]"),
            Diagnostic::Pulse(pulse) => write!(f, "[{pulse}]"),
            Diagnostic::Monitor {
                p0,
                quality,
                stability_factor,
            } => {
                let p0 = p0.map_or_else(|| "----".to_string(), |p| p.to_string());
                write!(
                    f,
                    "Monitor: P0:{p0} | Quality: {quality} (SF:{stability_factor:.2})"
                )
            }
            Diagnostic::Decoded(id) => write!(f, "!!! {id} !!!"),
            Diagnostic::Suppressed {
                value,
                stability_factor,
            } => write!(f, "(suppressed 0x{value:02X}, SF:{stability_factor:.2})"),
        }
    }
}

/// Everything observable about one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Slot state after events and persistence were applied.
    pub points: Slots,
    /// Classification of slot 0 for this tick.
    pub stable: bool,
    pub stability_factor: f64,
    /// Identifiers reported this tick.
    pub decoded: Vec<DecodedId>,
    pub diagnostics: Vec<Diagnostic>,
    /// A recording session closed during this tick.
    pub finished: Option<Recording>,
}

/// The full receive pipeline.
pub struct Receiver {
    tracker: PointTracker,
    stability: StabilityClassifier,
    decoder: VlcDecoder,
    pulses: PulseMonitor,
    recorder: SessionRecorder,
    gate: bool,
    min_stability: f64,
    raw_mode: bool,
    monitor_interval: Duration,
    last_monitor: Option<Instant>,
    listener: Option<IdListener>,
}

impl Receiver {
    /// Build a receiver whose timers start at `now`.
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate.
    pub fn new(config: &ReceiverConfig, now: Instant) -> AppResult<Self> {
        config.validate()?;

        Ok(Self {
            tracker: PointTracker::new(config.persistence()),
            stability: StabilityClassifier::new(
                config.stability.radius,
                config.stability.window,
                config.anchor_timeout(),
            )?,
            decoder: VlcDecoder::new(config.bit_duration()?, config.decoder.duty_threshold, now)?,
            pulses: PulseMonitor::new(config.min_pulse()?, now),
            recorder: SessionRecorder::new(),
            gate: false,
            min_stability: config.report.min_stability,
            raw_mode: config.report.raw_mode,
            monitor_interval: config.monitor_interval(),
            last_monitor: None,
            listener: None,
        })
    }

    /// Register the application callback for reported identifiers.
    pub fn on_id<F>(&mut self, listener: F)
    where
        F: FnMut(DecodedId) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    /// Run one tick: apply `events` in order, then drive the processing chain.
    pub fn process(&mut self, events: &[InputEvent], now: Instant) -> TickReport {
        let mut report = TickReport::default();

        for event in events {
            self.apply_event(event, now, &mut report);
        }

        self.tracker.tick(now);
        let points = self.tracker.points();
        let p0 = points[0];
        let stable = self.stability.feed(p0, now);
        let stability_factor = self.stability.stability_factor();

        if self.gate {
            let detected = p0.is_some();
            let step = self.decoder.feed(detected && stable, now);
            if let Some(trace) = step.trace {
                tracing::debug!(%trace, "bit trace");
                report.diagnostics.push(Diagnostic::BitTrace(trace));
            }
            if let Some(value) = step.byte {
                self.report_byte(value, stability_factor, &mut report);
            }
            if let Some(pulse) = self.pulses.feed(detected, stable, now) {
                tracing::debug!(level = %pulse.level, duration_ms = pulse.duration_ms(), "pulse");
                report.diagnostics.push(Diagnostic::Pulse(pulse));
            }
        } else if self.monitor_due(now) {
            self.last_monitor = Some(now);
            report.diagnostics.push(Diagnostic::Monitor {
                p0,
                quality: SignalQuality::from_factor(stability_factor),
                stability_factor,
            });
        }

        self.recorder.tick(now, &points);

        report.points = points;
        report.stable = stable;
        report.stability_factor = stability_factor;
        report
    }

    fn apply_event(&mut self, event: &InputEvent, now: Instant, report: &mut TickReport) {
        match *event {
            InputEvent::Button { pressed } => self.set_gate(pressed, now, report),
            InputEvent::Axis { .. } => {
                if let Some((code, value)) = event.raw_abs() {
                    self.recorder.record_raw(now, code, value);
                    if self.raw_mode {
                        report.diagnostics.push(Diagnostic::RawEvent { code, value });
                    }
                }
                if let SlotUpdate::Appeared(point) = self.tracker.apply(event, now) {
                    if self.raw_mode {
                        if let InputEvent::Axis { slot, .. } = *event {
                            report.diagnostics.push(Diagnostic::Burst { slot, point });
                        }
                    }
                }
            }
        }
    }

    fn set_gate(&mut self, pressed: bool, now: Instant, report: &mut TickReport) {
        match (self.gate, pressed) {
            (false, true) => {
                tracing::info!("decode gate opened");
                self.recorder.start(now);
            }
            (true, false) => {
                tracing::info!("decode gate closed");
                report.finished = self.recorder.stop();
            }
            _ => {}
        }
        self.gate = pressed;
    }

    fn report_byte(&mut self, value: u8, stability_factor: f64, report: &mut TickReport) {
        if stability_factor <= self.min_stability {
            tracing::debug!(value, stability_factor, "frame suppressed, signal unstable");
            report.diagnostics.push(Diagnostic::Suppressed {
                value,
                stability_factor,
            });
            return;
        }

        let id = DecodedId {
            value,
            stability_factor,
        };
        tracing::info!(%id, "identifier decoded");
        if let Some(listener) = self.listener.as_mut() {
            listener(id);
        }
        report.decoded.push(id);
        report.diagnostics.push(Diagnostic::Decoded(id));
    }

    fn monitor_due(&self, now: Instant) -> bool {
        self.last_monitor
            .map_or(true, |last| now.saturating_duration_since(last) >= self.monitor_interval)
    }

    /// Close the gate and return any recording in progress.
    pub fn shutdown(&mut self) -> Option<Recording> {
        self.gate = false;
        self.recorder.stop()
    }

    /// Slot state as of the last tick.
    pub fn points(&self) -> Slots {
        self.tracker.points()
    }

    /// Rolling stability factor of slot 0.
    pub fn stability_factor(&self) -> f64 {
        self.stability.stability_factor()
    }

    /// Quality label of slot 0.
    pub fn quality(&self) -> SignalQuality {
        self.stability.quality()
    }

    /// Whether the decode gate is open.
    pub fn is_gated(&self) -> bool {
        self.gate
    }

    /// Whether a recording session is running.
    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// The bit decoder.
    pub fn decoder(&self) -> &VlcDecoder {
        &self.decoder
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("gate", &self.gate)
            .field("points", &self.tracker.points())
            .field("stability_factor", &self.stability.stability_factor())
            .field("recording", &self.recorder.is_recording())
            .finish_non_exhaustive()
    }
}
