//! Run-length encoded recording of the tracked slots.
//!
//! While a session is active, every tick with at least one visible point becomes a full
//! row. Quiet stretches collapse into a single idle row whose duration keeps growing
//! until a point shows up again. Raw axis events can be logged alongside for later replay.

use crate::tracker::{Slots, SLOT_COUNT};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// One recorded sample, or a collapsed run of empty ticks when `idle` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRow {
    /// Time since the session started.
    pub timestamp: Duration,
    /// Length of the idle run this row stands for (zero for a sample).
    pub idle: Duration,
    /// Slot contents at `timestamp`; all empty for an idle row.
    pub points: Slots,
}

impl RecordedRow {
    /// Whether the row stands for an empty stretch rather than a sample.
    pub fn is_idle(&self) -> bool {
        !self.idle.is_zero() || self.points.iter().all(Option::is_none)
    }

    /// Idle run length in milliseconds.
    pub fn idle_ms(&self) -> f64 {
        self.idle.as_secs_f64() * 1000.0
    }
}

/// A raw axis event captured during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    /// Time since the session started.
    pub timestamp: Duration,
    /// evdev axis code.
    pub code: u16,
    /// Axis value, with out-of-range readings stored as the sentinel.
    pub value: u16,
}

/// Everything captured between [`SessionRecorder::start`] and [`SessionRecorder::stop`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Wall-clock start of the session.
    pub started_at: DateTime<Utc>,
    /// Run-length encoded slot rows.
    pub rows: Vec<RecordedRow>,
    /// Axis events in arrival order.
    pub raw: Vec<RawSample>,
}

impl Recording {
    /// Whether nothing at all was captured.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.raw.is_empty()
    }
}

#[derive(Debug)]
struct ActiveSession {
    started: Instant,
    started_at: DateTime<Utc>,
    rows: Vec<RecordedRow>,
    raw: Vec<RawSample>,
    idle_since: Option<Instant>,
}

impl ActiveSession {
    fn offset(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}

/// Records slot presence while a session is active.
#[derive(Debug, Default)]
pub struct SessionRecorder {
    session: Option<ActiveSession>,
}

impl SessionRecorder {
    /// Idle recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new session at `now`. An unfinished session is discarded.
    pub fn start(&mut self, now: Instant) {
        if let Some(previous) = self.session.take() {
            tracing::warn!(
                rows = previous.rows.len(),
                "recording restarted, discarding unfinished session"
            );
        }
        self.session = Some(ActiveSession {
            started: now,
            started_at: Utc::now(),
            rows: Vec::new(),
            raw: Vec::new(),
            idle_since: None,
        });
        tracing::info!("recording started");
    }

    /// Record the slot state for this tick. No-op when no session is active.
    pub fn tick(&mut self, now: Instant, slots: &Slots) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let timestamp = session.offset(now);

        if slots.iter().any(Option::is_some) {
            session.rows.push(RecordedRow {
                timestamp,
                idle: Duration::ZERO,
                points: *slots,
            });
            session.idle_since = None;
            return;
        }

        let Some(idle_since) = session.idle_since else {
            session.idle_since = Some(now);
            return;
        };

        let idle = now.saturating_duration_since(idle_since);
        match session.rows.last_mut() {
            Some(last) if last.is_idle() => last.idle = idle,
            _ => session.rows.push(RecordedRow {
                timestamp,
                idle,
                points: [None; SLOT_COUNT],
            }),
        }
    }

    /// Log a raw axis event. No-op when no session is active.
    pub fn record_raw(&mut self, now: Instant, code: u16, value: u16) {
        if let Some(session) = self.session.as_mut() {
            let timestamp = session.offset(now);
            session.raw.push(RawSample {
                timestamp,
                code,
                value,
            });
        }
    }

    /// End the session and hand over everything it captured.
    pub fn stop(&mut self) -> Option<Recording> {
        let session = self.session.take()?;
        tracing::info!(
            rows = session.rows.len(),
            raw = session.raw.len(),
            "recording stopped"
        );
        Some(Recording {
            started_at: session.started_at,
            rows: session.rows,
            raw: session.raw,
        })
    }

    /// Whether a session is active.
    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Rows captured so far in the active session.
    pub fn row_count(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.rows.len())
    }
}
