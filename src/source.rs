//! Event sources feeding the receiver.
//!
//! The live device reader is an external collaborator; inside the crate events come
//! from one of two sources:
//! - [`ReplaySource`] plays back a raw event log (`ts, code, val`) captured during a
//!   recording session.
//! - [`BeaconSimulator`] is a mock transmitter that blinks one point according to the
//!   start/stop framing, for demos, tests and benches.
//!
//! Both hold the decode gate pressed while they run and release it when done, so a
//! receiver driven by them records exactly one session.

use crate::decoder::frame_bits;
use crate::error::{AppResult, VlcError};
use crate::tracker::{InputEvent, Point2D, SENTINEL};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "storage_csv")]
use serde::Deserialize;
use std::collections::VecDeque;
#[cfg(feature = "storage_csv")]
use std::io::Read;
#[cfg(feature = "storage_csv")]
use std::path::Path;
use std::time::{Duration, Instant};

/// Producer of input events for one polling tick.
pub trait EventSource: Send {
    /// Events that happened up to `now`, in order.
    fn poll(&mut self, now: Instant) -> AppResult<Vec<InputEvent>>;

    /// Whether the source has nothing more to deliver.
    fn is_finished(&self) -> bool {
        false
    }
}

/// One event of a raw log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    /// Offset from the start of the log.
    pub offset: Duration,
    /// Event delivered at `offset`.
    pub event: InputEvent,
}

#[cfg(feature = "storage_csv")]
#[derive(Debug, Deserialize)]
struct RawRow {
    ts: f64,
    code: u16,
    val: i32,
}

/// Trailing time the gate stays pressed after the last logged event.
pub const DEFAULT_REPLAY_TAIL: Duration = Duration::from_millis(500);

/// Replays a raw event log against the clock it is polled with.
///
/// The first poll defines the replay origin; each logged event is delivered on the
/// first poll at or after `origin + offset`, where the offset is measured from the first
/// logged row.
#[derive(Debug)]
pub struct ReplaySource {
    pending: VecDeque<TimedEvent>,
    tail: Duration,
    last_offset: Duration,
    origin: Option<Instant>,
    released: bool,
}

impl ReplaySource {
    /// Build from already decoded events. Events must be in time order.
    pub fn new(events: Vec<TimedEvent>) -> Self {
        let last_offset = events.last().map_or(Duration::ZERO, |e| e.offset);
        Self {
            pending: events.into(),
            tail: DEFAULT_REPLAY_TAIL,
            last_offset,
            origin: None,
            released: false,
        }
    }

    /// Keep the gate pressed this long after the final event.
    pub fn with_tail(mut self, tail: Duration) -> Self {
        self.tail = tail;
        self
    }

    /// Load a raw event log from a CSV file.
    #[cfg(feature = "storage_csv")]
    pub fn from_path<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "loading raw event log");
        Self::from_reader(std::fs::File::open(path)?)
    }

    /// Load a raw event log from CSV with a `ts,code,val` header.
    ///
    /// Timestamps are taken relative to the first row, so captures stamped in epoch seconds
    /// replay the same as ones stamped from session start. Offsets are rounded to the
    /// microsecond the log is written with.
    ///
    /// Rows with codes outside the IR axis range are skipped with a warning. Rows that do not
    /// parse, carry an invalid timestamp or go back in time are errors.
    #[cfg(feature = "storage_csv")]
    pub fn from_reader<R: Read>(reader: R) -> AppResult<Self> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut events = Vec::new();
        let mut first: Option<f64> = None;
        let mut previous = f64::NEG_INFINITY;

        for (index, result) in csv.deserialize::<RawRow>().enumerate() {
            // Header is line 1.
            let line = index as u64 + 2;
            let row = result.map_err(|e| VlcError::Replay {
                line,
                message: e.to_string(),
            })?;

            if !row.ts.is_finite() || row.ts < 0.0 {
                return Err(VlcError::Replay {
                    line,
                    message: format!("invalid timestamp {}", row.ts),
                });
            }
            if row.ts < previous {
                return Err(VlcError::Replay {
                    line,
                    message: format!("timestamp {} goes back in time", row.ts),
                });
            }
            previous = row.ts;

            let origin = *first.get_or_insert(row.ts);
            // Finite and non-negative, so the cast can only saturate.
            let micros = ((row.ts - origin) * 1e6).round() as u64;
            let offset = Duration::from_micros(micros);

            match InputEvent::from_abs(row.code, row.val) {
                Some(event) => events.push(TimedEvent { offset, event }),
                None => tracing::warn!(line, code = row.code, "skipping non-IR event"),
            }
        }

        tracing::debug!(events = events.len(), "raw event log loaded");
        Ok(Self::new(events))
    }

    /// Events not yet delivered.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl EventSource for ReplaySource {
    fn poll(&mut self, now: Instant) -> AppResult<Vec<InputEvent>> {
        let mut out = Vec::new();
        let origin = match self.origin {
            Some(origin) => origin,
            None => {
                self.origin = Some(now);
                out.push(InputEvent::Button { pressed: true });
                now
            }
        };
        let elapsed = now.saturating_duration_since(origin);

        while let Some(next) = self.pending.front() {
            if next.offset > elapsed {
                break;
            }
            out.push(next.event);
            self.pending.pop_front();
        }

        if !self.released && self.pending.is_empty() && elapsed >= self.last_offset + self.tail {
            self.released = true;
            out.push(InputEvent::Button { pressed: false });
        }
        Ok(out)
    }

    fn is_finished(&self) -> bool {
        self.released
    }
}

/// Idle bits sent before the first frame.
pub const DEFAULT_LEAD_IN_BITS: usize = 2;

/// Idle bits sent after each frame.
pub const DEFAULT_GAP_BITS: usize = 2;

/// Mock transmitter blinking slot 0 with framed bytes.
///
/// Light on is a visible point, light off an explicit sentinel pair so the point vanishes
/// immediately instead of lingering for the persistence time. With `jitter` set, each
/// reported position is offset by up to `jitter` units on both axes; keep `2 * jitter * √2`
/// below the stability radius or the signal will read as jumping.
#[derive(Debug)]
pub struct BeaconSimulator {
    bits: Vec<bool>,
    bit_duration: Duration,
    origin: Instant,
    position: Point2D,
    jitter: u16,
    rng: StdRng,
    started: bool,
    lit: bool,
    finished: bool,
}

impl BeaconSimulator {
    /// Transmit `ids` back to back, starting at `origin`.
    ///
    /// # Errors
    /// Returns a configuration error for a zero `bit_duration`.
    pub fn new(ids: &[u8], bit_duration: Duration, origin: Instant) -> AppResult<Self> {
        if bit_duration.is_zero() {
            return Err(VlcError::configuration("simulator bit_duration must be positive"));
        }

        let mut bits = vec![false; DEFAULT_LEAD_IN_BITS];
        for &id in ids {
            bits.extend(frame_bits(id));
            bits.extend(std::iter::repeat(false).take(DEFAULT_GAP_BITS));
        }

        Ok(Self {
            bits,
            bit_duration,
            origin,
            position: Point2D::new(512, 384),
            jitter: 0,
            rng: StdRng::seed_from_u64(0x1A5),
            started: false,
            lit: false,
            finished: false,
        })
    }

    /// Where the beacon appears on the sensor.
    pub fn with_position(mut self, position: Point2D) -> Self {
        self.position = position;
        self
    }

    /// Random positional noise in sensor units, from a seeded generator.
    pub fn with_jitter(mut self, jitter: u16, seed: u64) -> Self {
        self.jitter = jitter;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Full on/off schedule, one entry per bit.
    pub fn schedule(&self) -> &[bool] {
        &self.bits
    }

    /// Total transmission time.
    pub fn duration(&self) -> Duration {
        self.bit_duration * self.bits.len() as u32
    }

    fn bit_at(&self, now: Instant) -> Option<bool> {
        let elapsed = now.saturating_duration_since(self.origin);
        let index = elapsed.as_nanos() / self.bit_duration.as_nanos();
        usize::try_from(index).ok().and_then(|i| self.bits.get(i).copied())
    }

    fn jittered(&mut self) -> Point2D {
        if self.jitter == 0 {
            return self.position;
        }
        let j = i32::from(self.jitter);
        let max = i32::from(SENTINEL - 1);
        let x = (i32::from(self.position.x) + self.rng.gen_range(-j..=j)).clamp(0, max);
        let y = (i32::from(self.position.y) + self.rng.gen_range(-j..=j)).clamp(0, max);
        // Clamped into 0..SENTINEL, so the casts are lossless.
        Point2D::new(x as u16, y as u16)
    }
}

impl EventSource for BeaconSimulator {
    fn poll(&mut self, now: Instant) -> AppResult<Vec<InputEvent>> {
        let mut out = Vec::new();
        if self.finished {
            return Ok(out);
        }
        if !self.started {
            self.started = true;
            out.push(InputEvent::Button { pressed: true });
        }

        match self.bit_at(now) {
            Some(true) => {
                let point = self.jittered();
                out.extend(InputEvent::point(0, point));
                self.lit = true;
            }
            Some(false) => {
                if self.lit {
                    out.extend(InputEvent::lost(0));
                    self.lit = false;
                }
            }
            None => {
                if self.lit {
                    out.extend(InputEvent::lost(0));
                    self.lit = false;
                }
                out.push(InputEvent::Button { pressed: false });
                self.finished = true;
                tracing::debug!("beacon transmission complete");
            }
        }
        Ok(out)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Axis;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    #[cfg(feature = "storage_csv")]
    fn replay_parses_and_delivers_by_offset() {
        let log = "ts,code,val\n0.000,16,100\n0.000,17,200\n0.050,16,1023\n";
        let mut source = ReplaySource::from_reader(log.as_bytes())
            .unwrap()
            .with_tail(ms(10));
        assert_eq!(source.remaining(), 3);

        let t0 = Instant::now();
        let first = source.poll(t0).unwrap();
        assert_eq!(
            first,
            vec![
                InputEvent::Button { pressed: true },
                InputEvent::axis(0, Axis::X, 100),
                InputEvent::axis(0, Axis::Y, 200),
            ]
        );
        assert!(source.poll(t0 + ms(49)).unwrap().is_empty());
        assert_eq!(
            source.poll(t0 + ms(50)).unwrap(),
            vec![InputEvent::axis(0, Axis::X, SENTINEL)]
        );
        assert!(!source.is_finished());
        assert_eq!(
            source.poll(t0 + ms(60)).unwrap(),
            vec![InputEvent::Button { pressed: false }]
        );
        assert!(source.is_finished());
        assert!(source.poll(t0 + ms(70)).unwrap().is_empty());
    }

    #[test]
    #[cfg(feature = "storage_csv")]
    fn replay_skips_foreign_codes() {
        let log = "ts,code,val\n0.0,3,1\n0.1,23,5\n";
        let source = ReplaySource::from_reader(log.as_bytes()).unwrap();
        assert_eq!(source.remaining(), 1);
    }

    #[test]
    #[cfg(feature = "storage_csv")]
    fn replay_reports_bad_line() {
        let log = "ts,code,val\n0.0,16,1\nabc,16,2\n";
        let err = ReplaySource::from_reader(log.as_bytes()).unwrap_err();
        assert!(matches!(err, VlcError::Replay { line: 3, .. }));

        let log = "ts,code,val\n0.5,16,1\n0.1,16,2\n";
        let err = ReplaySource::from_reader(log.as_bytes()).unwrap_err();
        assert!(matches!(err, VlcError::Replay { line: 3, .. }));

        let log = "ts,code,val\n-1.0,16,1\n";
        assert!(ReplaySource::from_reader(log.as_bytes()).is_err());
    }

    #[test]
    #[cfg(feature = "storage_csv")]
    fn replay_offsets_start_at_first_row() {
        let log = "ts,code,val\n0.200000,16,7\n0.205000,17,9\n";
        let source = ReplaySource::from_reader(log.as_bytes()).unwrap();
        let offsets: Vec<Duration> = source.pending.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![Duration::ZERO, ms(5)]);
    }

    #[test]
    fn simulator_schedule_frames_each_id() {
        let sim = BeaconSimulator::new(&[0xA5], ms(100), Instant::now()).unwrap();
        let mut expected = vec![false; DEFAULT_LEAD_IN_BITS];
        expected.extend(frame_bits(0xA5));
        expected.extend([false; DEFAULT_GAP_BITS]);
        assert_eq!(sim.schedule(), expected.as_slice());
        assert_eq!(sim.duration(), ms(1400));
    }

    #[test]
    fn simulator_blinks_and_releases_gate() {
        let t0 = Instant::now();
        let mut sim = BeaconSimulator::new(&[0xFF], ms(10), t0).unwrap();

        // Lead-in: gate press only.
        assert_eq!(
            sim.poll(t0).unwrap(),
            vec![InputEvent::Button { pressed: true }]
        );
        // Start bit: point visible.
        let lit = sim.poll(t0 + ms(20)).unwrap();
        assert_eq!(lit, InputEvent::point(0, Point2D::new(512, 384)).to_vec());
        // Stop bit: explicit loss, once.
        assert_eq!(sim.poll(t0 + ms(110)).unwrap(), InputEvent::lost(0).to_vec());
        assert!(sim.poll(t0 + ms(115)).unwrap().is_empty());
        // Past the schedule.
        assert_eq!(
            sim.poll(t0 + ms(140)).unwrap(),
            vec![InputEvent::Button { pressed: false }]
        );
        assert!(sim.is_finished());
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let t0 = Instant::now();
        let mut sim = BeaconSimulator::new(&[0xFF], ms(10), t0)
            .unwrap()
            .with_jitter(8, 7);
        for _ in 0..100 {
            let p = sim.jittered();
            assert!(p.x.abs_diff(512) <= 8);
            assert!(p.y.abs_diff(384) <= 8);
        }
    }

    #[test]
    fn zero_bit_duration_is_rejected() {
        assert!(BeaconSimulator::new(&[1], Duration::ZERO, Instant::now()).is_err());
    }
}
