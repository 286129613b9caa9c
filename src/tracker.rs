//! Four-slot IR point tracker with visibility persistence.
//!
//! The camera reports up to four points, one axis value per event, with `1023` on both
//! axes meaning "no point". Slots are assembled from these per-axis events and kept
//! visible for a short persistence window after the last update, so a continuously
//! visible source that the sensor drops for a frame or two is not reported as flickering.
//!
//! # Event codes
//!
//! Raw events follow the Linux input layout used by the Wii remote IR device:
//! `ABS_HAT0X` (16) through `ABS_HAT3Y` (23), two codes per slot, X first. The button that
//! gates decoding is `BTN_EAST`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Number of tracked point slots.
pub const SLOT_COUNT: usize = 4;

/// Axis value reported when the sensor has no point.
pub const SENTINEL: u16 = 1023;

/// Default grace period a point stays visible without fresh events.
pub const DEFAULT_PERSISTENCE: Duration = Duration::from_millis(150);

/// First IR axis event code (`ABS_HAT0X`).
pub const ABS_HAT0X: u16 = 16;

/// Last IR axis event code (`ABS_HAT3Y`).
pub const ABS_HAT3Y: u16 = 23;

/// Key code of the button gating decoding and recording (`BTN_EAST`, "B").
pub const BTN_EAST: u16 = 0x131;

/// A point in sensor space, 0..=1023 per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point2D {
    /// Horizontal coordinate.
    pub x: u16,
    /// Vertical coordinate.
    pub y: u16,
}

impl Point2D {
    /// Construct a point.
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Point2D) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }
}

impl fmt::Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:4},{:4})", self.x, self.y)
    }
}

/// Snapshot of all slots.
pub type Slots = [Option<Point2D>; SLOT_COUNT];

/// Sensor axis of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal.
    X,
    /// Vertical.
    Y,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }
}

/// Event delivered by the hardware event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// One axis of one point slot.
    Axis { slot: usize, axis: Axis, value: u16 },
    /// Decode/record gate button.
    Button { pressed: bool },
}

impl InputEvent {
    /// Axis event shorthand.
    pub fn axis(slot: usize, axis: Axis, value: u16) -> Self {
        InputEvent::Axis { slot, axis, value }
    }

    /// Both axes of a visible point, X first.
    pub fn point(slot: usize, point: Point2D) -> [Self; 2] {
        [
            Self::axis(slot, Axis::X, point.x),
            Self::axis(slot, Axis::Y, point.y),
        ]
    }

    /// Both axes set to the sentinel, X first.
    pub fn lost(slot: usize) -> [Self; 2] {
        [
            Self::axis(slot, Axis::X, SENTINEL),
            Self::axis(slot, Axis::Y, SENTINEL),
        ]
    }

    /// Decode an absolute-axis event. Codes outside the IR range yield `None`.
    ///
    /// Values outside `0..=1023` are read as the sentinel.
    pub fn from_abs(code: u16, value: i32) -> Option<Self> {
        if !(ABS_HAT0X..=ABS_HAT3Y).contains(&code) {
            return None;
        }
        let offset = usize::from(code - ABS_HAT0X);
        let axis = if offset % 2 == 0 { Axis::X } else { Axis::Y };
        let value = u16::try_from(value)
            .ok()
            .filter(|v| *v <= SENTINEL)
            .unwrap_or(SENTINEL);
        Some(Self::axis(offset / 2, axis, value))
    }

    /// Decode a key event. Only the gate button is recognised.
    pub fn from_key(code: u16, value: i32) -> Option<Self> {
        (code == BTN_EAST).then_some(InputEvent::Button { pressed: value != 0 })
    }

    /// Raw `(code, value)` pair of an axis event.
    pub fn raw_abs(&self) -> Option<(u16, u16)> {
        match *self {
            InputEvent::Axis { slot, axis, value } if slot < SLOT_COUNT => {
                let code = ABS_HAT0X + (slot * 2 + axis.index()) as u16;
                Some((code, value))
            }
            _ => None,
        }
    }
}

/// What an axis event did to its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotUpdate {
    /// Slot index out of range.
    Ignored,
    /// Both axes read the sentinel; the slot is now empty.
    Cleared,
    /// The slot was empty and now holds a point.
    Appeared(Point2D),
    /// The slot's point was updated.
    Moved(Point2D),
}

#[derive(Debug, Clone, Copy, Default)]
struct PointSlot {
    position: Option<Point2D>,
    expires_at: Option<Instant>,
}

/// Assembles per-axis events into four point slots.
#[derive(Debug, Clone)]
pub struct PointTracker {
    slots: [PointSlot; SLOT_COUNT],
    persistence: Duration,
}

impl PointTracker {
    /// Tracker with the given persistence window.
    pub fn new(persistence: Duration) -> Self {
        Self {
            slots: [PointSlot::default(); SLOT_COUNT],
            persistence,
        }
    }

    /// Apply one axis value to a slot.
    pub fn apply_axis_event(&mut self, slot: usize, axis: Axis, value: u16, now: Instant) -> SlotUpdate {
        let Some(entry) = self.slots.get_mut(slot) else {
            tracing::trace!(slot, "axis event for unknown slot ignored");
            return SlotUpdate::Ignored;
        };

        let mut raw = entry
            .position
            .map_or([SENTINEL, SENTINEL], |p| [p.x, p.y]);
        raw[axis.index()] = value.min(SENTINEL);

        if raw == [SENTINEL, SENTINEL] {
            entry.position = None;
            entry.expires_at = None;
            return SlotUpdate::Cleared;
        }

        let point = Point2D::new(raw[0], raw[1]);
        let appeared = entry.position.is_none();
        entry.position = Some(point);
        entry.expires_at = Some(now + self.persistence);

        if appeared {
            SlotUpdate::Appeared(point)
        } else {
            SlotUpdate::Moved(point)
        }
    }

    /// Apply an [`InputEvent`]. Button events leave the tracker untouched.
    pub fn apply(&mut self, event: &InputEvent, now: Instant) -> SlotUpdate {
        match *event {
            InputEvent::Axis { slot, axis, value } => self.apply_axis_event(slot, axis, value, now),
            InputEvent::Button { .. } => SlotUpdate::Ignored,
        }
    }

    /// Expire slots whose persistence window has passed. Returns how many were cleared.
    pub fn tick(&mut self, now: Instant) -> usize {
        let mut expired = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let stale = slot.position.is_some() && slot.expires_at.is_some_and(|at| now > at);
            if stale {
                tracing::trace!(slot = index, "point expired");
                slot.position = None;
                slot.expires_at = None;
                expired += 1;
            }
        }
        expired
    }

    /// Current position of every slot.
    pub fn points(&self) -> Slots {
        self.slots.map(|s| s.position)
    }

    /// Current position of one slot.
    pub fn point(&self, slot: usize) -> Option<Point2D> {
        self.slots.get(slot).and_then(|s| s.position)
    }

    /// When a slot's point will expire without fresh events.
    pub fn expires_at(&self, slot: usize) -> Option<Instant> {
        self.slots.get(slot).and_then(|s| s.expires_at)
    }

    /// Whether any slot holds a point.
    pub fn any_visible(&self) -> bool {
        self.slots.iter().any(|s| s.position.is_some())
    }
}

impl Default for PointTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PERSISTENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn point_assembles_from_two_axis_events() {
        let t0 = Instant::now();
        let mut tracker = PointTracker::default();

        assert_eq!(
            tracker.apply_axis_event(0, Axis::X, 512, t0),
            SlotUpdate::Appeared(Point2D::new(512, SENTINEL))
        );
        assert_eq!(
            tracker.apply_axis_event(0, Axis::Y, 384, t0),
            SlotUpdate::Moved(Point2D::new(512, 384))
        );
        assert_eq!(tracker.point(0), Some(Point2D::new(512, 384)));
        assert_eq!(tracker.points()[1..], [None, None, None]);
    }

    #[test]
    fn sentinel_pair_clears_immediately() {
        let t0 = Instant::now();
        let mut tracker = PointTracker::default();
        for e in InputEvent::point(2, Point2D::new(10, 20)) {
            tracker.apply(&e, t0);
        }
        assert!(tracker.point(2).is_some());

        tracker.apply_axis_event(2, Axis::X, SENTINEL, t0);
        assert_eq!(tracker.point(2), Some(Point2D::new(SENTINEL, 20)));
        assert_eq!(tracker.apply_axis_event(2, Axis::Y, SENTINEL, t0), SlotUpdate::Cleared);
        assert_eq!(tracker.point(2), None);
    }

    #[test]
    fn point_persists_for_exactly_the_window() {
        let t0 = Instant::now();
        let mut tracker = PointTracker::default();
        for e in InputEvent::point(0, Point2D::new(100, 100)) {
            tracker.apply(&e, t0);
        }

        assert_eq!(tracker.tick(t0 + ms(149)), 0);
        assert_eq!(tracker.tick(t0 + ms(150)), 0);
        assert!(tracker.point(0).is_some());

        assert_eq!(tracker.tick(t0 + ms(151)), 1);
        assert!(tracker.point(0).is_none());
    }

    #[test]
    fn fresh_events_extend_persistence() {
        let t0 = Instant::now();
        let mut tracker = PointTracker::default();
        tracker.apply_axis_event(1, Axis::X, 5, t0);
        tracker.apply_axis_event(1, Axis::X, 6, t0 + ms(100));
        tracker.tick(t0 + ms(200));
        assert_eq!(tracker.point(1), Some(Point2D::new(6, SENTINEL)));
        assert_eq!(tracker.expires_at(1), Some(t0 + ms(250)));
    }

    #[test]
    fn out_of_range_slot_is_ignored() {
        let mut tracker = PointTracker::default();
        assert_eq!(
            tracker.apply_axis_event(4, Axis::X, 1, Instant::now()),
            SlotUpdate::Ignored
        );
        assert!(!tracker.any_visible());
    }

    #[test]
    fn oversized_values_read_as_sentinel() {
        let t0 = Instant::now();
        let mut tracker = PointTracker::default();
        tracker.apply_axis_event(0, Axis::X, 4000, t0);
        assert_eq!(tracker.point(0), None);
        tracker.apply_axis_event(0, Axis::Y, 7, t0);
        assert_eq!(tracker.point(0), Some(Point2D::new(SENTINEL, 7)));
    }

    #[test]
    fn raw_codes_map_to_slots_and_axes() {
        assert_eq!(
            InputEvent::from_abs(16, 300),
            Some(InputEvent::axis(0, Axis::X, 300))
        );
        assert_eq!(
            InputEvent::from_abs(23, 12),
            Some(InputEvent::axis(3, Axis::Y, 12))
        );
        assert_eq!(
            InputEvent::from_abs(19, -4),
            Some(InputEvent::axis(1, Axis::Y, SENTINEL))
        );
        assert_eq!(InputEvent::from_abs(0, 5), None);
        assert_eq!(InputEvent::from_abs(24, 5), None);

        assert_eq!(
            InputEvent::axis(2, Axis::Y, 44).raw_abs(),
            Some((21, 44))
        );
        assert_eq!(InputEvent::Button { pressed: true }.raw_abs(), None);
    }

    #[test]
    fn gate_button_is_recognised() {
        assert_eq!(
            InputEvent::from_key(BTN_EAST, 1),
            Some(InputEvent::Button { pressed: true })
        );
        assert_eq!(
            InputEvent::from_key(BTN_EAST, 0),
            Some(InputEvent::Button { pressed: false })
        );
        assert_eq!(InputEvent::from_key(0x130, 1), None);
    }

    #[test]
    fn point_distance() {
        let a = Point2D::new(0, 0);
        let b = Point2D::new(3, 4);
        assert_eq!(a.distance(b), 5.0);
        assert_eq!(b.distance(a), 5.0);
    }
}
