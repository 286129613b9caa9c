//! Start/stop framing of the integrated bit stream.
//!
//! A frame is ten bits: a `1` start bit, eight data bits (most significant first) and a
//! `0` stop bit. The receiver may come up at any phase of the transmission, so alignment
//! is recovered by discarding one leading bit at a time until the head of the buffer
//! looks like a frame.
//!
//! # Locking
//!
//! The buffer lives behind an `Arc<parking_lot::Mutex<_>>`. The feeding loop goes through
//! [`FrameSynchronizer::push_bit`]; anything running in another scheduling context (a
//! display thread, a separate demodulation timer) holds a [`BitBufferHandle`] and gets
//! scoped exclusive access through [`BitBufferHandle::lock`]. The frame callback is run
//! after the lock has been released.

use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Number of bits in one frame.
pub const FRAME_BITS: usize = 10;

/// Number of trailing bits shown in a bit trace.
pub const TRACE_BITS: usize = 20;

/// Callback invoked with every decoded byte.
pub type FrameCallback = Box<dyn FnMut(u8) + Send>;

/// FIFO of integrated bits awaiting frame alignment.
///
/// Bits are appended at the tail and consumed from the head only.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BitBuffer {
    bits: VecDeque<bool>,
}

impl BitBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            bits: VecDeque::with_capacity(FRAME_BITS * 2),
        }
    }

    /// Append a bit at the tail.
    pub fn push(&mut self, bit: bool) {
        self.bits.push_back(bit);
    }

    /// Number of buffered bits.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Buffered bits, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }

    /// The most recent `n` bits rendered as `0`/`1` characters.
    pub fn trace(&self, n: usize) -> String {
        let skip = self.bits.len().saturating_sub(n);
        self.bits
            .iter()
            .skip(skip)
            .map(|&b| if b { '1' } else { '0' })
            .collect()
    }

    /// Try to take one frame from the head of the buffer.
    ///
    /// Misaligned leading bits are dropped one at a time. Stops after the first frame
    /// found, or once fewer than [`FRAME_BITS`] bits remain.
    pub fn take_frame(&mut self) -> Option<u8> {
        while self.bits.len() >= FRAME_BITS {
            if self.bits[0] && !self.bits[FRAME_BITS - 1] {
                let value = self
                    .bits
                    .range(1..FRAME_BITS - 1)
                    .fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit));
                self.bits.drain(..FRAME_BITS);
                return Some(value);
            }
            self.bits.pop_front();
        }
        None
    }

    /// Drop all buffered bits.
    pub fn clear(&mut self) {
        self.bits.clear();
    }
}

impl fmt::Display for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.trace(self.bits.len()))
    }
}

/// Shared handle to the synchronizer's bit buffer.
#[derive(Debug, Clone)]
pub struct BitBufferHandle(Arc<Mutex<BitBuffer>>);

impl BitBufferHandle {
    /// Scoped exclusive access to the buffer. The lock is released when the guard drops.
    pub fn lock(&self) -> MutexGuard<'_, BitBuffer> {
        self.0.lock()
    }

    /// Convenience for [`BitBuffer::trace`] under the lock.
    pub fn trace(&self, n: usize) -> String {
        self.0.lock().trace(n)
    }
}

/// Finds start/stop bounded frames in the bit stream and emits decoded bytes.
pub struct FrameSynchronizer {
    buffer: BitBufferHandle,
    on_frame: Option<FrameCallback>,
}

impl FrameSynchronizer {
    /// Create a synchronizer with no callback registered.
    pub fn new() -> Self {
        Self {
            buffer: BitBufferHandle(Arc::new(Mutex::new(BitBuffer::new()))),
            on_frame: None,
        }
    }

    /// Create a synchronizer that reports every decoded byte to `callback`.
    pub fn with_callback<F>(callback: F) -> Self
    where
        F: FnMut(u8) + Send + 'static,
    {
        let mut sync = Self::new();
        sync.set_callback(callback);
        sync
    }

    /// Register (or replace) the frame callback.
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.on_frame = Some(Box::new(callback));
    }

    /// Append a bit and attempt alignment. At most one byte is produced per bit.
    pub fn push_bit(&mut self, bit: bool) -> Option<u8> {
        self.push(bit, false).0
    }

    /// Like [`FrameSynchronizer::push_bit`], also returning the bit trace as it stood
    /// right after the append, before any frame was consumed.
    pub fn push_bit_traced(&mut self, bit: bool) -> (Option<u8>, String) {
        let (decoded, trace) = self.push(bit, true);
        (decoded, trace.unwrap_or_default())
    }

    fn push(&mut self, bit: bool, with_trace: bool) -> (Option<u8>, Option<String>) {
        let (decoded, trace) = {
            let mut buffer = self.buffer.lock();
            buffer.push(bit);
            let trace = with_trace.then(|| buffer.trace(TRACE_BITS));
            (buffer.take_frame(), trace)
        };

        if let Some(value) = decoded {
            tracing::debug!(value, "frame aligned");
            if let Some(callback) = self.on_frame.as_mut() {
                callback(value);
            }
        }
        (decoded, trace)
    }

    /// Handle for scoped access from other contexts.
    pub fn buffer(&self) -> BitBufferHandle {
        self.buffer.clone()
    }

    /// The most recent [`TRACE_BITS`] buffered bits.
    pub fn trace(&self) -> String {
        self.buffer.trace(TRACE_BITS)
    }

    /// Number of bits waiting for alignment.
    pub fn pending_bits(&self) -> usize {
        self.buffer.lock().len()
    }
}

impl Default for FrameSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSynchronizer")
            .field("buffer", &*self.buffer.lock())
            .field("has_callback", &self.on_frame.is_some())
            .finish()
    }
}

/// Frame bits for `value`: start bit, data MSB first, stop bit.
pub fn frame_bits(value: u8) -> [bool; FRAME_BITS] {
    let mut bits = [false; FRAME_BITS];
    bits[0] = true;
    for (i, slot) in bits[1..FRAME_BITS - 1].iter_mut().enumerate() {
        *slot = value & (0x80 >> i) != 0;
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn bits(pattern: &str) -> Vec<bool> {
        pattern.chars().map(|c| c == '1').collect()
    }

    fn feed(sync: &mut FrameSynchronizer, pattern: &[bool]) -> Vec<u8> {
        pattern.iter().filter_map(|&b| sync.push_bit(b)).collect()
    }

    #[test]
    fn decodes_a5_frame() {
        let mut sync = FrameSynchronizer::new();
        let out = feed(&mut sync, &bits("1101001010"));
        assert_eq!(out, vec![0xA5]);
        assert_eq!(sync.pending_bits(), 0);
    }

    #[test]
    fn frame_bits_round_trip_through_synchronizer() {
        for value in [0x00u8, 0x01, 0x7F, 0x80, 0xC3, 0xFF] {
            let mut sync = FrameSynchronizer::new();
            assert_eq!(feed(&mut sync, &frame_bits(value)), vec![value]);
        }
    }

    #[test]
    fn only_frame_bits_are_consumed() {
        let mut sync = FrameSynchronizer::new();
        let mut stream = frame_bits(0x3C).to_vec();
        stream.extend(bits("111"));
        let out = feed(&mut sync, &stream);
        assert_eq!(out, vec![0x3C]);
        assert_eq!(sync.pending_bits(), 3);
        assert_eq!(sync.trace(), "111");
    }

    #[test]
    fn leading_ones_are_discarded_one_at_a_time() {
        let mut sync = FrameSynchronizer::new();
        let mut stream = vec![true; 17];
        stream.extend(frame_bits(0xFF));
        assert_eq!(feed(&mut sync, &stream), vec![0xFF]);
        assert_eq!(sync.pending_bits(), 0);
    }

    #[test]
    fn single_leading_one_before_a5_resynchronizes() {
        let mut sync = FrameSynchronizer::new();
        let out = feed(&mut sync, &bits("11101001010"));
        assert_eq!(out, vec![0xA5]);
    }

    #[test]
    fn idle_zeros_before_frame_are_dropped() {
        let mut sync = FrameSynchronizer::new();
        let mut stream = vec![false; 25];
        stream.extend(frame_bits(0xA5));
        assert_eq!(feed(&mut sync, &stream), vec![0xA5]);
    }

    #[test]
    fn back_to_back_frames_decode_in_order() {
        let mut sync = FrameSynchronizer::new();
        let mut stream = Vec::new();
        for value in [0x12u8, 0x34, 0x56] {
            stream.extend(frame_bits(value));
        }
        assert_eq!(feed(&mut sync, &stream), vec![0x12, 0x34, 0x56]);
    }

    #[test]
    fn unaligned_stream_drains_without_output() {
        let mut sync = FrameSynchronizer::new();
        let out = feed(&mut sync, &vec![true; 200]);
        assert!(out.is_empty());
        assert!(sync.pending_bits() < FRAME_BITS);
    }

    #[test]
    fn callback_receives_decoded_bytes() {
        let (tx, rx) = mpsc::channel();
        let mut sync = FrameSynchronizer::with_callback(move |v| {
            let _ = tx.send(v);
        });
        feed(&mut sync, &frame_bits(0xA5));
        assert_eq!(rx.try_recv(), Ok(0xA5));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn callback_may_inspect_buffer_without_deadlock() {
        let mut sync = FrameSynchronizer::new();
        let handle = sync.buffer();
        let (tx, rx) = mpsc::channel();
        sync.set_callback(move |_| {
            let _ = tx.send(handle.lock().len());
        });
        feed(&mut sync, &frame_bits(0x42));
        assert_eq!(rx.try_recv(), Ok(0));
    }

    #[test]
    fn traced_push_shows_frame_before_consumption() {
        let mut sync = FrameSynchronizer::new();
        let stream = frame_bits(0xA5);
        for &b in &stream[..FRAME_BITS - 1] {
            sync.push_bit(b);
        }
        let (value, trace) = sync.push_bit_traced(stream[FRAME_BITS - 1]);
        assert_eq!(value, Some(0xA5));
        assert_eq!(trace, "1101001010");
        assert_eq!(sync.trace(), "");
    }

    #[test]
    fn trace_shows_last_twenty_bits() {
        let mut sync = FrameSynchronizer::new();
        // 25 zeros never align; the buffer drains to nine.
        feed(&mut sync, &vec![false; 25]);
        assert_eq!(sync.trace(), "000000000");

        let mut buffer = BitBuffer::new();
        for i in 0..30 {
            buffer.push(i % 2 == 0);
        }
        assert_eq!(buffer.trace(TRACE_BITS).len(), TRACE_BITS);
        assert!(buffer.trace(TRACE_BITS).ends_with("10"));
    }

    #[test]
    fn handle_gives_exclusive_access_across_threads() {
        let mut sync = FrameSynchronizer::new();
        let handle = sync.buffer();

        let reader = std::thread::spawn(move || {
            let mut max_seen = 0;
            for _ in 0..1000 {
                let guard = handle.lock();
                assert!(guard.len() < FRAME_BITS);
                max_seen = max_seen.max(guard.len());
            }
            max_seen
        });

        for _ in 0..1000 {
            sync.push_bit(true);
        }
        let max_seen = reader.join().unwrap();
        assert!(max_seen < FRAME_BITS);
    }
}
