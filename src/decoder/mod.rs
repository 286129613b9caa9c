//! Optical bit demodulation and byte framing.
//!
//! - **`integrator`**: turns the irregularly sampled on/off signal into one bit per
//!   `bit_duration` window using a duty-cycle threshold.
//! - **`framer`**: aligns the bit stream on start/stop framed bytes.
//!
//! [`VlcDecoder`] chains the two so the pipeline only has to feed booleans.

pub mod framer;
pub mod integrator;

pub use framer::{frame_bits, BitBuffer, BitBufferHandle, FrameSynchronizer, FRAME_BITS};
pub use integrator::{BitIntegrator, DEFAULT_DUTY_THRESHOLD};

use crate::error::AppResult;
use std::time::{Duration, Instant};

/// Outcome of one [`VlcDecoder::feed`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeStep {
    /// Bit emitted by the integrator, if a window closed.
    pub bit: Option<bool>,
    /// Byte completed by that bit, if it closed a frame.
    pub byte: Option<u8>,
    /// Last buffered bits right after the new bit was appended.
    pub trace: Option<String>,
}

/// Integrator feeding a frame synchronizer.
#[derive(Debug)]
pub struct VlcDecoder {
    integrator: BitIntegrator,
    framer: FrameSynchronizer,
}

impl VlcDecoder {
    /// Create a decoder whose first bit window starts at `now`.
    pub fn new(bit_duration: Duration, duty_threshold: f64, now: Instant) -> AppResult<Self> {
        Ok(Self {
            integrator: BitIntegrator::new(bit_duration, duty_threshold, now)?,
            framer: FrameSynchronizer::new(),
        })
    }

    /// Register the callback that receives every framed byte.
    pub fn on_frame<F>(&mut self, callback: F)
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.framer.set_callback(callback);
    }

    /// Feed the current detection state.
    pub fn feed(&mut self, detected: bool, now: Instant) -> DecodeStep {
        let Some(bit) = self.integrator.feed(detected, now) else {
            return DecodeStep::default();
        };
        let (byte, trace) = self.framer.push_bit_traced(bit);
        tracing::trace!(bit = u8::from(bit), %trace, "bit integrated");
        DecodeStep {
            bit: Some(bit),
            byte,
            trace: Some(trace),
        }
    }

    /// Last bits waiting in the frame buffer.
    pub fn trace(&self) -> String {
        self.framer.trace()
    }

    /// The bit integrator.
    pub fn integrator(&self) -> &BitIntegrator {
        &self.integrator
    }

    /// The frame synchronizer.
    pub fn framer(&self) -> &FrameSynchronizer {
        &self.framer
    }
}
