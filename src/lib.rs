//! # IR VLC Receiver Library
//!
//! Receives byte identifiers from a blinking infrared beacon seen through a pointer
//! camera that reports up to four bright spots. Light on/off is integrated into bits,
//! bits are framed into bytes, and a stability gate keeps jumping points (reflections,
//! hand tremor) from corrupting the stream.
//!
//! ## Crate Structure
//!
//! - **`clock`**: `Clock` trait with a real and a hand-driven implementation. Every
//!   component takes `now` explicitly.
//! - **`config`**: `ReceiverConfig`, layered from defaults, a TOML file and `IR_VLC_*`
//!   environment variables.
//! - **`decoder`**: duty-cycle `BitIntegrator` and start/stop `FrameSynchronizer`.
//! - **`error`**: the `VlcError` enum and `AppResult` alias.
//! - **`logging`**: tracing-subscriber setup.
//! - **`pipeline`**: `Receiver`, the per-tick chain from raw events to decoded ids.
//! - **`pulse`**: HOT/COLD pulse width diagnostics.
//! - **`recorder`**: run-length encoded session recording.
//! - **`runner`**: offline and live polling loops.
//! - **`source`**: event sources (raw log replay, simulated beacon).
//! - **`stability`**: anchor-based jump detection and the rolling stability factor.
//! - **`storage`**: CSV export of recordings.
//! - **`tracker`**: four-slot point tracker with visibility persistence.

pub mod clock;
pub mod config;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod pulse;
pub mod recorder;
pub mod runner;
pub mod source;
pub mod stability;
pub mod storage;
pub mod tracker;

pub use config::ReceiverConfig;
pub use error::{AppResult, VlcError};
pub use pipeline::{DecodedId, Diagnostic, Receiver, TickReport};
pub use tracker::{InputEvent, Point2D};
