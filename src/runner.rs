//! Polling loops.
//!
//! The receiver itself is synchronous and time-explicit. These loops own the tick:
//! [`run_offline`] steps a [`ManualClock`] as fast as possible (replay, tests, benches),
//! [`run_live`] paces ticks with a tokio interval against a real clock until the source
//! finishes or a shutdown is signalled.

use crate::clock::{Clock, ManualClock};
use crate::error::AppResult;
use crate::pipeline::{DecodedId, Receiver, TickReport};
use crate::recorder::Recording;
use crate::source::EventSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Default polling period.
pub const DEFAULT_TICK: Duration = Duration::from_millis(5);

/// What a run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Ticks processed.
    pub ticks: u64,
    /// Identifiers reported to the application.
    pub decoded: Vec<DecodedId>,
    /// Sessions closed during the run, including one flushed at shutdown.
    pub recordings: Vec<Recording>,
}

impl RunSummary {
    fn absorb(&mut self, mut report: TickReport) {
        self.ticks += 1;
        self.decoded.append(&mut report.decoded);
        if let Some(recording) = report.finished.take() {
            self.recordings.push(recording);
        }
    }

    fn finish(&mut self, receiver: &mut Receiver) {
        if let Some(recording) = receiver.shutdown() {
            tracing::info!("flushing unfinished recording");
            self.recordings.push(recording);
        }
    }
}

/// Drive `receiver` from `source` on virtual time until the source finishes.
///
/// `clock` must be the clock the receiver was created against; it is advanced by `tick`
/// after every processed tick. `on_report` sees every tick before it is summarised.
pub fn run_offline<S, F>(
    receiver: &mut Receiver,
    source: &mut S,
    clock: &ManualClock,
    tick: Duration,
    mut on_report: F,
) -> AppResult<RunSummary>
where
    S: EventSource + ?Sized,
    F: FnMut(&TickReport),
{
    let mut summary = RunSummary::default();

    loop {
        let now = clock.now();
        let events = source.poll(now)?;
        let report = receiver.process(&events, now);
        on_report(&report);
        summary.absorb(report);

        if source.is_finished() {
            break;
        }
        clock.advance(tick);
    }

    summary.finish(receiver);
    tracing::debug!(
        ticks = summary.ticks,
        decoded = summary.decoded.len(),
        "offline run complete"
    );
    Ok(summary)
}

/// Drive `receiver` in real time until the source finishes or `shutdown` turns `true`.
///
/// Missed ticks are skipped rather than bursted, since every tick re-reads the clock.
/// A recording still open when the loop ends is flushed into the summary.
pub async fn run_live<S, F>(
    mut receiver: Receiver,
    mut source: S,
    clock: Arc<dyn Clock>,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut on_report: F,
) -> AppResult<RunSummary>
where
    S: EventSource,
    F: FnMut(&TickReport),
{
    let mut summary = RunSummary::default();
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = clock.now();
                let events = source.poll(now)?;
                let report = receiver.process(&events, now);
                on_report(&report);
                summary.absorb(report);

                if source.is_finished() {
                    tracing::info!("event source finished");
                    break;
                }
            }
            changed = shutdown.changed() => {
                // A dropped sender counts as shutdown.
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("shutdown requested");
                    break;
                }
            }
        }
    }

    summary.finish(&mut receiver);
    Ok(summary)
}
