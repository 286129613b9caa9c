//! CSV export of recording sessions.
//!
//! A [`Recording`] becomes up to two files in the configured output directory:
//! - `ir_status_<YYYYmmdd_HHMMSS>.csv`: one row per recorded entry,
//!   `timestamp, idle_duration_ms, p0x, p0y, .., p3x, p3y` with empty fields for absent points.
//! - `ir_raw_<YYYYmmdd_HHMMSS>.csv`: the raw axis event log, `ts, code, val`.
//!
//! Timestamps are seconds since the session started. The file stem uses the session's
//! wall-clock start time.
use crate::config::ReceiverConfig;
#[cfg(not(feature = "storage_csv"))]
use crate::error::VlcError;
use crate::error::AppResult;
use crate::recorder::{RawSample, RecordedRow, Recording};
use crate::tracker::SLOT_COUNT;
#[cfg(feature = "storage_csv")]
use std::io::Write;
use std::path::{Path, PathBuf};

/// Header of the status table.
pub const STATUS_HEADER: [&str; 2 + SLOT_COUNT * 2] = [
    "timestamp",
    "idle_duration_ms",
    "p0x",
    "p0y",
    "p1x",
    "p1y",
    "p2x",
    "p2y",
    "p3x",
    "p3y",
];

/// Header of the raw event table.
pub const RAW_HEADER: [&str; 3] = ["ts", "code", "val"];

/// Paths written by [`RecordingWriter::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingFiles {
    /// Slot table, absent when the recording has no rows.
    pub status: Option<PathBuf>,
    /// Raw event table, absent when no axis event was captured.
    pub raw: Option<PathBuf>,
}

/// Writes recordings as CSV files.
#[derive(Debug, Clone)]
pub struct RecordingWriter {
    output_dir: PathBuf,
}

impl RecordingWriter {
    /// Writer targeting `output_dir`, created on first write.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Writer for the configured output directory.
    pub fn from_config(config: &ReceiverConfig) -> Self {
        Self::new(&config.storage.output_dir)
    }

    /// Directory files are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write both tables of `recording`, skipping whichever is empty.
    ///
    /// The output directory is created if needed. An empty recording writes nothing.
    #[cfg(feature = "storage_csv")]
    pub fn write(&self, recording: &Recording) -> AppResult<RecordingFiles> {
        let mut files = RecordingFiles::default();
        if recording.is_empty() {
            tracing::info!("recording is empty, nothing to save");
            return Ok(files);
        }

        if !self.output_dir.exists() {
            std::fs::create_dir_all(&self.output_dir)?;
        }
        let stamp = recording.started_at.format("%Y%m%d_%H%M%S");

        if !recording.rows.is_empty() {
            let path = self.output_dir.join(format!("ir_status_{stamp}.csv"));
            write_rows(std::fs::File::create(&path)?, &recording.rows)?;
            tracing::info!(path = %path.display(), rows = recording.rows.len(), "saved status table");
            files.status = Some(path);
        }

        if !recording.raw.is_empty() {
            let path = self.output_dir.join(format!("ir_raw_{stamp}.csv"));
            write_raw(std::fs::File::create(&path)?, &recording.raw)?;
            tracing::info!(path = %path.display(), events = recording.raw.len(), "saved raw event log");
            files.raw = Some(path);
        }

        Ok(files)
    }

    /// Exporting needs the `storage_csv` feature.
    #[cfg(not(feature = "storage_csv"))]
    pub fn write(&self, _recording: &Recording) -> AppResult<RecordingFiles> {
        Err(VlcError::FeatureNotEnabled("storage_csv".to_string()))
    }
}

/// Format one status row as CSV fields.
pub fn status_record(row: &RecordedRow) -> Vec<String> {
    let mut record = Vec::with_capacity(STATUS_HEADER.len());
    record.push(format!("{:.3}", row.timestamp.as_secs_f64()));
    record.push(format!("{:.1}", row.idle_ms()));
    for point in &row.points {
        match point {
            Some(p) => {
                record.push(p.x.to_string());
                record.push(p.y.to_string());
            }
            None => {
                record.push(String::new());
                record.push(String::new());
            }
        }
    }
    record
}

/// Write the status table to any writer.
#[cfg(feature = "storage_csv")]
pub fn write_rows<W: Write>(writer: W, rows: &[RecordedRow]) -> AppResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(STATUS_HEADER)?;
    for row in rows {
        csv.write_record(status_record(row))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the raw event log to any writer.
#[cfg(feature = "storage_csv")]
pub fn write_raw<W: Write>(writer: W, raw: &[RawSample]) -> AppResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(RAW_HEADER)?;
    for sample in raw {
        csv.write_record([
            format!("{:.6}", sample.timestamp.as_secs_f64()),
            sample.code.to_string(),
            sample.value.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}
