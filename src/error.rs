//! Custom error types for the receiver.
//!
//! This module defines the primary error type, `VlcError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the few things that can actually go wrong around the decoding core: configuration
//! loading, file I/O while exporting recordings, and malformed replay logs.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically a TOML syntax error or a value of
//!   the wrong type in the configuration file or environment.
//! - **`Configuration`**: Semantic errors in values that parsed fine but cannot drive the
//!   pipeline (e.g. a non-positive `bit_duration` or `radius`). Component constructors return
//!   this variant so a bad parameter is rejected before any sample is processed.
//! - **`Io`** / **`Csv`**: Recording export and replay file access.
//! - **`Replay`**: A raw event log row that could not be interpreted.
//!
//! The decoding components themselves never return errors: malformed input degrades into
//! a cleared slot, a stale anchor or an empty bit buffer, and the only visible symptom is
//! that no identifier gets decoded.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, VlcError>;

/// Errors raised while configuring, replaying or exporting.
#[derive(Error, Debug)]
pub enum VlcError {
    /// Configuration could not be loaded or extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// A loaded value failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing failed.
    #[cfg(feature = "storage_csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A raw event log row could not be replayed.
    #[error("Malformed replay record at line {line}: {message}")]
    Replay { line: u64, message: String },

    /// The logging subscriber could not be installed.
    #[error("Tracing initialization failed: {0}")]
    Tracing(String),

    /// Functionality compiled out by a cargo feature.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl VlcError {
    /// Shorthand for a [`VlcError::Configuration`] with a formatted message.
    pub fn configuration(message: impl Into<String>) -> Self {
        VlcError::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_message_is_prefixed() {
        let err = VlcError::configuration("bit_duration must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration validation error: bit_duration must be positive"
        );
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn open_missing() -> AppResult<()> {
            std::fs::File::open("/definitely/not/here.csv")?;
            Ok(())
        }
        assert!(matches!(open_missing(), Err(VlcError::Io(_))));
    }

    #[test]
    fn replay_error_reports_line() {
        let err = VlcError::Replay {
            line: 7,
            message: "missing value".into(),
        };
        assert!(err.to_string().contains("line 7"));
    }
}
