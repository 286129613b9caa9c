//! Receiver configuration using Figment.
//!
//! Configuration is layered, later layers overriding earlier ones:
//! 1. Built-in defaults ([`ReceiverConfig::default`])
//! 2. `config/ir_vlc.toml` (or a file given on the command line)
//! 3. Environment variables prefixed with `IR_VLC_`, sections separated by `__`
//!
//! # Example
//! ```no_run
//! use ir_vlc::config::ReceiverConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // IR_VLC_DECODER__BIT_DURATION_SECS=0.05 overrides the file value
//! let config = ReceiverConfig::load()?;
//! config.validate()?;
//! println!("bit duration: {}s", config.decoder.bit_duration_secs);
//! # Ok(())
//! # }
//! ```

use crate::error::{AppResult, VlcError};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/ir_vlc.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "IR_VLC_";

/// Top-level receiver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Bit integration settings
    pub decoder: DecoderConfig,
    /// Jitter classification settings
    pub stability: StabilityConfig,
    /// Point slot settings
    pub tracker: TrackerConfig,
    /// Pulse monitor settings
    pub pulse: PulseConfig,
    /// What gets reported to the application
    pub report: ReportConfig,
    /// Recording export settings
    pub storage: StorageConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Bit integrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Length of one bit window in seconds
    pub bit_duration_secs: f64,
    /// Duty cycle above which a window decodes as 1
    pub duty_threshold: f64,
}

/// Stability classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Jump radius in sensor units
    pub radius: f64,
    /// Rolling window length in samples
    pub window: usize,
    /// Anchor lifetime without any point, in milliseconds
    pub anchor_timeout_ms: u64,
}

/// Point tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Visibility persistence after the last update, in milliseconds
    pub persistence_ms: u64,
}

/// Pulse monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Pulses this short or shorter are treated as bounce
    pub min_pulse_ms: f64,
}

/// Reporting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Decoded ids are delivered only above this stability factor
    pub min_stability: f64,
    /// Monitor diagnostics interval while the gate is released, in milliseconds
    pub monitor_interval_ms: u64,
    /// Emit a diagnostic for every raw axis event and point burst
    pub raw_mode: bool,
}

/// Recording export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Output directory for recording CSV files
    pub output_dir: PathBuf,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "ir-vlc".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            bit_duration_secs: 0.1,
            duty_threshold: crate::decoder::DEFAULT_DUTY_THRESHOLD,
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            radius: crate::stability::DEFAULT_RADIUS,
            window: crate::stability::DEFAULT_WINDOW,
            anchor_timeout_ms: 500,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { persistence_ms: 150 }
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self { min_pulse_ms: 2.0 }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            min_stability: 0.1,
            monitor_interval_ms: 50,
            raw_mode: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("recordings"),
        }
    }
}

impl ReceiverConfig {
    /// Load configuration from `config/ir_vlc.toml` and environment variables
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::figment(path.as_ref()).extract().map_err(VlcError::from)
    }

    /// The provider stack used by [`ReceiverConfig::load_from`].
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(VlcError::configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let bit = self.decoder.bit_duration_secs;
        if !bit.is_finite() || bit <= 0.0 {
            return Err(VlcError::configuration(format!(
                "Invalid bit_duration_secs {bit}. Must be a positive number of seconds"
            )));
        }

        let duty = self.decoder.duty_threshold;
        if !duty.is_finite() || !(0.0..1.0).contains(&duty) {
            return Err(VlcError::configuration(format!(
                "Invalid duty_threshold {duty}. Must be within [0, 1)"
            )));
        }

        let radius = self.stability.radius;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(VlcError::configuration(format!(
                "Invalid stability radius {radius}. Must be positive"
            )));
        }

        if self.stability.window == 0 {
            return Err(VlcError::configuration(
                "Invalid stability window 0. Must hold at least one sample",
            ));
        }

        let min_pulse = self.pulse.min_pulse_ms;
        if !min_pulse.is_finite()
            || min_pulse < 0.0
            || Duration::try_from_secs_f64(min_pulse / 1000.0).is_err()
        {
            return Err(VlcError::configuration(format!(
                "Invalid min_pulse_ms {min_pulse}. Must be a zero or positive duration"
            )));
        }

        let min_stability = self.report.min_stability;
        if !(0.0..=1.0).contains(&min_stability) {
            return Err(VlcError::configuration(format!(
                "Invalid min_stability {min_stability}. Must be within [0, 1]"
            )));
        }

        if self.storage.output_dir.as_os_str().is_empty() {
            return Err(VlcError::configuration("Storage output_dir cannot be empty"));
        }

        Ok(())
    }

    /// Bit window length.
    pub fn bit_duration(&self) -> AppResult<Duration> {
        crate::decoder::integrator::secs_to_duration(self.decoder.bit_duration_secs)
    }

    /// Anchor lifetime without points.
    pub fn anchor_timeout(&self) -> Duration {
        Duration::from_millis(self.stability.anchor_timeout_ms)
    }

    /// Point visibility persistence.
    pub fn persistence(&self) -> Duration {
        Duration::from_millis(self.tracker.persistence_ms)
    }

    /// Minimum reported pulse width.
    pub fn min_pulse(&self) -> AppResult<Duration> {
        Duration::try_from_secs_f64(self.pulse.min_pulse_ms / 1000.0).map_err(|e| {
            VlcError::configuration(format!(
                "Invalid min_pulse_ms {}: {e}",
                self.pulse.min_pulse_ms
            ))
        })
    }

    /// Monitor diagnostics interval.
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.report.monitor_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ReceiverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bit_duration().unwrap(), Duration::from_millis(100));
        assert_eq!(config.persistence(), Duration::from_millis(150));
        assert_eq!(config.anchor_timeout(), Duration::from_millis(500));
        assert_eq!(config.min_pulse().unwrap(), Duration::from_millis(2));
        assert_eq!(config.stability.radius, 60.0);
        assert_eq!(config.stability.window, 100);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ReceiverConfig::default();
        config.application.log_level = "verbose".into();
        assert!(config.validate().is_err());

        let mut config = ReceiverConfig::default();
        config.decoder.bit_duration_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = ReceiverConfig::default();
        config.decoder.bit_duration_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ReceiverConfig::default();
        config.decoder.duty_threshold = 1.0;
        assert!(config.validate().is_err());

        let mut config = ReceiverConfig::default();
        config.stability.radius = -1.0;
        assert!(config.validate().is_err());

        let mut config = ReceiverConfig::default();
        config.stability.window = 0;
        assert!(config.validate().is_err());

        let mut config = ReceiverConfig::default();
        config.report.min_stability = 1.5;
        assert!(config.validate().is_err());

        let mut config = ReceiverConfig::default();
        config.storage.output_dir = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = ReceiverConfig::default();
        config.pulse.min_pulse_ms = 1e30;
        assert!(config.validate().is_err());
        assert!(config.min_pulse().is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = ReceiverConfig::load_from("does/not/exist.toml").expect("load");
            assert_eq!(config, ReceiverConfig::default());
            Ok(())
        });
    }

    #[test]
    fn file_and_env_layers_override_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "receiver.toml",
                r#"
                [decoder]
                bit_duration_secs = 0.05

                [stability]
                radius = 45.0
                "#,
            )?;
            jail.set_env("IR_VLC_STABILITY__RADIUS", "30.5");
            jail.set_env("IR_VLC_REPORT__RAW_MODE", "true");

            let config = ReceiverConfig::load_from("receiver.toml").expect("load");
            assert_eq!(config.decoder.bit_duration_secs, 0.05);
            assert_eq!(config.stability.radius, 30.5);
            assert!(config.report.raw_mode);
            assert_eq!(config.tracker.persistence_ms, 150);
            Ok(())
        });
    }

    #[test]
    fn wrongly_typed_value_is_a_config_error() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("bad.toml", "[decoder]\nbit_duration_secs = \"fast\"\n")?;
            let result = ReceiverConfig::load_from("bad.toml");
            assert!(matches!(result, Err(VlcError::Config(_))));
            Ok(())
        });
    }
}
