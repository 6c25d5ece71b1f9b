//! # Pipeline Options
//!
//! Loaded once at startup from TOML, then overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `LOCKSTEP_REFRESH_RATE` | `render_refresh_rate` |
//! | `LOCKSTEP_FPS_TRACKING` | `frame_rate_logging_seconds` |
//! | `LOCKSTEP_UPDATE_STATUS_INTERVAL` | `update_status_logging_frequency` |
//! | `LOCKSTEP_PERFORMANCE_STATS` | `performance_stats_seconds` |
//!
//! ```toml
//! render_refresh_rate = 2
//! frame_rate_logging_seconds = 5
//! fps_output_path = "/tmp/lockstep-fps.txt"
//! trace_markers = true
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use lockstep_core::TIME_PER_FRAME_IN_MICROSECONDS;
use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable overriding `render_refresh_rate`.
pub const ENV_REFRESH_RATE: &str = "LOCKSTEP_REFRESH_RATE";
/// Environment variable overriding `frame_rate_logging_seconds`.
pub const ENV_FPS_TRACKING: &str = "LOCKSTEP_FPS_TRACKING";
/// Environment variable overriding `update_status_logging_frequency`.
pub const ENV_UPDATE_STATUS_INTERVAL: &str = "LOCKSTEP_UPDATE_STATUS_INTERVAL";
/// Environment variable overriding `performance_stats_seconds`.
pub const ENV_PERFORMANCE_STATS: &str = "LOCKSTEP_PERFORMANCE_STATS";

/// Options for the threaded pipeline.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOptions {
    /// Vsyncs per rendered frame (1 = every vsync).
    pub render_refresh_rate: u32,
    /// FPS logging period in seconds; 0 disables FPS tracking.
    pub frame_rate_logging_seconds: u32,
    /// File overwritten with the latest FPS value.
    pub fps_output_path: Option<PathBuf>,
    /// Log the keep-updating reasons every N updates; 0 disables.
    pub update_status_logging_frequency: u32,
    /// Performance summary period in seconds; 0 disables.
    pub performance_stats_seconds: u32,
    /// Tick interval of the software vsync source (µs).
    pub software_vsync_interval_us: u32,
    /// Undelivered performance markers kept before dropping.
    pub marker_queue_capacity: usize,
    /// Emit every marker as a trace event on `lockstep::perf` when the
    /// statistics logger is off.
    pub trace_markers: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            render_refresh_rate: 1,
            frame_rate_logging_seconds: 0,
            fps_output_path: None,
            update_status_logging_frequency: 0,
            performance_stats_seconds: 0,
            software_vsync_interval_us: TIME_PER_FRAME_IN_MICROSECONDS,
            marker_queue_capacity: 1024,
            trace_markers: false,
        }
    }
}

impl PipelineOptions {
    /// Parses and validates TOML options. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let options: Self = toml::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads options from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults plus process environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut options = Self::default();
        options.apply_env_overrides()?;
        Ok(options)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup` and re-validates.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = parse_override(&lookup, ENV_REFRESH_RATE)? {
            self.render_refresh_rate = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_FPS_TRACKING)? {
            self.frame_rate_logging_seconds = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_UPDATE_STATUS_INTERVAL)? {
            self.update_status_logging_frequency = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_PERFORMANCE_STATS)? {
            self.performance_stats_seconds = value;
        }
        self.validate()
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_refresh_rate == 0 {
            return Err(ConfigError::Invalid(
                "render_refresh_rate must be at least 1".into(),
            ));
        }
        if self.software_vsync_interval_us == 0 {
            return Err(ConfigError::Invalid(
                "software_vsync_interval_us must be positive".into(),
            ));
        }
        if self.marker_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "marker_queue_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Interval of the software vsync source.
    #[must_use]
    pub fn software_vsync_interval(&self) -> Duration {
        Duration::from_micros(u64::from(self.software_vsync_interval_us))
    }

    /// Performance summary period, if enabled.
    #[must_use]
    pub fn performance_stats_interval(&self) -> Option<Duration> {
        (self.performance_stats_seconds > 0)
            .then(|| Duration::from_secs(u64::from(self.performance_stats_seconds)))
    }
}

fn parse_override<T: FromStr>(
    lookup: &impl Fn(&'static str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue { key, value: raw })
}
