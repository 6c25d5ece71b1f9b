//! # Pipeline Error Types
//!
//! The synchronizer itself never fails; these cover thread management,
//! configuration and surface replacement.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by the thread controller.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// `start` was called on a pipeline that is not stopped.
    #[error("pipeline already started")]
    AlreadyStarted,

    /// The operation needs a running (or paused) pipeline.
    #[error("pipeline is not running")]
    NotRunning,

    /// The operating system refused to create a pipeline thread.
    #[error("failed to spawn thread {name}: {source}")]
    ThreadSpawn {
        /// Thread name.
        name: &'static str,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A pipeline thread panicked before it was joined.
    #[error("thread {0} panicked")]
    ThreadPanicked(&'static str),

    /// Zero vsyncs per render was requested.
    #[error("invalid render refresh rate: {0} (must be at least 1)")]
    InvalidRefreshRate(u32),

    /// Invalid pipeline options.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors while loading [`PipelineOptions`](crate::PipelineOptions).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The options file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The options file is not valid TOML for this schema.
    #[error("invalid options: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Environment variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// The options parse but are inconsistent.
    #[error("invalid options: {0}")]
    Invalid(String),
}

/// Errors raised by a render surface during replacement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The new surface could not take over from the old one.
    #[error("surface replacement failed: {0}")]
    ReplaceFailed(String),
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
