//! # Lockstep
//!
//! The threaded frame pipeline built on [`lockstep_core`]:
//!
//! ```text
//!   ┌──────────────┐  ticks   ┌──────────────┐  frames  ┌──────────────┐
//!   │ VSyncNotifier│ ───────► │ UpdateThread │ ───────► │ RenderThread │
//!   └──────────────┘          └──────────────┘          └──────────────┘
//!            ▲                        ▲                        ▲
//!            └─────────── ThreadController (pause/resume/stop) ┘
//! ```
//!
//! The application supplies three things:
//! - a [`SceneCore`] that updates and renders the scene,
//! - a [`RenderSurface`] the render thread presents to,
//! - a [`VSyncSource`] (or uses [`TimerVSyncSource`]).
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lockstep::{PipelineOptions, ThreadController, TimerVSyncSource};
//!
//! let options = PipelineOptions::from_env()?;
//! let vsync = TimerVSyncSource::new(options.software_vsync_interval());
//! let mut controller = ThreadController::new(core, surface, Box::new(vsync), options)?;
//! controller.start()?;
//! // ...
//! controller.stop()?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod controller;
pub mod error;
pub mod fps;
pub mod interfaces;
pub mod logging;
pub mod perf_stats;
pub mod render_thread;
pub mod status;
pub mod update_thread;
pub mod vsync_notifier;

pub use config::PipelineOptions;
pub use controller::{ControllerState, ThreadController};
pub use error::{ConfigError, PipelineError, PipelineResult, SurfaceError};
pub use fps::{FpsRecord, FpsTracker};
pub use interfaces::{
    KeepUpdating, RenderStatus, RenderSurface, SceneCore, SurfaceAdoption, UpdateFrame,
    UpdateStatus, VSyncSource,
};
pub use perf_stats::{PerformanceLogger, PerformanceStatistics, PerformanceSummary};
pub use vsync_notifier::{ChannelVSyncSource, TimerVSyncSource};

pub use lockstep_core::{
    FrameSynchronizer, MarkerKind, PerformanceMarker, SurfaceReplaceOutcome, VSyncTick,
};

/// Synchronizer carrying replacement render surfaces.
pub type PipelineSync = lockstep_core::FrameSynchronizer<Box<dyn RenderSurface>>;
