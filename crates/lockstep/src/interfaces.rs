//! # Pipeline Collaborators
//!
//! The pipeline threads drive three external pieces through these traits:
//!
//! ```text
//!   UpdateThread ──update()──> SceneCore <──render()── RenderThread
//!                                                          │
//!                                         pre/post_render  ▼
//!   VSyncNotifier <──wait_for_sync()── VSyncSource    RenderSurface
//! ```

use bitflags::bitflags;
use lockstep_core::{SyncPrediction, VSyncTick};

use crate::error::SurfaceError;

bitflags! {
    /// Reasons the scene wants another update even if nothing was requested.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct KeepUpdating: u32 {
        /// The application asked the stage to keep rendering.
        const STAGE_KEEP_RENDERING = 1 << 0;
        /// At least one animation is running.
        const ANIMATIONS_RUNNING = 1 << 1;
        /// Resources are still loading.
        const LOADING_RESOURCES = 1 << 2;
        /// A performance monitor needs continuous frames.
        const MONITORING_PERFORMANCE = 1 << 3;
        /// A render task waits for its frame to complete.
        const RENDER_TASK_SYNC = 1 << 4;
    }
}

impl KeepUpdating {
    /// Human-readable reason for each set flag.
    #[must_use]
    pub fn reasons(self) -> Vec<&'static str> {
        self.iter()
            .map(|flag| match flag {
                Self::STAGE_KEEP_RENDERING => "<Stage::KeepRendering() used>",
                Self::ANIMATIONS_RUNNING => "<Animations running>",
                Self::LOADING_RESOURCES => "<Resources loading>",
                Self::MONITORING_PERFORMANCE => "<Monitoring performance>",
                Self::RENDER_TASK_SYNC => "<Render task waiting for completion>",
                _ => "<Unknown>",
            })
            .collect()
    }
}

/// Timing handed to [`SceneCore::update`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UpdateFrame {
    /// Sequence number of the latest vsync.
    pub frame_number: u32,
    /// Time between the syncs seen by the last two updates, in seconds.
    pub last_frame_delta_seconds: f32,
    /// Time of the latest sync, in milliseconds.
    pub last_sync_time_ms: u32,
    /// Predicted display time of this update, in milliseconds.
    pub next_sync_time_ms: u32,
}

impl UpdateFrame {
    /// Combines a prediction with the frame it was made for.
    #[must_use]
    pub fn new(frame_number: u32, prediction: SyncPrediction) -> Self {
        Self {
            frame_number,
            last_frame_delta_seconds: prediction.last_frame_delta_seconds,
            last_sync_time_ms: prediction.last_sync_time_ms,
            next_sync_time_ms: prediction.next_sync_time_ms,
        }
    }
}

/// Outcome of one scene update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UpdateStatus {
    /// Why the scene wants to keep updating; empty when idle.
    pub keep_updating: KeepUpdating,
    /// Seconds since the previous update, used for FPS tracking.
    pub seconds_from_last_frame: f32,
}

/// Outcome of one scene render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStatus {
    /// The render needs another update to complete.
    pub needs_update: bool,
    /// Something was actually drawn.
    pub has_rendered: bool,
}

/// The scene-graph engine being paced.
///
/// `update` is only called from the update thread and `render` only from the
/// render thread, but both may run at the same time.
pub trait SceneCore: Send + Sync {
    /// Frames the update thread may run ahead of rendering.
    fn maximum_update_count(&self) -> u32;

    /// Advances the scene by one frame.
    fn update(&self, frame: &UpdateFrame) -> UpdateStatus;

    /// Draws the most recent update.
    fn render(&self) -> RenderStatus;

    /// A graphics context became available on the render thread.
    fn context_created(&self) {}

    /// The graphics context is about to be destroyed.
    fn context_destroyed(&self) {}
}

/// What happened when a new surface took over from the old one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceAdoption {
    /// The graphics context had to be recreated.
    pub context_lost: bool,
}

/// A drawable target owned by the render thread.
pub trait RenderSurface: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Called on the render thread before the first frame.
    fn initialize(&mut self) {}

    /// Prepares for drawing; returning false skips the render step.
    fn pre_render(&mut self) -> bool;

    /// Presents the frame. `replacing` is true on the frame that switched
    /// to this surface.
    fn post_render(&mut self, time_delta_us: u32, replacing: bool);

    /// Takes over from `previous`, which stays in use if this fails.
    fn adopt(&mut self, previous: &mut dyn RenderSurface)
        -> Result<SurfaceAdoption, SurfaceError>;

    /// Called on the render thread after the last frame.
    fn shutdown(&mut self) {}
}

impl std::fmt::Debug for dyn RenderSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RenderSurface").field(&self.name()).finish()
    }
}

/// Source of display refresh signals.
pub trait VSyncSource: Send {
    /// Blocks until the next sync and describes it.
    ///
    /// `frame_number` is the number the notifier expects next. Must return
    /// within a bounded time; sources without a signal report an invalid
    /// tick instead of blocking forever.
    fn wait_for_sync(&mut self, frame_number: u32) -> VSyncTick;
}
