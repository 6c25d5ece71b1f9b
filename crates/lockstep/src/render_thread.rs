//! # Render Thread
//!
//! Owns the current [`RenderSurface`]. Surface replacement requests arrive
//! through the synchronizer and are applied before the frame is drawn:
//!
//! ```text
//! loop:
//!   render_sync_with_update      (wait for a frame, pick up replace request)
//!   apply replace request        (adopt → swap, or keep the old surface)
//!   pre_render → SceneCore::render
//!   render_finished              (always, so the frame slot is released)
//!   post_render
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use lockstep_core::{SurfaceReplaceOutcome, SurfaceReplaceRequest};

use crate::error::{PipelineError, PipelineResult};
use crate::interfaces::{RenderSurface, SceneCore};
use crate::PipelineSync;

/// Thread name of the render thread.
pub const RENDER_THREAD: &str = "lockstep-render";

/// Handle to a running render thread.
#[derive(Debug)]
pub struct RenderThread {
    handle: JoinHandle<Box<dyn RenderSurface>>,
}

impl RenderThread {
    /// Spawns the render loop, moving `surface` onto the new thread.
    pub fn spawn(
        sync: Arc<PipelineSync>,
        core: Arc<dyn SceneCore>,
        surface: Box<dyn RenderSurface>,
    ) -> PipelineResult<Self> {
        let handle = thread::Builder::new()
            .name(RENDER_THREAD.into())
            .spawn(move || run(&sync, core.as_ref(), surface))
            .map_err(|source| PipelineError::ThreadSpawn {
                name: RENDER_THREAD,
                source,
            })?;

        Ok(Self { handle })
    }

    /// Waits for the loop to exit and returns the surface in use.
    pub fn join(self) -> PipelineResult<Box<dyn RenderSurface>> {
        self.handle
            .join()
            .map_err(|_| PipelineError::ThreadPanicked(RENDER_THREAD))
    }
}

fn run(
    sync: &PipelineSync,
    core: &dyn SceneCore,
    mut surface: Box<dyn RenderSurface>,
) -> Box<dyn RenderSurface> {
    tracing::debug!(surface = surface.name(), "render thread started");
    surface.initialize();
    core.context_created();

    let mut last_sync_time_us: Option<u64> = None;

    loop {
        let frame = sync.render_sync_with_update();
        if !frame.running {
            break;
        }

        let replaced = frame
            .replace_request
            .map(|request| replace_surface(core, &mut surface, request));
        let replacing = replaced == Some(SurfaceReplaceOutcome::Replaced);

        let status = if surface.pre_render() {
            Some(core.render())
        } else {
            tracing::trace!(surface = surface.name(), "pre-render failed, frame skipped");
            None
        };

        let needs_update = status.is_some_and(|status| status.needs_update);
        sync.render_finished(needs_update, replaced);

        let now_us = sync.time_microseconds();
        if status.is_some_and(|status| status.has_rendered) {
            let delta_us = last_sync_time_us.map_or(0, |last| now_us.saturating_sub(last));
            surface.post_render(u32::try_from(delta_us).unwrap_or(u32::MAX), replacing);
        }
        last_sync_time_us = Some(now_us);
    }

    core.context_destroyed();
    surface.shutdown();
    tracing::debug!(surface = surface.name(), "render thread stopped");
    surface
}

fn replace_surface(
    core: &dyn SceneCore,
    current: &mut Box<dyn RenderSurface>,
    request: SurfaceReplaceRequest<Box<dyn RenderSurface>>,
) -> SurfaceReplaceOutcome {
    let mut replacement = request.into_surface();

    match replacement.adopt(&mut **current) {
        Ok(adoption) => {
            if adoption.context_lost {
                tracing::warn!(surface = replacement.name(), "context lost");
                core.context_destroyed();
                core.context_created();
            }
            let previous = std::mem::replace(current, replacement);
            tracing::debug!(
                from = previous.name(),
                to = current.name(),
                "surface replaced"
            );
            SurfaceReplaceOutcome::Replaced
        }
        Err(err) => {
            tracing::warn!(
                surface = replacement.name(),
                %err,
                "surface replacement failed, keeping current surface"
            );
            SurfaceReplaceOutcome::Failed
        }
    }
}
