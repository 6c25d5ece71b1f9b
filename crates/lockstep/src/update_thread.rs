//! # Update Thread
//!
//! ```text
//! loop:
//!   update_ready_to_run          (pause gate + next vsync)
//!   predict_next_sync_time
//!   SceneCore::update
//!   update_sync_with_render      (publish frame, wait for a free slot)
//!   nothing to do? update_try_to_sleep
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{PipelineError, PipelineResult};
use crate::fps::FpsTracker;
use crate::interfaces::{SceneCore, UpdateFrame};
use crate::status::UpdateStatusLogger;
use crate::{PipelineOptions, PipelineSync};

/// Thread name of the update thread.
pub const UPDATE_THREAD: &str = "lockstep-update";

/// Handle to a running update thread.
#[derive(Debug)]
pub struct UpdateThread {
    handle: JoinHandle<()>,
}

impl UpdateThread {
    /// Spawns the update loop.
    pub fn spawn(
        sync: Arc<PipelineSync>,
        core: Arc<dyn SceneCore>,
        options: &PipelineOptions,
    ) -> PipelineResult<Self> {
        let fps = FpsTracker::new(
            options.frame_rate_logging_seconds,
            options.fps_output_path.clone(),
        );
        let status = UpdateStatusLogger::new(options.update_status_logging_frequency);

        let handle = thread::Builder::new()
            .name(UPDATE_THREAD.into())
            .spawn(move || run(&sync, core.as_ref(), fps, status))
            .map_err(|source| PipelineError::ThreadSpawn {
                name: UPDATE_THREAD,
                source,
            })?;

        Ok(Self { handle })
    }

    /// Waits for the loop to exit. Call after stopping the synchronizer.
    pub fn join(self) -> PipelineResult<()> {
        self.handle
            .join()
            .map_err(|_| PipelineError::ThreadPanicked(UPDATE_THREAD))
    }
}

fn run(
    sync: &PipelineSync,
    core: &dyn SceneCore,
    mut fps: FpsTracker,
    mut status_logger: UpdateStatusLogger,
) {
    tracing::debug!("update thread started");
    let mut running = true;

    while running {
        sync.update_ready_to_run();
        if !sync.is_running() {
            break;
        }

        let frame = UpdateFrame::new(sync.frame_number(), sync.predict_next_sync_time());
        tracing::trace!(
            frame = frame.frame_number,
            delta = frame.last_frame_delta_seconds,
            last_sync_ms = frame.last_sync_time_ms,
            next_sync_ms = frame.next_sync_time_ms,
            "update"
        );
        let status = core.update(&frame);

        // Reported records are logged by the tracker itself.
        let _ = fps.track(status.seconds_from_last_frame);

        let synced = sync.update_sync_with_render();
        running = synced.running;

        if running {
            let _ = status_logger.record(status.keep_updating, synced.render_needs_update);

            if status.keep_updating.is_empty() && !synced.render_needs_update {
                tracing::trace!("nothing to update, trying to sleep");
                running = sync.update_try_to_sleep();
            }
        }
    }

    tracing::debug!("update thread stopped");
}
