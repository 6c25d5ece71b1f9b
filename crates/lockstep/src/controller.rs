//! # Thread Controller
//!
//! Owns the synchronizer and the three pipeline threads and exposes the
//! controller role to the application.
//!
//! ```text
//!            start()            pause()
//!   Stopped ────────► Running ────────► Paused
//!      ▲                 │   ◄────────    │
//!      │     stop()      │    resume()    │
//!      └─────────────────┴────────────────┘
//! ```
//!
//! A synchronizer cannot be restarted, so every `start()` builds a new one.
//! The surface and vsync source come back from their threads on `stop()` and
//! are reused by the next `start()`.

use std::sync::Arc;

use lockstep_core::{ChannelMarkerSink, FrameSynchronizer, MarkerSink, TracingMarkerSink};

use crate::config::PipelineOptions;
use crate::error::{PipelineError, PipelineResult};
use crate::interfaces::{RenderSurface, SceneCore, VSyncSource};
use crate::perf_stats::PerformanceLogger;
use crate::render_thread::RenderThread;
use crate::update_thread::UpdateThread;
use crate::vsync_notifier::VSyncNotifier;
use crate::PipelineSync;

/// Lifecycle state of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// No threads are running.
    Stopped,
    /// Frames are being produced.
    Running,
    /// Threads are alive but held at their pause gates.
    Paused,
}

/// Threads of one started pipeline.
#[derive(Debug)]
struct PipelineThreads {
    update: Option<UpdateThread>,
    render: Option<RenderThread>,
    vsync: Option<VSyncNotifier>,
    perf: Option<PerformanceLogger>,
}

/// Starts, pauses, resumes and stops the update/render/vsync pipeline.
pub struct ThreadController {
    core: Arc<dyn SceneCore>,
    options: PipelineOptions,
    state: ControllerState,
    sync: Option<Arc<PipelineSync>>,
    threads: Option<PipelineThreads>,
    /// Held here while stopped; owned by the render thread while started.
    surface: Option<Box<dyn RenderSurface>>,
    /// Held here while stopped; owned by the vsync thread while started.
    vsync_source: Option<Box<dyn VSyncSource>>,
}

impl ThreadController {
    /// Creates a stopped controller.
    pub fn new(
        core: Arc<dyn SceneCore>,
        surface: Box<dyn RenderSurface>,
        vsync_source: Box<dyn VSyncSource>,
        options: PipelineOptions,
    ) -> PipelineResult<Self> {
        options.validate()?;

        Ok(Self {
            core,
            options,
            state: ControllerState::Stopped,
            sync: None,
            threads: None,
            surface: Some(surface),
            vsync_source: Some(vsync_source),
        })
    }

    /// Spawns the pipeline threads.
    pub fn start(&mut self) -> PipelineResult<()> {
        if self.state != ControllerState::Stopped {
            return Err(PipelineError::AlreadyStarted);
        }
        let (Some(surface), Some(vsync_source)) = (self.surface.take(), self.vsync_source.take())
        else {
            // Lost with a panicked thread during a previous stop().
            return Err(PipelineError::NotRunning);
        };

        let mut maximum_update_count = self.core.maximum_update_count();
        if maximum_update_count == 0 {
            tracing::warn!("scene core reported a maximum update count of 0, using 1");
            maximum_update_count = 1;
        }

        let mut sync = FrameSynchronizer::new(maximum_update_count, self.options.render_refresh_rate);
        let mut perf = None;
        if let Some(interval) = self.options.performance_stats_interval() {
            let (sink, markers) = ChannelMarkerSink::new(self.options.marker_queue_capacity);
            let sink = Arc::new(sink);
            sync = sync.with_marker_sink(Arc::clone(&sink) as Arc<dyn MarkerSink>);
            match PerformanceLogger::spawn(sink, markers, interval) {
                Ok(logger) => perf = Some(logger),
                Err(err) => {
                    self.surface = Some(surface);
                    self.vsync_source = Some(vsync_source);
                    return Err(err);
                }
            }
        } else if self.options.trace_markers {
            sync = sync.with_marker_sink(Arc::new(TracingMarkerSink) as Arc<dyn MarkerSink>);
        }
        let sync = Arc::new(sync);
        sync.start();

        let mut threads = PipelineThreads {
            update: None,
            render: None,
            vsync: None,
            perf,
        };
        if let Err(err) = self.spawn_threads(&sync, &mut threads, surface, vsync_source) {
            sync.stop();
            let (surface, vsync_source, _) = Self::join_threads(threads);
            self.surface = surface;
            self.vsync_source = vsync_source;
            return Err(err);
        }

        tracing::debug!(
            maximum_update_count,
            render_refresh_rate = self.options.render_refresh_rate,
            "pipeline started"
        );
        self.sync = Some(sync);
        self.threads = Some(threads);
        self.state = ControllerState::Running;
        Ok(())
    }

    fn spawn_threads(
        &self,
        sync: &Arc<PipelineSync>,
        threads: &mut PipelineThreads,
        surface: Box<dyn RenderSurface>,
        vsync_source: Box<dyn VSyncSource>,
    ) -> PipelineResult<()> {
        threads.render = Some(RenderThread::spawn(
            Arc::clone(sync),
            Arc::clone(&self.core),
            surface,
        )?);
        threads.update = Some(UpdateThread::spawn(
            Arc::clone(sync),
            Arc::clone(&self.core),
            &self.options,
        )?);
        threads.vsync = Some(VSyncNotifier::spawn(Arc::clone(sync), vsync_source)?);
        Ok(())
    }

    /// Holds the update and vsync threads at their next pause gate.
    ///
    /// No-op unless running.
    pub fn pause(&mut self) {
        if self.state != ControllerState::Running {
            return;
        }
        if let Some(sync) = &self.sync {
            sync.pause();
        }
        self.state = ControllerState::Paused;
    }

    /// Releases a pause and asks for a fresh update.
    ///
    /// No-op unless paused.
    pub fn resume(&mut self) {
        if self.state != ControllerState::Paused {
            return;
        }
        if let Some(sync) = &self.sync {
            sync.resume_frame_time();
            sync.resume();
            sync.update_requested();
        }
        self.state = ControllerState::Running;
    }

    /// Stops and joins every thread. No-op when already stopped.
    ///
    /// Returns the first thread failure, after joining all of them.
    pub fn stop(&mut self) -> PipelineResult<()> {
        if self.state == ControllerState::Stopped {
            return Ok(());
        }
        self.state = ControllerState::Stopped;

        if let Some(sync) = self.sync.take() {
            sync.stop();
        }

        let Some(threads) = self.threads.take() else {
            return Ok(());
        };
        let (surface, vsync_source, result) = Self::join_threads(threads);
        self.surface = surface;
        self.vsync_source = vsync_source;

        tracing::debug!("pipeline stopped");
        result
    }

    fn join_threads(
        threads: PipelineThreads,
    ) -> (
        Option<Box<dyn RenderSurface>>,
        Option<Box<dyn VSyncSource>>,
        PipelineResult<()>,
    ) {
        let mut result = Ok(());
        let mut keep_first = |outcome: PipelineResult<()>| {
            if let Err(err) = outcome {
                tracing::warn!(%err, "pipeline thread failed");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        };

        if let Some(update) = threads.update {
            keep_first(update.join());
        }
        let surface = threads.render.and_then(|render| match render.join() {
            Ok(surface) => Some(surface),
            Err(err) => {
                keep_first(Err(err));
                None
            }
        });
        let vsync_source = threads.vsync.and_then(|vsync| match vsync.join() {
            Ok(source) => Some(source),
            Err(err) => {
                keep_first(Err(err));
                None
            }
        });
        if let Some(perf) = threads.perf {
            keep_first(perf.stop().map(|_| ()));
        }

        (surface, vsync_source, result)
    }

    /// Wakes a sleeping update thread.
    pub fn request_update(&self) {
        if let Some(sync) = &self.sync {
            sync.update_requested();
        }
    }

    /// Lets one frame through while paused.
    ///
    /// Also wakes an update thread that went to sleep on an idle scene.
    pub fn update_while_paused(&self) {
        if let Some(sync) = &self.sync {
            sync.update_requested();
            sync.update_while_paused();
        }
    }

    /// Swaps the render surface and waits until the render thread has done it.
    ///
    /// Returns `Ok(false)` if the new surface could not take over; the old
    /// one stays in use and `surface` is dropped.
    pub fn replace_surface(&self, surface: Box<dyn RenderSurface>) -> PipelineResult<bool> {
        let sync = self.sync.as_ref().ok_or(PipelineError::NotRunning)?;
        tracing::debug!(surface = surface.name(), "replacing surface");
        Ok(sync.replace_surface(surface))
    }

    /// Changes how many vsyncs make up one render.
    pub fn set_render_refresh_rate(&mut self, vsyncs_per_render: u32) -> PipelineResult<()> {
        if vsyncs_per_render == 0 {
            return Err(PipelineError::InvalidRefreshRate(vsyncs_per_render));
        }
        self.options.render_refresh_rate = vsyncs_per_render;
        if let Some(sync) = &self.sync {
            sync.set_render_refresh_rate(vsyncs_per_render);
        }
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// The active synchronizer, while started.
    #[must_use]
    pub fn synchronizer(&self) -> Option<&Arc<PipelineSync>> {
        self.sync.as_ref()
    }

    /// Options in effect.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }
}

impl Drop for ThreadController {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(%err, "pipeline did not stop cleanly");
        }
    }
}

impl std::fmt::Debug for ThreadController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadController")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}
