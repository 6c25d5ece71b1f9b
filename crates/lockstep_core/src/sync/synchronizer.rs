//! The frame synchronizer shared by the update, render and vsync roles.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::perf::{MarkerKind, MarkerSink};
use crate::sync::surface::{SurfaceReplaceOutcome, SurfaceReplaceRequest, SurfaceSlot};
use crate::timing::{Clock, FrameTime, MonotonicClock, SyncPrediction};
use crate::{MICROSECONDS_PER_SECOND, TIME_PER_FRAME_IN_MICROSECONDS};

/// Result of [`FrameSynchronizer::update_sync_with_render`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateSync {
    /// False once the pipeline has been stopped.
    pub running: bool,
    /// The render role asked for another update.
    pub render_needs_update: bool,
}

/// Result of [`FrameSynchronizer::render_sync_with_update`].
#[derive(Debug)]
pub struct RenderSync<S> {
    /// False once the pipeline has been stopped.
    pub running: bool,
    /// Surface swap to apply during this render, if one was requested.
    pub replace_request: Option<SurfaceReplaceRequest<S>>,
}

/// One hardware (or software) vsync as reported by the vsync role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VSyncTick {
    /// The timestamp came from a real sync signal.
    pub valid: bool,
    /// Sync sequence number; increases with every tick.
    pub frame_number: u32,
    /// Whole seconds of the sync timestamp.
    pub seconds: u32,
    /// Microsecond part of the sync timestamp.
    pub microseconds: u32,
}

/// Mutable state, only touched with the state mutex held.
#[derive(Debug)]
struct SyncState<S> {
    vsyncs_per_render: u32,
    update_ready_count: u32,
    running: bool,
    update_required: bool,
    paused: bool,
    allow_update_while_paused: bool,
    update_requested: bool,
    vsync_sleeping: bool,
    sync_frame_number: u32,
    sync_seconds: u32,
    sync_microseconds: u32,
    surface_replace: SurfaceSlot<S>,
    surface_replace_requested: bool,
}

/// Paces the update, render and vsync threads against each other.
///
/// Share it through an [`Arc`]; each role calls only its own entry points.
/// `S` is the surface type carried by [`FrameSynchronizer::replace_surface`].
///
/// # Call order
///
/// ```text
/// update: update_ready_to_run → (update) → update_sync_with_render
///         → [update_try_to_sleep]
/// render: render_sync_with_update → (render) → render_finished
/// vsync:  vsync_sync_with_update_and_render, once per tick
/// ```
///
/// Calling a role's entry points out of order breaks the frame-slot count
/// and trips a debug assertion.
pub struct FrameSynchronizer<S> {
    maximum_update_count: u32,
    state: Mutex<SyncState<S>>,
    /// Update produced a frame.
    update_finished: Condvar,
    /// Update thread idle wait.
    update_sleep: Condvar,
    /// Render consumed a frame.
    render_finished: Condvar,
    /// A vsync tick arrived.
    vsync_received: Condvar,
    /// VSync thread idle/paused wait.
    vsync_sleep: Condvar,
    /// Pause lifted or one-shot update granted.
    pause_released: Condvar,
    /// Surface replace request processed.
    request_finished: Condvar,
    /// Locked after `state` when both are needed.
    frame_time: Mutex<FrameTime>,
    markers: Option<Arc<dyn MarkerSink>>,
}

impl<S> FrameSynchronizer<S> {
    /// Creates a stopped synchronizer.
    ///
    /// # Panics
    ///
    /// Panics if `maximum_update_count` is zero.
    #[must_use]
    pub fn new(maximum_update_count: u32, vsyncs_per_render: u32) -> Self {
        Self::with_clock(
            maximum_update_count,
            vsyncs_per_render,
            Arc::new(MonotonicClock::new()),
        )
    }

    /// Creates a stopped synchronizer whose frame-time predictor reads `clock`.
    ///
    /// # Panics
    ///
    /// Panics if `maximum_update_count` is zero, and in debug builds if
    /// `vsyncs_per_render` is zero.
    #[must_use]
    pub fn with_clock(
        maximum_update_count: u32,
        vsyncs_per_render: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        assert!(
            maximum_update_count > 0,
            "maximum_update_count must be at least 1"
        );
        debug_assert!(vsyncs_per_render > 0, "vsyncs_per_render must be at least 1");

        Self {
            maximum_update_count,
            state: Mutex::new(SyncState {
                vsyncs_per_render,
                update_ready_count: 0,
                running: false,
                update_required: false,
                paused: false,
                allow_update_while_paused: false,
                update_requested: false,
                vsync_sleeping: false,
                sync_frame_number: 0,
                sync_seconds: 0,
                sync_microseconds: 0,
                surface_replace: SurfaceSlot::empty(),
                surface_replace_requested: false,
            }),
            update_finished: Condvar::new(),
            update_sleep: Condvar::new(),
            render_finished: Condvar::new(),
            vsync_received: Condvar::new(),
            vsync_sleep: Condvar::new(),
            pause_released: Condvar::new(),
            request_finished: Condvar::new(),
            frame_time: Mutex::new(FrameTime::new(clock)),
            markers: None,
        }
    }

    /// Attaches a performance marker sink.
    #[must_use]
    pub fn with_marker_sink(mut self, sink: Arc<dyn MarkerSink>) -> Self {
        self.markers = Some(sink);
        self
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Arms frame timing and lets the roles run.
    pub fn start(&self) {
        let mut state = self.state.lock();
        self.frame_time
            .lock()
            .set_minimum_frame_time_interval(frame_interval(state.vsyncs_per_render));
        state.running = true;
        tracing::debug!(
            maximum_update_count = self.maximum_update_count,
            vsyncs_per_render = state.vsyncs_per_render,
            "frame synchronizer started"
        );
    }

    /// Stops the pipeline and releases every blocked role.
    ///
    /// Permanent and safe to call more than once.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            state.running = false;
        }

        self.update_requested();
        self.resume();

        self.update_finished.notify_all();
        self.update_sleep.notify_all();
        self.render_finished.notify_all();
        self.vsync_received.notify_all();
        self.vsync_sleep.notify_all();
        self.pause_released.notify_all();
        self.request_finished.notify_all();

        self.frame_time.lock().suspend();
        tracing::debug!("frame synchronizer stopped");
    }

    /// Freezes the update and vsync roles at their next pause gate.
    pub fn pause(&self) {
        let was_paused = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.paused, true)
        };

        if !was_paused {
            self.add_marker(MarkerKind::Paused);
            tracing::debug!("frame synchronizer paused");
        }
        self.frame_time.lock().suspend();
    }

    /// Lifts a pause. Does not restart frame timing; see
    /// [`FrameSynchronizer::resume_frame_time`].
    pub fn resume(&self) {
        let was_paused = {
            let mut state = self.state.lock();
            state.vsync_sleeping = false;
            std::mem::replace(&mut state.paused, false)
        };

        self.pause_released.notify_all();
        self.vsync_sleep.notify_all();

        if was_paused {
            self.add_marker(MarkerKind::Resume);
            tracing::debug!("frame synchronizer resumed");
        }
    }

    /// Restarts frame-time prediction after a pause.
    pub fn resume_frame_time(&self) {
        self.frame_time.lock().resume();
    }

    // =========================================================================
    // Controller role
    // =========================================================================

    /// Wakes the update role if it is sleeping. Idempotent.
    pub fn update_requested(&self) {
        self.state.lock().update_requested = true;
        self.update_sleep.notify_all();
    }

    /// Lets exactly one update/vsync cycle through while paused.
    pub fn update_while_paused(&self) {
        self.state.lock().allow_update_while_paused = true;

        self.vsync_sleep.notify_all();
        self.update_sleep.notify_all();
        self.pause_released.notify_all();
    }

    /// Hands `surface` to the render role and waits for the swap.
    ///
    /// Returns true if the render role reports the new surface in use, false
    /// if the swap failed or the pipeline stopped first. Only one request may
    /// be outstanding; concurrent callers must serialize themselves.
    pub fn replace_surface(&self, surface: S) -> bool {
        self.update_requested();
        self.update_while_paused();

        let mut state = self.state.lock();
        state.surface_replace.pending = Some(surface);
        state.surface_replace.outcome = None;
        state.surface_replace_requested = true;

        while state.running && state.surface_replace.outcome.is_none() {
            self.request_finished.wait(&mut state);
        }

        state.surface_replace_requested = false;
        // A request abandoned by stop() is dropped here.
        state.surface_replace.pending = None;
        let outcome = state.surface_replace.outcome.take();
        drop(state);

        let replaced = outcome.is_some_and(SurfaceReplaceOutcome::is_replaced);
        tracing::debug!(?outcome, replaced, "surface replace finished");
        replaced
    }

    /// Changes how many vsyncs make up one render.
    ///
    /// The vsync role adopts the new value on its next tick.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `vsyncs_per_render` is zero.
    pub fn set_render_refresh_rate(&self, vsyncs_per_render: u32) {
        debug_assert!(vsyncs_per_render > 0, "vsyncs_per_render must be at least 1");
        self.state.lock().vsyncs_per_render = vsyncs_per_render;
    }

    // =========================================================================
    // Update role
    // =========================================================================

    /// Blocks until it is time to produce the next frame.
    ///
    /// Waits out a pause (unless a one-shot update was granted), then waits
    /// for the next vsync. Returns immediately once stopped.
    pub fn update_ready_to_run(&self) {
        {
            let mut state = self.state.lock();
            while state.running && state.paused && !state.allow_update_while_paused {
                self.pause_released.wait(&mut state);
            }

            if state.running {
                self.wait_sync_locked(&mut state);
            }
        }

        self.add_marker(MarkerKind::UpdateStart);
    }

    /// Publishes a produced frame and waits for a free frame slot.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if every slot was already full.
    pub fn update_sync_with_render(&self) -> UpdateSync {
        self.add_marker(MarkerKind::UpdateEnd);

        let mut state = self.state.lock();

        debug_assert!(
            state.update_ready_count < self.maximum_update_count,
            "update_sync_with_render with every frame slot full"
        );
        state.update_ready_count = state
            .update_ready_count
            .saturating_add(1)
            .min(self.maximum_update_count);

        self.update_finished.notify_all();

        while state.running && state.update_ready_count == self.maximum_update_count {
            self.render_finished.wait(&mut state);
        }

        UpdateSync {
            running: state.running,
            render_needs_update: state.update_required,
        }
    }

    /// Blocks until every produced frame has been rendered, or an update is
    /// requested, or the pipeline stops.
    pub fn update_wait_for_all_rendering_to_finish(&self) {
        let mut state = self.state.lock();
        self.wait_for_all_rendering_locked(&mut state);
    }

    /// Sleeps while there is nothing to update.
    ///
    /// The vsync role is put to sleep alongside. Returns false once stopped.
    pub fn update_try_to_sleep(&self) -> bool {
        let mut state = self.state.lock();

        if !state.update_required && !state.update_requested {
            self.wait_for_all_rendering_locked(&mut state);
        }

        while state.running && !state.update_required && !state.update_requested {
            state.vsync_sleeping = true;
            self.frame_time.lock().sleep();
            tracing::trace!("update thread sleeping");

            self.update_sleep.wait(&mut state);

            self.frame_time.lock().wake_up();
            state.vsync_sleeping = false;
            self.vsync_sleep.notify_all();
            tracing::trace!("update thread woken");
        }

        state.update_requested = false;
        state.running
    }

    // =========================================================================
    // Render role
    // =========================================================================

    /// Blocks until a produced frame is available.
    ///
    /// Hands out the pending surface replace request, if any.
    pub fn render_sync_with_update(&self) -> RenderSync<S> {
        let mut state = self.state.lock();

        while state.running && state.update_ready_count == 0 {
            self.update_finished.wait(&mut state);
        }

        if state.running {
            self.add_marker(MarkerKind::RenderStart);
        }

        let replace_request = if state.surface_replace_requested {
            state.surface_replace_requested = false;
            state.surface_replace.pending.take().map(SurfaceReplaceRequest::new)
        } else {
            None
        };

        RenderSync {
            running: state.running,
            replace_request,
        }
    }

    /// Releases the frame slot consumed by the last render.
    ///
    /// `update_required` asks the update role to run again. Pass `Some` as
    /// `replaced` when a replace request was handed out by the matching
    /// [`FrameSynchronizer::render_sync_with_update`] call.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if no frame was pending.
    pub fn render_finished(&self, update_required: bool, replaced: Option<SurfaceReplaceOutcome>) {
        {
            let mut state = self.state.lock();
            state.update_required = update_required;

            debug_assert!(
                state.update_ready_count > 0,
                "render_finished without a pending frame"
            );
            state.update_ready_count = state.update_ready_count.saturating_sub(1);

            if let Some(outcome) = replaced {
                state.surface_replace.outcome = Some(outcome);
            }
        }

        self.render_finished.notify_all();
        if update_required {
            self.update_sleep.notify_all();
        }
        if replaced.is_some() {
            self.request_finished.notify_all();
        }

        self.add_marker(MarkerKind::RenderEnd);
    }

    // =========================================================================
    // VSync role
    // =========================================================================

    /// Publishes a vsync tick and, while the pipeline sleeps or is paused,
    /// blocks until there is work again.
    ///
    /// `vsyncs_per_render` is the caller's cached render rate; it is
    /// overwritten when the controller changed the shared value. Returns
    /// false once stopped.
    pub fn vsync_sync_with_update_and_render(
        &self,
        tick: VSyncTick,
        vsyncs_per_render: &mut u32,
    ) -> bool {
        let mut state = self.state.lock();

        if *vsyncs_per_render != state.vsyncs_per_render {
            *vsyncs_per_render = state.vsyncs_per_render;
            self.frame_time
                .lock()
                .set_minimum_frame_time_interval(frame_interval(state.vsyncs_per_render));
            tracing::debug!(vsyncs_per_render = *vsyncs_per_render, "render rate changed");
        }

        if tick.valid {
            self.frame_time.lock().set_sync_time(tick.frame_number);
        }

        state.sync_frame_number = tick.frame_number;
        state.sync_seconds = tick.seconds;
        state.sync_microseconds = tick.microseconds;

        self.vsync_received.notify_all();
        self.add_marker(MarkerKind::VSync);

        while state.running
            && !state.allow_update_while_paused
            && (state.vsync_sleeping || state.paused)
        {
            self.vsync_sleep.wait(&mut state);
        }

        state.running
    }

    /// Blocks until the next vsync tick, then consumes any one-shot update.
    pub fn wait_sync(&self) {
        let mut state = self.state.lock();
        self.wait_sync_locked(&mut state);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Sequence number of the latest vsync.
    #[must_use]
    pub fn frame_number(&self) -> u32 {
        self.state.lock().sync_frame_number
    }

    /// Timestamp of the latest vsync in microseconds.
    #[must_use]
    pub fn time_microseconds(&self) -> u64 {
        let state = self.state.lock();
        u64::from(state.sync_seconds) * MICROSECONDS_PER_SECOND + u64::from(state.sync_microseconds)
    }

    /// Timing for the update about to run.
    #[must_use]
    pub fn predict_next_sync_time(&self) -> SyncPrediction {
        self.frame_time.lock().predict_next_sync_time()
    }

    /// Frames the update role may run ahead of the render role.
    #[must_use]
    pub fn maximum_update_count(&self) -> u32 {
        self.maximum_update_count
    }

    /// Vsyncs per render currently requested by the controller.
    #[must_use]
    pub fn vsyncs_per_render(&self) -> u32 {
        self.state.lock().vsyncs_per_render
    }

    /// False before `start` and after `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// True while paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Frames produced but not yet rendered.
    #[must_use]
    pub fn update_ready_count(&self) -> u32 {
        self.state.lock().update_ready_count
    }

    /// True while the update role has put the vsync role to sleep.
    #[must_use]
    pub fn is_vsync_sleeping(&self) -> bool {
        self.state.lock().vsync_sleeping
    }

    /// True while a replace request waits for the render role.
    #[must_use]
    pub fn is_surface_replace_pending(&self) -> bool {
        self.state.lock().surface_replace_requested
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn wait_sync_locked(&self, state: &mut MutexGuard<'_, SyncState<S>>) {
        let observed = state.sync_frame_number;
        while state.running && state.sync_frame_number == observed {
            self.vsync_received.wait(state);
        }
        state.allow_update_while_paused = false;
    }

    fn wait_for_all_rendering_locked(&self, state: &mut MutexGuard<'_, SyncState<S>>) {
        while state.running && state.update_ready_count != 0 && !state.update_requested {
            self.render_finished.wait(state);
        }
    }

    #[inline]
    fn add_marker(&self, kind: MarkerKind) {
        if let Some(sink) = &self.markers {
            sink.add_marker(kind);
        }
    }
}

impl<S> std::fmt::Debug for FrameSynchronizer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FrameSynchronizer")
            .field("maximum_update_count", &self.maximum_update_count)
            .field("vsyncs_per_render", &state.vsyncs_per_render)
            .field("update_ready_count", &state.update_ready_count)
            .field("running", &state.running)
            .field("paused", &state.paused)
            .field("sync_frame_number", &state.sync_frame_number)
            .finish_non_exhaustive()
    }
}

/// Minimum time between renders for a given render rate.
#[inline]
fn frame_interval(vsyncs_per_render: u32) -> u32 {
    vsyncs_per_render.saturating_mul(TIME_PER_FRAME_IN_MICROSECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perf::ChannelMarkerSink;

    fn started(max: u32) -> FrameSynchronizer<u32> {
        let sync = FrameSynchronizer::new(max, 1);
        sync.start();
        sync
    }

    fn tick(frame_number: u32) -> VSyncTick {
        VSyncTick {
            valid: true,
            frame_number,
            seconds: 0,
            microseconds: 0,
        }
    }

    #[test]
    #[should_panic(expected = "maximum_update_count must be at least 1")]
    fn test_zero_update_count_panics() {
        let _ = FrameSynchronizer::<()>::new(0, 1);
    }

    #[test]
    fn test_new_is_stopped() {
        let sync = FrameSynchronizer::<()>::new(2, 1);
        assert!(!sync.is_running());
        assert!(!sync.is_paused());
        assert_eq!(sync.maximum_update_count(), 2);
        assert_eq!(sync.vsyncs_per_render(), 1);
        assert_eq!(sync.update_ready_count(), 0);
    }

    #[test]
    fn test_frame_slot_handoff() {
        let sync = started(2);

        let update = sync.update_sync_with_render();
        assert!(update.running);
        assert!(!update.render_needs_update);
        assert_eq!(sync.update_ready_count(), 1);

        let render = sync.render_sync_with_update();
        assert!(render.running);
        assert!(render.replace_request.is_none());

        sync.render_finished(true, None);
        assert_eq!(sync.update_ready_count(), 0);

        let update = sync.update_sync_with_render();
        assert!(update.render_needs_update);
    }

    #[test]
    fn test_vsync_adopts_new_render_rate() {
        let sync = started(2);
        sync.set_render_refresh_rate(3);

        let mut cached = 1;
        assert!(sync.vsync_sync_with_update_and_render(tick(7), &mut cached));
        assert_eq!(cached, 3);
        assert_eq!(sync.frame_number(), 7);
    }

    #[test]
    fn test_time_microseconds() {
        let sync = started(1);
        let mut cached = 1;
        let tick = VSyncTick {
            valid: false,
            frame_number: 1,
            seconds: 3,
            microseconds: 250,
        };
        assert!(sync.vsync_sync_with_update_and_render(tick, &mut cached));
        assert_eq!(sync.time_microseconds(), 3_000_250);
    }

    #[test]
    fn test_update_request_skips_sleep() {
        let sync = started(2);
        sync.update_requested();

        assert!(sync.update_try_to_sleep());
        assert!(!sync.is_vsync_sleeping());
    }

    #[test]
    fn test_pause_resume_markers_on_transition_only() {
        let (sink, rx) = ChannelMarkerSink::new(16);
        let sync = FrameSynchronizer::<()>::new(2, 1).with_marker_sink(Arc::new(sink));
        sync.start();

        sync.pause();
        sync.pause();
        assert!(sync.is_paused());
        sync.resume();
        sync.resume();
        assert!(!sync.is_paused());

        let kinds: Vec<MarkerKind> = rx.try_iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MarkerKind::Paused, MarkerKind::Resume]);
    }

    #[test]
    fn test_prediction_suspended_while_paused() {
        let sync = started(2);
        sync.pause();
        assert_eq!(sync.predict_next_sync_time(), SyncPrediction::default());

        sync.resume();
        sync.resume_frame_time();
        let mut cached = 1;
        assert!(sync.vsync_sync_with_update_and_render(tick(1), &mut cached));
        assert_ne!(sync.predict_next_sync_time().next_sync_time_ms, 0);
    }

    #[test]
    fn test_stopped_entry_points_return_immediately() {
        let sync = started(1);
        sync.stop();
        sync.stop();

        assert!(!sync.is_running());
        sync.update_ready_to_run();
        sync.wait_sync();
        assert!(!sync.update_sync_with_render().running);
        assert!(!sync.render_sync_with_update().running);
        assert!(!sync.update_try_to_sleep());

        let mut cached = 1;
        assert!(!sync.vsync_sync_with_update_and_render(tick(1), &mut cached));
        assert!(!sync.replace_surface(9));
        assert!(!sync.is_surface_replace_pending());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "render_finished without a pending frame")]
    fn test_render_without_frame_panics() {
        let sync = started(2);
        sync.render_finished(false, None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "vsyncs_per_render must be at least 1")]
    fn test_zero_render_rate_panics() {
        let sync = started(2);
        sync.set_render_refresh_rate(0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "every frame slot full")]
    fn test_update_overrun_panics() {
        let sync = FrameSynchronizer::<()>::new(1, 1);
        // Not started, so the slot wait does not block.
        let _ = sync.update_sync_with_render();
        let _ = sync.update_sync_with_render();
    }
}
