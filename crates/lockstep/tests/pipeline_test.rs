//! # Pipeline Tests
//!
//! End-to-end runs of the controller with real threads, a fake scene and a
//! fast software vsync.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lockstep::{
    ControllerState, KeepUpdating, PipelineError, PipelineOptions, RenderStatus, RenderSurface,
    SceneCore, SurfaceAdoption, SurfaceError, ThreadController, TimerVSyncSource, UpdateFrame,
    UpdateStatus,
};

const VSYNC: Duration = Duration::from_millis(2);

/// Scene whose "keep updating" answer is controlled by the test.
struct FakeCore {
    keep_updating: AtomicBool,
    updates: AtomicU32,
    renders: AtomicU32,
    contexts_created: AtomicU32,
    contexts_destroyed: AtomicU32,
    last_frame_number: AtomicU32,
    frames_went_back: AtomicBool,
}

impl FakeCore {
    fn new(keep_updating: bool) -> Arc<Self> {
        Arc::new(Self {
            keep_updating: AtomicBool::new(keep_updating),
            updates: AtomicU32::new(0),
            renders: AtomicU32::new(0),
            contexts_created: AtomicU32::new(0),
            contexts_destroyed: AtomicU32::new(0),
            last_frame_number: AtomicU32::new(0),
            frames_went_back: AtomicBool::new(false),
        })
    }

    fn updates(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }

    fn renders(&self) -> u32 {
        self.renders.load(Ordering::SeqCst)
    }
}

impl SceneCore for FakeCore {
    fn maximum_update_count(&self) -> u32 {
        2
    }

    fn update(&self, frame: &UpdateFrame) -> UpdateStatus {
        let previous = self
            .last_frame_number
            .swap(frame.frame_number, Ordering::SeqCst);
        if frame.frame_number < previous {
            self.frames_went_back.store(true, Ordering::SeqCst);
        }
        self.updates.fetch_add(1, Ordering::SeqCst);

        UpdateStatus {
            keep_updating: if self.keep_updating.load(Ordering::SeqCst) {
                KeepUpdating::ANIMATIONS_RUNNING
            } else {
                KeepUpdating::empty()
            },
            seconds_from_last_frame: 0.002,
        }
    }

    fn render(&self) -> RenderStatus {
        self.renders.fetch_add(1, Ordering::SeqCst);
        RenderStatus {
            needs_update: false,
            has_rendered: true,
        }
    }

    fn context_created(&self) {
        self.contexts_created.fetch_add(1, Ordering::SeqCst);
    }

    fn context_destroyed(&self) {
        self.contexts_destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counters shared between a surface and the test.
#[derive(Default)]
struct SurfaceProbe {
    presented: AtomicU32,
    replacing_frames: AtomicU32,
    shut_down: AtomicBool,
}

struct FakeSurface {
    name: &'static str,
    accept: bool,
    context_lost: bool,
    probe: Arc<SurfaceProbe>,
}

impl FakeSurface {
    fn boxed(name: &'static str, accept: bool) -> (Box<dyn RenderSurface>, Arc<SurfaceProbe>) {
        let probe = Arc::new(SurfaceProbe::default());
        let surface = Box::new(Self {
            name,
            accept,
            context_lost: false,
            probe: Arc::clone(&probe),
        });
        (surface, probe)
    }
}

impl RenderSurface for FakeSurface {
    fn name(&self) -> &str {
        self.name
    }

    fn pre_render(&mut self) -> bool {
        true
    }

    fn post_render(&mut self, _time_delta_us: u32, replacing: bool) {
        self.probe.presented.fetch_add(1, Ordering::SeqCst);
        if replacing {
            self.probe.replacing_frames.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn adopt(
        &mut self,
        _previous: &mut dyn RenderSurface,
    ) -> Result<SurfaceAdoption, SurfaceError> {
        if self.accept {
            Ok(SurfaceAdoption {
                context_lost: self.context_lost,
            })
        } else {
            Err(SurfaceError::ReplaceFailed(format!("{} refused", self.name)))
        }
    }

    fn shutdown(&mut self) {
        self.probe.shut_down.store(true, Ordering::SeqCst);
    }
}

fn controller(core: &Arc<FakeCore>) -> (ThreadController, Arc<SurfaceProbe>) {
    let (surface, probe) = FakeSurface::boxed("primary", true);
    let controller = ThreadController::new(
        Arc::clone(core) as Arc<dyn SceneCore>,
        surface,
        Box::new(TimerVSyncSource::new(VSYNC)),
        PipelineOptions::default(),
    )
    .unwrap();
    (controller, probe)
}

fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Waits until `value` stops changing for `quiet`.
fn settle(value: impl Fn() -> u32, quiet: Duration) -> u32 {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut last = value();
    loop {
        thread::sleep(quiet);
        let now = value();
        if now == last {
            return now;
        }
        assert!(Instant::now() < deadline, "value never settled");
        last = now;
    }
}

#[test]
fn test_runs_and_stops() {
    let core = FakeCore::new(true);
    let (mut controller, probe) = controller(&core);
    assert_eq!(controller.state(), ControllerState::Stopped);

    controller.start().unwrap();
    assert_eq!(controller.state(), ControllerState::Running);
    assert!(controller.synchronizer().is_some());

    wait_until("50 rendered frames", || core.renders() >= 50);
    controller.stop().unwrap();

    assert_eq!(controller.state(), ControllerState::Stopped);
    assert!(controller.synchronizer().is_none());
    assert!(probe.shut_down.load(Ordering::SeqCst));
    assert!(!core.frames_went_back.load(Ordering::SeqCst));
    assert_eq!(core.contexts_created.load(Ordering::SeqCst), 1);
    assert_eq!(core.contexts_destroyed.load(Ordering::SeqCst), 1);

    // Frame slots plus the frame render had taken when it stopped.
    assert!(core.updates() <= core.renders() + 3);

    // stop() is idempotent.
    controller.stop().unwrap();
}

#[test]
fn test_pause_and_update_while_paused() {
    let core = FakeCore::new(true);
    let (mut controller, _probe) = controller(&core);
    controller.start().unwrap();
    wait_until("first updates", || core.updates() >= 5);

    controller.pause();
    assert_eq!(controller.state(), ControllerState::Paused);
    let paused_at = settle(|| core.updates(), Duration::from_millis(50));

    controller.update_while_paused();
    wait_until("the one-shot update", || core.updates() > paused_at);
    let after_one_shot = settle(|| core.updates(), Duration::from_millis(50));
    assert_eq!(after_one_shot, paused_at + 1);

    controller.resume();
    assert_eq!(controller.state(), ControllerState::Running);
    wait_until("updates after resume", || core.updates() >= after_one_shot + 10);

    controller.stop().unwrap();
}

#[test]
fn test_update_while_paused_wakes_idle_scene() {
    let core = FakeCore::new(false);
    let (mut controller, _probe) = controller(&core);
    controller.start().unwrap();

    let idle = settle(|| core.updates(), Duration::from_millis(100));
    let sync = Arc::clone(controller.synchronizer().unwrap());
    wait_until("vsync to sleep", || sync.is_vsync_sleeping());

    controller.pause();
    controller.update_while_paused();
    wait_until("the one-shot update", || core.updates() > idle);
    assert_eq!(settle(|| core.updates(), Duration::from_millis(50)), idle + 1);

    // Back to sleep: vsync stops ticking again.
    let frame = settle(|| sync.frame_number(), Duration::from_millis(50));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sync.frame_number(), frame);

    controller.stop().unwrap();
}

#[test]
fn test_pause_resume_ignored_in_wrong_state() {
    let core = FakeCore::new(true);
    let (mut controller, _probe) = controller(&core);

    controller.pause();
    assert_eq!(controller.state(), ControllerState::Stopped);
    controller.resume();
    assert_eq!(controller.state(), ControllerState::Stopped);

    controller.start().unwrap();
    controller.resume();
    assert_eq!(controller.state(), ControllerState::Running);
    controller.stop().unwrap();
}

#[test]
fn test_idle_update_thread_sleeps_until_requested() {
    let core = FakeCore::new(false);
    let (mut controller, _probe) = controller(&core);
    controller.start().unwrap();

    let idle = settle(|| core.updates(), Duration::from_millis(100));
    let sync = controller.synchronizer().unwrap();
    wait_until("vsync to sleep", || sync.is_vsync_sleeping());

    controller.request_update();
    wait_until("the requested update", || core.updates() > idle);

    controller.stop().unwrap();
}

#[test]
fn test_replace_surface() {
    let core = FakeCore::new(true);
    let (mut controller, old_probe) = controller(&core);
    controller.start().unwrap();
    wait_until("first frames", || core.renders() >= 5);

    let (refused, refused_probe) = FakeSurface::boxed("refused", false);
    assert!(!controller.replace_surface(refused).unwrap());
    assert!(!refused_probe.shut_down.load(Ordering::SeqCst));

    let (accepted, new_probe) = FakeSurface::boxed("accepted", true);
    assert!(controller.replace_surface(accepted).unwrap());
    wait_until("frames on the new surface", || {
        new_probe.presented.load(Ordering::SeqCst) >= 3
    });
    assert_eq!(new_probe.replacing_frames.load(Ordering::SeqCst), 1);

    controller.stop().unwrap();
    assert!(new_probe.shut_down.load(Ordering::SeqCst));
    assert!(!old_probe.shut_down.load(Ordering::SeqCst));
}

#[test]
fn test_replace_surface_with_context_loss() {
    let core = FakeCore::new(true);
    let (mut controller, _probe) = controller(&core);
    controller.start().unwrap();

    let probe = Arc::new(SurfaceProbe::default());
    let surface = Box::new(FakeSurface {
        name: "lossy",
        accept: true,
        context_lost: true,
        probe: Arc::clone(&probe),
    });
    assert!(controller.replace_surface(surface).unwrap());
    assert_eq!(core.contexts_destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(core.contexts_created.load(Ordering::SeqCst), 2);

    controller.stop().unwrap();
}

#[test]
fn test_restart_after_stop() {
    let core = FakeCore::new(true);
    let (mut controller, probe) = controller(&core);

    controller.start().unwrap();
    wait_until("first run", || core.renders() >= 10);
    controller.stop().unwrap();
    let first_run = probe.presented.load(Ordering::SeqCst);

    controller.start().unwrap();
    wait_until("second run", || {
        probe.presented.load(Ordering::SeqCst) >= first_run + 10
    });
    controller.stop().unwrap();
}

#[test]
fn test_controller_errors() {
    let core = FakeCore::new(true);
    let (mut controller, _probe) = controller(&core);

    let (surface, _) = FakeSurface::boxed("early", true);
    assert!(matches!(
        controller.replace_surface(surface),
        Err(PipelineError::NotRunning)
    ));
    assert!(matches!(
        controller.set_render_refresh_rate(0),
        Err(PipelineError::InvalidRefreshRate(0))
    ));

    controller.start().unwrap();
    assert!(matches!(controller.start(), Err(PipelineError::AlreadyStarted)));
    controller.set_render_refresh_rate(2).unwrap();
    assert_eq!(controller.options().render_refresh_rate, 2);
    controller.stop().unwrap();
}

#[test]
fn test_invalid_options_rejected() {
    let core = FakeCore::new(true);
    let (surface, _) = FakeSurface::boxed("primary", true);
    let options = PipelineOptions {
        render_refresh_rate: 0,
        ..PipelineOptions::default()
    };

    let result = ThreadController::new(
        core as Arc<dyn SceneCore>,
        surface,
        Box::new(TimerVSyncSource::new(VSYNC)),
        options,
    );
    assert!(matches!(result, Err(PipelineError::Config(_))));
}

#[test]
fn test_drop_stops_pipeline() {
    let core = FakeCore::new(true);
    let (mut controller, probe) = controller(&core);
    controller.start().unwrap();
    wait_until("first frames", || core.renders() >= 3);

    drop(controller);
    assert!(probe.shut_down.load(Ordering::SeqCst));
}

#[test]
fn test_performance_statistics_enabled() {
    let core = FakeCore::new(true);
    let (surface, _probe) = FakeSurface::boxed("primary", true);
    let options = PipelineOptions {
        performance_stats_seconds: 1,
        ..PipelineOptions::default()
    };
    let mut controller = ThreadController::new(
        Arc::clone(&core) as Arc<dyn SceneCore>,
        surface,
        Box::new(TimerVSyncSource::new(VSYNC)),
        options,
    )
    .unwrap();

    controller.start().unwrap();
    wait_until("frames with markers", || core.renders() >= 20);
    controller.stop().unwrap();
}

#[test]
fn test_trace_markers_enabled() {
    let core = FakeCore::new(true);
    let (surface, _probe) = FakeSurface::boxed("primary", true);
    let options = PipelineOptions {
        trace_markers: true,
        ..PipelineOptions::default()
    };
    let mut controller = ThreadController::new(
        Arc::clone(&core) as Arc<dyn SceneCore>,
        surface,
        Box::new(TimerVSyncSource::new(VSYNC)),
        options,
    )
    .unwrap();

    controller.start().unwrap();
    wait_until("frames with traced markers", || core.renders() >= 20);
    controller.pause();
    controller.resume();
    controller.stop().unwrap();
}
