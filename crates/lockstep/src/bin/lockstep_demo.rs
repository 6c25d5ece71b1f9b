//! # Lockstep Demo
//!
//! Runs the pipeline headless against a fake scene:
//! - animates for a while, then goes idle so the update thread sleeps
//! - pauses, pushes one update through while paused, resumes
//! - swaps the render surface mid-run
//!
//! Usage: `lockstep_demo [options.toml]`. `LOCKSTEP_*` variables override
//! the file, `RUST_LOG` controls logging.

use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lockstep::{
    KeepUpdating, PipelineError, PipelineOptions, RenderStatus, RenderSurface, SceneCore,
    SurfaceAdoption, SurfaceError, ThreadController, TimerVSyncSource, UpdateFrame, UpdateStatus,
};

/// Scene that animates for `animation_frames` updates after each request.
struct DemoScene {
    animation_frames: u32,
    remaining: AtomicU32,
    updates: AtomicU32,
    renders: AtomicU32,
    last_update_ms: AtomicU32,
}

impl DemoScene {
    fn new(animation_frames: u32) -> Self {
        Self {
            animation_frames,
            remaining: AtomicU32::new(animation_frames),
            updates: AtomicU32::new(0),
            renders: AtomicU32::new(0),
            last_update_ms: AtomicU32::new(0),
        }
    }

    fn animate(&self) {
        self.remaining.store(self.animation_frames, Ordering::Release);
    }
}

impl SceneCore for DemoScene {
    fn maximum_update_count(&self) -> u32 {
        2
    }

    fn update(&self, frame: &UpdateFrame) -> UpdateStatus {
        self.updates.fetch_add(1, Ordering::Relaxed);
        let previous_ms = self
            .last_update_ms
            .swap(frame.last_sync_time_ms, Ordering::Relaxed);
        let animating = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .is_ok();

        #[allow(clippy::cast_precision_loss)]
        let seconds_from_last_frame =
            frame.last_sync_time_ms.saturating_sub(previous_ms) as f32 / 1000.0;

        UpdateStatus {
            keep_updating: if animating {
                KeepUpdating::ANIMATIONS_RUNNING
            } else {
                KeepUpdating::empty()
            },
            seconds_from_last_frame,
        }
    }

    fn render(&self) -> RenderStatus {
        self.renders.fetch_add(1, Ordering::Relaxed);
        RenderStatus {
            needs_update: false,
            has_rendered: true,
        }
    }

    fn context_created(&self) {
        tracing::info!("graphics context created");
    }

    fn context_destroyed(&self) {
        tracing::info!("graphics context destroyed");
    }
}

/// Surface that counts presented frames.
struct HeadlessSurface {
    name: String,
    presented: u32,
}

impl HeadlessSurface {
    fn boxed(name: &str) -> Box<dyn RenderSurface> {
        Box::new(Self {
            name: name.to_owned(),
            presented: 0,
        })
    }
}

impl RenderSurface for HeadlessSurface {
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_render(&mut self) -> bool {
        true
    }

    fn post_render(&mut self, time_delta_us: u32, replacing: bool) {
        self.presented += 1;
        if replacing {
            tracing::info!(surface = %self.name, time_delta_us, "first frame on new surface");
        }
    }

    fn adopt(
        &mut self,
        previous: &mut dyn RenderSurface,
    ) -> Result<SurfaceAdoption, SurfaceError> {
        tracing::info!(from = previous.name(), to = %self.name, "adopting surface");
        Ok(SurfaceAdoption::default())
    }

    fn shutdown(&mut self) {
        tracing::info!(surface = %self.name, presented = self.presented, "surface shut down");
    }
}

fn load_options() -> Result<PipelineOptions, PipelineError> {
    let mut options = match std::env::args().nth(1) {
        Some(path) => PipelineOptions::from_file(path)?,
        None => PipelineOptions::default(),
    };
    options.apply_env_overrides()?;
    Ok(options)
}

fn run() -> Result<(), PipelineError> {
    let options = load_options()?;
    let scene = Arc::new(DemoScene::new(120));
    let vsync = TimerVSyncSource::new(options.software_vsync_interval());

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║              LOCKSTEP - HEADLESS PIPELINE DEMO                   ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!("Vsync interval:       {:?}", options.software_vsync_interval());
    println!("Vsyncs per render:    {}", options.render_refresh_rate);
    println!();

    let start = Instant::now();
    let mut controller = ThreadController::new(
        Arc::clone(&scene) as Arc<dyn SceneCore>,
        HeadlessSurface::boxed("primary"),
        Box::new(vsync),
        options,
    )?;

    controller.start()?;
    thread::sleep(Duration::from_millis(500));
    println!("[running]  updates={}", scene.updates.load(Ordering::Relaxed));

    // Animation finished by now; the update thread should be asleep.
    thread::sleep(Duration::from_millis(2_000));
    let idle_updates = scene.updates.load(Ordering::Relaxed);
    println!("[idle]     updates={idle_updates}");

    controller.pause();
    controller.update_while_paused();
    thread::sleep(Duration::from_millis(200));
    println!(
        "[paused]   updates={} (one extra expected)",
        scene.updates.load(Ordering::Relaxed)
    );

    controller.resume();
    scene.animate();
    controller.request_update();
    thread::sleep(Duration::from_millis(300));

    let replaced = controller.replace_surface(HeadlessSurface::boxed("secondary"))?;
    println!("[replace]  replaced={replaced}");
    thread::sleep(Duration::from_millis(300));

    controller.stop()?;

    println!();
    println!("Elapsed:  {:.2}s", start.elapsed().as_secs_f32());
    println!("Updates:  {}", scene.updates.load(Ordering::Relaxed));
    println!("Renders:  {}", scene.renders.load(Ordering::Relaxed));
    Ok(())
}

fn main() -> ExitCode {
    lockstep::logging::init(lockstep::logging::DEFAULT_FILTER);

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "demo failed");
            ExitCode::FAILURE
        }
    }
}
