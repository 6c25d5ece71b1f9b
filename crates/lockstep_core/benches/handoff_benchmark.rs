//! # Frame Handoff Benchmark
//!
//! Measures the cost of moving one frame through the synchronizer:
//! 1. Uncontended slot handoff (one thread plays both roles)
//! 2. Cross-thread handoff (update and render on separate threads)
//! 3. Next-vsync prediction
//!
//! Target: the synchronizer overhead stays far below one 16.6ms frame.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lockstep_core::{Clock, FrameSynchronizer, FrameTime, ManualClock, VSyncTick};

/// One frame through update_sync_with_render / render_sync / render_finished.
fn bench_uncontended_handoff(c: &mut Criterion) {
    let sync: FrameSynchronizer<()> = FrameSynchronizer::new(2, 1);
    sync.start();

    c.bench_function("handoff_uncontended", |b| {
        b.iter(|| {
            let update = sync.update_sync_with_render();
            let render = sync.render_sync_with_update();
            sync.render_finished(black_box(update.render_needs_update), None);
            black_box(render.running)
        });
    });

    sync.stop();
}

/// Render runs on its own thread; the update side blocks whenever the
/// slots are full.
fn bench_cross_thread_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("handoff_cross_thread");

    for max_updates in [1u32, 2, 3] {
        let sync: Arc<FrameSynchronizer<()>> = Arc::new(FrameSynchronizer::new(max_updates, 1));
        sync.start();

        let render = thread::spawn({
            let sync = Arc::clone(&sync);
            move || loop {
                if !sync.render_sync_with_update().running {
                    break;
                }
                sync.render_finished(false, None);
            }
        });

        group.bench_with_input(
            BenchmarkId::new("max_update_count", max_updates),
            &max_updates,
            |b, _| {
                b.iter(|| black_box(sync.update_sync_with_render().running));
            },
        );

        sync.stop();
        let _ = render.join();
    }

    group.finish();
}

/// Vsync publication plus prediction, as done once per frame.
fn bench_prediction(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new(0));
    let sync: FrameSynchronizer<()> =
        FrameSynchronizer::with_clock(2, 1, Arc::clone(&clock) as Arc<dyn Clock>);
    sync.start();
    let mut vsyncs_per_render = 1;
    let mut frame = 0u32;

    c.bench_function("vsync_and_predict", |b| {
        b.iter(|| {
            frame = frame.wrapping_add(1);
            clock.advance(16_667);
            let tick = VSyncTick {
                valid: true,
                frame_number: frame,
                seconds: 0,
                microseconds: 0,
            };
            let _ = sync.vsync_sync_with_update_and_render(tick, &mut vsyncs_per_render);
            black_box(sync.predict_next_sync_time())
        });
    });

    let mut frame_time = FrameTime::new(Arc::clone(&clock) as Arc<dyn Clock>);
    c.bench_function("frame_time_predict", |b| {
        b.iter(|| {
            clock.advance(16_667);
            frame_time.set_sync_time(black_box(1));
            black_box(frame_time.predict_next_sync_time())
        });
    });

    sync.stop();
}

criterion_group!(
    benches,
    bench_uncontended_handoff,
    bench_cross_thread_handoff,
    bench_prediction
);
criterion_main!(benches);
