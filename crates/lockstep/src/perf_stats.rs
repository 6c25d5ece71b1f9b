//! # Performance Statistics
//!
//! Turns the synchronizer's marker stream into per-frame durations:
//!
//! ```text
//!   UPDATE_START ──► UPDATE_END    = update duration
//!   RENDER_START ──► RENDER_END    = render duration
//!   V_SYNC                         = counted
//!   PAUSED ──► RESUME              = excluded from the window
//! ```
//!
//! A logger thread drains a [`ChannelMarkerSink`] queue and logs a summary
//! on `lockstep::perf` every period, including how many markers the sink had
//! to drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use lockstep_core::{ChannelMarkerSink, MarkerKind, PerformanceMarker};

use crate::error::{PipelineError, PipelineResult};

/// Thread name of the statistics logger.
pub const PERFORMANCE_LOGGER_THREAD: &str = "lockstep-perf";

/// Poll period while waiting for markers.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Min/max/average of one kind of interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DurationStats {
    /// Intervals measured.
    pub count: u64,
    /// Shortest interval (µs).
    pub min_us: u64,
    /// Longest interval (µs).
    pub max_us: u64,
    /// Sum of all intervals (µs).
    pub total_us: u64,
}

impl DurationStats {
    const fn new() -> Self {
        Self {
            count: 0,
            min_us: u64::MAX,
            max_us: 0,
            total_us: 0,
        }
    }

    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        self.min_us = self.min_us.min(duration_us);
        self.max_us = self.max_us.max(duration_us);
    }

    /// Average interval in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.total_us as f64 / self.count as f64) / 1000.0
    }
}

impl Default for DurationStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Totals for one statistics window.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerformanceSummary {
    /// Update durations.
    pub update: DurationStats,
    /// Render durations.
    pub render: DurationStats,
    /// Vsync ticks seen.
    pub vsyncs: u64,
    /// Pause periods started.
    pub pauses: u64,
    /// Markers lost because the queue was full.
    pub dropped_markers: u64,
}

/// Pairs start/end markers into durations.
#[derive(Debug, Default)]
pub struct PerformanceStatistics {
    summary: PerformanceSummary,
    update_started: Option<u64>,
    render_started: Option<u64>,
}

impl PerformanceStatistics {
    /// Creates empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one marker.
    pub fn record(&mut self, marker: PerformanceMarker) {
        match marker.kind {
            MarkerKind::UpdateStart => self.update_started = Some(marker.timestamp_us),
            MarkerKind::UpdateEnd => {
                if let Some(start) = self.update_started.take() {
                    self.summary
                        .update
                        .record(marker.timestamp_us.saturating_sub(start));
                }
            }
            MarkerKind::RenderStart => self.render_started = Some(marker.timestamp_us),
            MarkerKind::RenderEnd => {
                if let Some(start) = self.render_started.take() {
                    self.summary
                        .render
                        .record(marker.timestamp_us.saturating_sub(start));
                }
            }
            MarkerKind::VSync => self.summary.vsyncs += 1,
            MarkerKind::Paused => {
                self.summary.pauses += 1;
                self.update_started = None;
                self.render_started = None;
            }
            MarkerKind::Resume => {}
        }
    }

    /// Current totals.
    #[must_use]
    pub fn summary(&self) -> PerformanceSummary {
        self.summary
    }

    /// Returns the current totals and starts a new window.
    ///
    /// Open start markers carry over so an update spanning the boundary is
    /// still measured.
    pub fn take_summary(&mut self) -> PerformanceSummary {
        std::mem::take(&mut self.summary)
    }
}

/// Background thread logging [`PerformanceSummary`] periodically.
#[derive(Debug)]
pub struct PerformanceLogger {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<PerformanceSummary>,
}

impl PerformanceLogger {
    /// Starts draining `markers`, the queue fed by `sink`, logging every
    /// `interval`.
    pub fn spawn(
        sink: Arc<ChannelMarkerSink>,
        markers: Receiver<PerformanceMarker>,
        interval: Duration,
    ) -> PipelineResult<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new()
            .name(PERFORMANCE_LOGGER_THREAD.into())
            .spawn({
                let shutdown = Arc::clone(&shutdown);
                move || run(&sink, &markers, interval, &shutdown)
            })
            .map_err(|source| PipelineError::ThreadSpawn {
                name: PERFORMANCE_LOGGER_THREAD,
                source,
            })?;

        Ok(Self { shutdown, handle })
    }

    /// Stops the thread and returns the totals of the unfinished window.
    pub fn stop(self) -> PipelineResult<PerformanceSummary> {
        self.shutdown.store(true, Ordering::Release);
        self.handle
            .join()
            .map_err(|_| PipelineError::ThreadPanicked(PERFORMANCE_LOGGER_THREAD))
    }
}

fn run(
    sink: &ChannelMarkerSink,
    markers: &Receiver<PerformanceMarker>,
    interval: Duration,
    shutdown: &AtomicBool,
) -> PerformanceSummary {
    tracing::debug!(?interval, "performance logger started");
    let mut stats = PerformanceStatistics::new();
    let mut window_start = Instant::now();
    let mut dropped_reported = 0;
    let mut take_dropped = || {
        let total = sink.dropped();
        let window = total.saturating_sub(dropped_reported);
        dropped_reported = total;
        window
    };

    while !shutdown.load(Ordering::Acquire) {
        match markers.recv_timeout(POLL_INTERVAL) {
            Ok(marker) => {
                stats.record(marker);
                for marker in markers.try_iter() {
                    stats.record(marker);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if window_start.elapsed() >= interval {
            let mut summary = stats.take_summary();
            summary.dropped_markers = take_dropped();
            log_summary(&summary, window_start.elapsed());
            window_start = Instant::now();
        }
    }

    for marker in markers.try_iter() {
        stats.record(marker);
    }
    let mut summary = stats.summary();
    summary.dropped_markers = take_dropped();
    if summary.dropped_markers > 0 {
        tracing::warn!(
            target: "lockstep::perf",
            dropped = summary.dropped_markers,
            "performance markers dropped"
        );
    }
    tracing::debug!("performance logger stopped");
    summary
}

fn log_summary(summary: &PerformanceSummary, window: Duration) {
    tracing::info!(
        target: "lockstep::perf",
        window_s = window.as_secs_f32(),
        vsyncs = summary.vsyncs,
        updates = summary.update.count,
        update_avg_ms = summary.update.avg_ms(),
        update_max_us = summary.update.max_us,
        renders = summary.render.count,
        render_avg_ms = summary.render.avg_ms(),
        render_max_us = summary.render.max_us,
        pauses = summary.pauses,
        dropped_markers = summary.dropped_markers,
        "frame statistics"
    );
}
