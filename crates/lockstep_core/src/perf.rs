//! # Performance Markers
//!
//! The synchronizer reports frame boundaries to an optional [`MarkerSink`].
//! Sinks are fire-and-forget: `add_marker` must never block the calling role,
//! so the channel sink drops markers when its queue is full and counts them.
//!
//! ```text
//!   Update ─┐
//!   Render ─┼──add_marker()──> [bounded channel] ──> stats thread
//!   VSync  ─┘     (try_send)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::timing::{Clock, MonotonicClock};

/// Frame boundary reported by the synchronizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MarkerKind {
    /// The pipeline was paused.
    Paused = 0,
    /// The pipeline was resumed.
    Resume = 1,
    /// The update role was released to produce a frame.
    UpdateStart = 2,
    /// The update role finished producing a frame.
    UpdateEnd = 3,
    /// The render role picked up a frame.
    RenderStart = 4,
    /// The render role finished a frame.
    RenderEnd = 5,
    /// A vsync tick was delivered.
    VSync = 6,
}

impl MarkerKind {
    /// Short upper-case name used in log output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Paused => "PAUSED",
            Self::Resume => "RESUME",
            Self::UpdateStart => "UPDATE_START",
            Self::UpdateEnd => "UPDATE_END",
            Self::RenderStart => "RENDER_START",
            Self::RenderEnd => "RENDER_END",
            Self::VSync => "V_SYNC",
        }
    }
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A timestamped marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PerformanceMarker {
    /// What happened.
    pub kind: MarkerKind,
    /// When it happened, in microseconds on the sink's clock.
    pub timestamp_us: u64,
}

/// Receiver of performance markers.
///
/// Implementations must return promptly and must not call back into the
/// synchronizer.
pub trait MarkerSink: Send + Sync {
    /// Records that `kind` happened now.
    fn add_marker(&self, kind: MarkerKind);
}

/// Sink that timestamps markers and queues them on a bounded channel.
pub struct ChannelMarkerSink {
    sender: Sender<PerformanceMarker>,
    clock: Arc<dyn Clock>,
    dropped: AtomicU64,
}

impl ChannelMarkerSink {
    /// Creates a sink holding at most `capacity` undelivered markers.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<PerformanceMarker>) {
        Self::with_clock(capacity, Arc::new(MonotonicClock::new()))
    }

    /// Creates a sink stamping markers with `clock`.
    #[must_use]
    pub fn with_clock(
        capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> (Self, Receiver<PerformanceMarker>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let sink = Self {
            sender,
            clock,
            dropped: AtomicU64::new(0),
        };
        (sink, receiver)
    }

    /// Markers discarded because the queue was full or the receiver was gone.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MarkerSink for ChannelMarkerSink {
    fn add_marker(&self, kind: MarkerKind) {
        let marker = PerformanceMarker {
            kind,
            timestamp_us: self.clock.now_micros(),
        };
        match self.sender.try_send(marker) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl std::fmt::Debug for ChannelMarkerSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelMarkerSink")
            .field("queued", &self.sender.len())
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}

/// Sink that turns every marker into a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMarkerSink;

impl MarkerSink for TracingMarkerSink {
    fn add_marker(&self, kind: MarkerKind) {
        tracing::trace!(target: "lockstep::perf", marker = kind.name());
    }
}
