//! # Lockstep Core
//!
//! Frame pacing between three cooperating threads:
//! - the **Update** thread advances the scene once per frame,
//! - the **Render** thread consumes finished frames and draws them,
//! - the **VSync** thread is driven by the display refresh signal.
//!
//! A fourth, **Controller** role (usually the main/event thread) pauses,
//! resumes, injects one-shot updates and swaps the render surface.
//!
//! ## Architecture Rules
//!
//! 1. **One lock** - every shared field lives behind a single mutex
//! 2. **One condition variable per wait reason** - no thundering herds
//! 3. **Stop always wins** - every wait loop re-checks `running`
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lockstep_core::FrameSynchronizer;
//!
//! let sync: Arc<FrameSynchronizer<()>> = Arc::new(FrameSynchronizer::new(2, 1));
//! sync.start();
//!
//! // update thread
//! loop {
//!     sync.update_ready_to_run();
//!     // ... advance the scene ...
//!     if !sync.update_sync_with_render().running {
//!         break;
//!     }
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod perf;
pub mod sync;
pub mod timing;

pub use perf::{ChannelMarkerSink, MarkerKind, MarkerSink, PerformanceMarker, TracingMarkerSink};
pub use sync::{
    FrameSynchronizer, RenderSync, SurfaceReplaceOutcome, SurfaceReplaceRequest, UpdateSync,
    VSyncTick,
};
pub use timing::{Clock, FrameTime, ManualClock, MonotonicClock, SyncPrediction};

/// Duration of one display refresh at 60Hz, in microseconds.
pub const TIME_PER_FRAME_IN_MICROSECONDS: u32 = 16_667;

/// Microseconds in one second.
pub const MICROSECONDS_PER_SECOND: u64 = 1_000_000;

/// Microseconds in one millisecond.
pub const MICROSECONDS_PER_MILLISECOND: u64 = 1_000;
