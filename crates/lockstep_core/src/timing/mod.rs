//! # Frame Timing
//!
//! Predicts when the frame currently being updated will reach the display.
//!
//! ```text
//!   VSync thread ──set_sync_time(n)──┐
//!                                    ▼
//!                             ┌─────────────┐
//!                             │  FrameTime  │◄── Clock (monotonic µs)
//!                             └──────┬──────┘
//!                                    │ predict_next_sync_time()
//!                                    ▼
//!                              Update thread
//! ```
//!
//! The predictor is suspended while the pipeline is paused or asleep so idle
//! time is never reported as a dropped-frame delta.

mod clock;
mod frame_time;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use frame_time::{FrameTime, SyncPrediction};
