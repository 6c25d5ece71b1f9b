//! # Next-VSync Prediction
//!
//! The update thread needs two numbers before advancing the scene: how much
//! time passed since the previous update, and when the frame it is about to
//! produce will actually be shown. Both are derived from the vsync timestamps
//! recorded by [`FrameTime::set_sync_time`].
//!
//! ## Prediction rules
//!
//! ```text
//! syncs since last update == 0  → an update ran ahead of vsync;
//!                                 the frame lands one more interval later
//! syncs since last update  > 1  → frames are being missed; if the recent
//!                                 history agrees, expect the same gap again
//! otherwise                     → next sync is one interval away
//! ```

use std::sync::Arc;

use crate::timing::Clock;
use crate::{MICROSECONDS_PER_MILLISECOND, TIME_PER_FRAME_IN_MICROSECONDS};

/// Number of updates remembered when looking for a recurring frame gap.
const HISTORY_SIZE: usize = 3;

/// Conversion factor from microseconds to seconds.
const MICROSECONDS_TO_SECONDS: f32 = 0.000_001;

/// Timing handed to the scene before each update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SyncPrediction {
    /// Time between the syncs observed by the last two updates, in seconds.
    pub last_frame_delta_seconds: f32,
    /// Time of the latest sync, in milliseconds.
    pub last_sync_time_ms: u32,
    /// Estimated time of the sync at which this update will be rendered.
    pub next_sync_time_ms: u32,
}

/// Predicts the presentation time of the frame being updated.
///
/// Not thread-safe by itself; the synchronizer keeps it behind a mutex.
pub struct FrameTime {
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Minimum time between two renders (µs).
    minimum_frame_time_interval: u32,
    /// Time of the latest sync (µs).
    last_sync_time: u64,
    /// Value of `last_sync_time` when the previous prediction was made.
    last_sync_time_at_update: u64,
    /// Frame number of the latest sync.
    last_sync_frame_number: u32,
    /// Value of `last_sync_frame_number` when the previous prediction was made.
    last_update_frame_number: u32,
    /// False while suspended or sleeping.
    running: bool,
    /// The next prediction has no previous update to compare against.
    first_frame: bool,
    /// Syncs elapsed between consecutive updates, most recent entries.
    previous_update_frames: [u32; HISTORY_SIZE],
    /// Next slot in `previous_update_frames`.
    write_pos: usize,
    /// Updates that ran without a sync in between.
    extra_updates_since_sync: u32,
}

impl FrameTime {
    /// Creates a running predictor using the 60Hz frame interval.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_micros();
        Self {
            clock,
            minimum_frame_time_interval: TIME_PER_FRAME_IN_MICROSECONDS,
            last_sync_time: now,
            last_sync_time_at_update: now,
            last_sync_frame_number: 0,
            last_update_frame_number: 0,
            running: true,
            first_frame: true,
            previous_update_frames: [0; HISTORY_SIZE],
            write_pos: 0,
            extra_updates_since_sync: 0,
        }
    }

    /// Sets the minimum interval between two renders, in microseconds.
    pub fn set_minimum_frame_time_interval(&mut self, interval_us: u32) {
        self.minimum_frame_time_interval = interval_us;
    }

    /// Returns the minimum interval between two renders, in microseconds.
    #[must_use]
    pub fn minimum_frame_time_interval(&self) -> u32 {
        self.minimum_frame_time_interval
    }

    /// Records that sync `frame_number` happened now.
    ///
    /// Ignored while suspended.
    pub fn set_sync_time(&mut self, frame_number: u32) {
        if self.running {
            self.last_sync_time = self.clock.now_micros();
            self.last_sync_frame_number = frame_number;
        }
    }

    /// Stops predicting and forgets the frame history.
    pub fn suspend(&mut self) {
        self.running = false;
        self.last_sync_frame_number = 0;
        self.last_update_frame_number = 0;
        self.write_pos = 0;
        self.extra_updates_since_sync = 0;
        self.previous_update_frames = [0; HISTORY_SIZE];
    }

    /// Restarts prediction with the current time as the latest sync.
    pub fn resume(&mut self) {
        self.restart();
    }

    /// Suspends prediction while the update thread has nothing to do.
    pub fn sleep(&mut self) {
        tracing::trace!("frame time sleeping");
        self.suspend();
    }

    /// Restarts prediction after [`FrameTime::sleep`].
    pub fn wake_up(&mut self) {
        tracing::trace!("frame time waking up");
        self.restart();
    }

    /// Returns true unless suspended or sleeping.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Predicts when the frame about to be updated will be displayed.
    ///
    /// Call once per update. Returns all zeros while suspended.
    pub fn predict_next_sync_time(&mut self) -> SyncPrediction {
        if !self.running {
            return SyncPrediction::default();
        }

        let interval = u64::from(self.minimum_frame_time_interval);
        let last_sync_time = self.last_sync_time;
        let last_sync_frame_number = self.last_sync_frame_number;

        let frames_in_last_update =
            last_sync_frame_number.wrapping_sub(self.last_update_frame_number);
        let last_frame_delta = last_sync_time.saturating_sub(self.last_sync_time_at_update);
        let mut frames_till_next_sync: u64 = 1;

        if !self.first_frame {
            if frames_in_last_update == 0 {
                self.extra_updates_since_sync += 1;
                frames_till_next_sync += u64::from(self.extra_updates_since_sync);
            } else {
                self.extra_updates_since_sync = 0;
            }

            if frames_in_last_update > 1 {
                let total: u64 = self.previous_update_frames.iter().copied().map(u64::from).sum();
                let average = total / HISTORY_SIZE as u64;
                if average > 1 {
                    frames_till_next_sync = average;
                }
            }

            self.previous_update_frames[self.write_pos] = frames_in_last_update;
            self.write_pos = (self.write_pos + 1) % HISTORY_SIZE;
        }

        self.last_update_frame_number = last_sync_frame_number;
        self.last_sync_time_at_update = last_sync_time;
        self.first_frame = false;

        let next_sync_time = last_sync_time + interval * frames_till_next_sync;

        #[allow(clippy::cast_precision_loss)]
        let last_frame_delta_seconds = last_frame_delta as f32 * MICROSECONDS_TO_SECONDS;

        SyncPrediction {
            last_frame_delta_seconds,
            last_sync_time_ms: to_millis(last_sync_time),
            next_sync_time_ms: to_millis(next_sync_time),
        }
    }

    fn restart(&mut self) {
        self.last_sync_time = self.clock.now_micros();
        self.last_sync_time_at_update = self.last_sync_time;
        self.last_sync_frame_number = 0;
        self.running = true;
        self.first_frame = true;
    }
}

impl std::fmt::Debug for FrameTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameTime")
            .field("minimum_frame_time_interval", &self.minimum_frame_time_interval)
            .field("last_sync_time", &self.last_sync_time)
            .field("last_sync_frame_number", &self.last_sync_frame_number)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

/// Microseconds to a 32-bit millisecond timestamp (wraps after ~49 days).
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn to_millis(micros: u64) -> u32 {
    (micros / MICROSECONDS_PER_MILLISECOND) as u32
}
