//! Frame-rate tracking for the update thread.

use std::fs;
use std::path::PathBuf;

/// One FPS measurement window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FpsRecord {
    /// Updates counted in the window.
    pub frame_count: f32,
    /// Seconds covered by the window.
    pub elapsed_seconds: f32,
    /// `frame_count / elapsed_seconds`.
    pub fps: f32,
}

/// Accumulates update durations and reports the frame rate periodically.
///
/// Records go to the `lockstep::fps` log target and, when configured, to a
/// file holding only the latest value. A final record is reported on drop.
#[derive(Debug)]
pub struct FpsTracker {
    tracking_seconds: f32,
    frame_count: f32,
    elapsed_seconds: f32,
    output_path: Option<PathBuf>,
}

impl FpsTracker {
    /// Creates a tracker reporting every `tracking_seconds`; 0 disables it.
    #[must_use]
    pub fn new(tracking_seconds: u32, output_path: Option<PathBuf>) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let tracking_seconds = tracking_seconds as f32;
        Self {
            tracking_seconds,
            frame_count: 0.0,
            elapsed_seconds: 0.0,
            output_path,
        }
    }

    /// True if records are produced at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.tracking_seconds > 0.0
    }

    /// Counts one update that took `seconds_from_last_frame`.
    ///
    /// Returns the record emitted when the window closes.
    pub fn track(&mut self, seconds_from_last_frame: f32) -> Option<FpsRecord> {
        if !self.is_enabled() {
            return None;
        }

        if self.elapsed_seconds < self.tracking_seconds {
            self.elapsed_seconds += seconds_from_last_frame;
            self.frame_count += 1.0;
            None
        } else {
            let record = self.output_record();
            self.frame_count = 0.0;
            self.elapsed_seconds = 0.0;
            Some(record)
        }
    }

    fn current_record(&self) -> FpsRecord {
        let fps = if self.elapsed_seconds > 0.0 {
            self.frame_count / self.elapsed_seconds
        } else {
            0.0
        };
        FpsRecord {
            frame_count: self.frame_count,
            elapsed_seconds: self.elapsed_seconds,
            fps,
        }
    }

    fn output_record(&self) -> FpsRecord {
        let record = self.current_record();
        tracing::info!(
            target: "lockstep::fps",
            "Frame count {:.0}, elapsed time {:.1}s, FPS: {:.2}",
            record.frame_count,
            record.elapsed_seconds,
            record.fps
        );

        if let Some(path) = &self.output_path {
            if let Err(err) = fs::write(path, format!("{:.2} \n", record.fps)) {
                tracing::warn!(target: "lockstep::fps", path = %path.display(), %err, "failed to write FPS file");
            }
        }
        record
    }
}

impl Drop for FpsTracker {
    fn drop(&mut self) {
        if self.is_enabled() && self.frame_count > 0.0 {
            let _ = self.output_record();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_tracker() {
        let mut tracker = FpsTracker::new(0, None);
        assert!(!tracker.is_enabled());
        for _ in 0..100 {
            assert!(tracker.track(0.5).is_none());
        }
    }

    #[test]
    fn test_record_after_window() {
        let mut tracker = FpsTracker::new(1, None);

        // 4 updates of 0.25s fill the window, the fifth closes it.
        for _ in 0..4 {
            assert!(tracker.track(0.25).is_none());
        }
        let record = tracker.track(0.25).unwrap();
        assert!((record.frame_count - 4.0).abs() < f32::EPSILON);
        assert!((record.elapsed_seconds - 1.0).abs() < 1e-6);
        assert!((record.fps - 4.0).abs() < 1e-4);

        // The window restarts.
        assert!(tracker.track(0.25).is_none());
    }

    #[test]
    fn test_writes_latest_fps_to_file() {
        let path = std::env::temp_dir().join(format!("lockstep_fps_{}.txt", std::process::id()));
        let mut tracker = FpsTracker::new(1, Some(path.clone()));

        tracker.track(0.5);
        tracker.track(0.5);
        let record = tracker.track(0.5).unwrap();
        assert!((record.fps - 2.0).abs() < 1e-4);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "2.00 \n");

        drop(tracker);
        std::fs::remove_file(&path).ok();
    }
}
