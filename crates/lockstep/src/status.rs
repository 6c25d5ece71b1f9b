//! Periodic logging of why the update thread keeps running.

use crate::interfaces::KeepUpdating;

/// Logs the keep-updating reasons every N updates on `lockstep::update_status`.
#[derive(Debug)]
pub struct UpdateStatusLogger {
    interval: u32,
    count: u32,
}

impl UpdateStatusLogger {
    /// Logs every `interval` updates; 0 disables logging.
    #[must_use]
    pub fn new(interval: u32) -> Self {
        Self { interval, count: 0 }
    }

    /// Counts one update; returns the line logged, if this was the Nth.
    pub fn record(
        &mut self,
        keep_updating: KeepUpdating,
        render_needs_update: bool,
    ) -> Option<String> {
        if self.interval == 0 {
            return None;
        }

        self.count = self.count.wrapping_add(1);
        if self.count % self.interval != 0 {
            return None;
        }

        let line = describe(keep_updating, render_needs_update);
        tracing::info!(target: "lockstep::update_status", "{line}");
        Some(line)
    }
}

/// One status line, e.g.
/// `UpdateStatusLogging keepUpdating: true because: <Animations running>`.
#[must_use]
pub fn describe(keep_updating: KeepUpdating, render_needs_update: bool) -> String {
    let mut line = format!(
        "UpdateStatusLogging keepUpdating: {}",
        !keep_updating.is_empty()
    );

    if !keep_updating.is_empty() {
        line.push_str(" because:");
    }
    for reason in keep_updating.reasons() {
        line.push(' ');
        line.push_str(reason);
    }
    if render_needs_update {
        line.push_str(" <Render needs Update>");
    }
    line
}
