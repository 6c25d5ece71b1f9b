//! # VSync Notifier
//!
//! Turns display refresh signals into synchronizer ticks. With a render rate
//! of N vsyncs per render, N signals are consumed per tick.
//!
//! Two sources are provided:
//! - [`TimerVSyncSource`]: software vsync at a fixed interval
//! - [`ChannelVSyncSource`]: ticks pushed from elsewhere (e.g. a display
//!   callback), falling back to invalid ticks when none arrive

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use lockstep_core::{Clock, MonotonicClock, VSyncTick, MICROSECONDS_PER_SECOND};

use crate::error::{PipelineError, PipelineResult};
use crate::interfaces::VSyncSource;
use crate::PipelineSync;

/// Thread name of the vsync notifier.
pub const VSYNC_THREAD: &str = "lockstep-vsync";

/// Builds a tick stamped with the current reading of `clock`.
#[allow(clippy::cast_possible_truncation)]
fn stamped_tick(clock: &dyn Clock, valid: bool, frame_number: u32) -> VSyncTick {
    let now = clock.now_micros();
    VSyncTick {
        valid,
        frame_number,
        seconds: (now / MICROSECONDS_PER_SECOND) as u32,
        microseconds: (now % MICROSECONDS_PER_SECOND) as u32,
    }
}

/// Software vsync: sleeps until the next multiple of a fixed interval.
#[derive(Debug)]
pub struct TimerVSyncSource {
    interval: Duration,
    next_deadline: Instant,
    clock: MonotonicClock,
}

impl TimerVSyncSource {
    /// Creates a source ticking every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: Instant::now() + interval,
            clock: MonotonicClock::new(),
        }
    }

    /// The configured tick interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl VSyncSource for TimerVSyncSource {
    fn wait_for_sync(&mut self, frame_number: u32) -> VSyncTick {
        let now = Instant::now();
        if self.next_deadline > now {
            thread::sleep(self.next_deadline - now);
            self.next_deadline += self.interval;
        } else {
            // Fell behind (e.g. after sleeping); restart the cadence from now.
            self.next_deadline = now + self.interval;
        }
        stamped_tick(&self.clock, true, frame_number)
    }
}

/// Vsync ticks delivered over a channel.
///
/// If nothing arrives within `timeout`, an invalid tick is produced so the
/// notifier keeps observing `stop()`.
#[derive(Debug)]
pub struct ChannelVSyncSource {
    receiver: Receiver<VSyncTick>,
    timeout: Duration,
    clock: MonotonicClock,
}

impl ChannelVSyncSource {
    /// Creates the source and the sender feeding it.
    #[must_use]
    pub fn new(capacity: usize, timeout: Duration) -> (Self, Sender<VSyncTick>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let source = Self {
            receiver,
            timeout,
            clock: MonotonicClock::new(),
        };
        (source, sender)
    }
}

impl VSyncSource for ChannelVSyncSource {
    fn wait_for_sync(&mut self, frame_number: u32) -> VSyncTick {
        match self.receiver.recv_timeout(self.timeout) {
            Ok(tick) => tick,
            Err(RecvTimeoutError::Timeout) => stamped_tick(&self.clock, false, frame_number),
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(self.timeout);
                stamped_tick(&self.clock, false, frame_number)
            }
        }
    }
}

/// Handle to a running vsync notifier thread.
#[derive(Debug)]
pub struct VSyncNotifier {
    handle: JoinHandle<Box<dyn VSyncSource>>,
}

impl VSyncNotifier {
    /// Spawns the notifier loop, moving `source` onto the new thread.
    pub fn spawn(sync: Arc<PipelineSync>, source: Box<dyn VSyncSource>) -> PipelineResult<Self> {
        let handle = thread::Builder::new()
            .name(VSYNC_THREAD.into())
            .spawn(move || run(&sync, source))
            .map_err(|source| PipelineError::ThreadSpawn {
                name: VSYNC_THREAD,
                source,
            })?;

        Ok(Self { handle })
    }

    /// Waits for the loop to exit and returns the source.
    pub fn join(self) -> PipelineResult<Box<dyn VSyncSource>> {
        self.handle
            .join()
            .map_err(|_| PipelineError::ThreadPanicked(VSYNC_THREAD))
    }
}

fn run(sync: &PipelineSync, mut source: Box<dyn VSyncSource>) -> Box<dyn VSyncSource> {
    tracing::debug!("vsync notifier started");
    let mut vsyncs_per_render = sync.vsyncs_per_render();
    let mut frame_number: u32 = 0;

    loop {
        let mut tick = VSyncTick::default();
        let mut valid = true;
        for _ in 0..vsyncs_per_render.max(1) {
            tick = source.wait_for_sync(frame_number.wrapping_add(1));
            valid &= tick.valid;
            // Frame numbers must never go back, whatever the source reports.
            frame_number = tick.frame_number.max(frame_number.wrapping_add(1));
        }
        tick.frame_number = frame_number;
        tick.valid = valid;

        if !sync.vsync_sync_with_update_and_render(tick, &mut vsyncs_per_render) {
            break;
        }
    }

    tracing::debug!(frame_number, "vsync notifier stopped");
    source
}
