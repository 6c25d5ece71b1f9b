//! # Update/Render/VSync Synchronization
//!
//! A single mutex-guarded state machine shared by the three pipeline roles
//! and any number of controller threads.
//!
//! ```text
//!              ┌──────────── vsync_received ────────────┐
//!              │                                         ▼
//!   VSync ──tick──> [FrameSynchronizer] ──update_finished──> Render
//!     ▲                 ▲        │                          │
//!     │ vsync_sleep     │        └────render_finished◄──────┘
//!     │                 │                │
//!     └──── Update ◄────┴────────────────┘
//!          (at most `maximum_update_count` frames ahead)
//! ```
//!
//! ## Frame slots
//!
//! `update_ready_count` counts frames produced but not yet rendered. The
//! update role blocks in [`FrameSynchronizer::update_sync_with_render`] while
//! every slot is full; the render role blocks in
//! [`FrameSynchronizer::render_sync_with_update`] while none is.
//!
//! ## Shutdown
//!
//! [`FrameSynchronizer::stop`] clears `running` and broadcasts on every
//! condition variable. Every wait loop checks `running`, so each blocked role
//! returns its "stopped" result.

mod surface;
mod synchronizer;

pub use surface::{SurfaceReplaceOutcome, SurfaceReplaceRequest};
pub use synchronizer::{FrameSynchronizer, RenderSync, UpdateSync, VSyncTick};
