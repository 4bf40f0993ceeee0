//! # Glasswing Core
//!
//! Headless half of the Glasswing module host: everything between a
//! compiled UI module and the GPU that can be tested without a window.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  InputEvent   ┌────────────┐  add_event   ┌──────────┐
//! │ host input │──────────────>│ Translator │─────────────>│          │
//! └────────────┘               └─────┬──────┘              │  module  │
//!                                    │ request_frame       │ (opaque) │
//!                              ┌─────▼──────┐  app_update  │          │
//!                              │ Scheduler  │─────────────>│          │
//!                              └────────────┘              └────┬─────┘
//!                                                               │ draw batches
//!                              ┌────────────┐  Memory Bridge    │
//!                              │  Renderer  │<──────────────────┘
//!                              └────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. **Views never outlive a call** - memory slices are re-derived every time
//! 2. **One refresh, one timer, never both** - the scheduler coalesces
//! 3. **Handles only move forward** - a destroyed texture id is never reissued

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod batch;
pub mod diagnostics;
pub mod error;
pub mod guest;
pub mod input;
pub mod memory;
pub mod mipmap;
pub mod resource;
pub mod scheduler;
pub mod session;
pub mod translator;

pub use batch::{
    ortho_projection, ClipRect, ClipState, DrawBatch, RawGeometry, ScissorRect, VertexLayout,
};
pub use diagnostics::{Diagnostic, DiagnosticReceiver, DiagnosticSender};
pub use error::{BridgeError, BridgeResult};
pub use guest::{DrawTarget, GuestModule};
pub use input::{EventKind, InputEvent, Modifiers, RawEvent};
pub use memory::Region;
pub use resource::{resolve_texture, ResourceTable, TextureHandle};
pub use scheduler::{
    FrameDirective, FrameScheduler, RequestOutcome, ScheduleState, SchedulerStats, WakeOutcome,
};
pub use session::Session;
pub use translator::InputTranslator;
