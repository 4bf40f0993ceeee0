//! # Glasswing Render
//!
//! wgpu backend for module draw batches.
//!
//! ## Architecture
//!
//! ```text
//! GpuContext (instance, adapter, device, surface)
//!     │
//!     ▼
//! Renderer ──> PipelineCache (one pipeline per VertexLayout)
//!     │    ──> ResourceTable<GpuTexture> (handles 1, 2, 3, ...)
//!     ▼
//! one render pass + one draw_indexed per batch
//! ```
//!
//! Blending is premultiplied alpha (`ONE`, `ONE_MINUS_SRC_ALPHA`) and the
//! scissor test is always on.

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod gpu;
pub mod pipeline;
pub mod renderer;
pub mod shader;
pub mod stats;
pub mod texture;

pub use gpu::{GpuContext, GpuOptions};
pub use renderer::Renderer;
pub use stats::FrameStats;
pub use texture::GpuTexture;
