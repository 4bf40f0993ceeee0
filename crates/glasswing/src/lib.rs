//! # Glasswing
//!
//! Desktop host for compiled immediate-mode UI modules. The module owns
//! all widget logic; the host gives it a window, input, a clock and a
//! GPU-backed way to draw triangles.
//!
//! ## Layers
//!
//! ```text
//! bin/glasswing ──> config + logging ──> app::run
//!                                          │
//!            winit ──> keys ──> Session<WasmGuest<Renderer>>
//!                                          │
//!                          wasmtime imports ──> Renderer (wgpu)
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod config;
pub mod error;
pub mod keys;
pub mod logging;
pub mod wasm;

pub use config::{ConfigError, HostConfig};
pub use error::{HostError, HostResult};
pub use wasm::{HostState, WasmGuest};
