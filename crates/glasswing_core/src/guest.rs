//! The call contracts on both sides of the module boundary.
//!
//! [`GuestModule`] is what the scheduler and input translator drive; the
//! wasmtime binding implements it, tests implement it with a scripted
//! in-memory module. [`DrawTarget`] is what the module's drawing imports
//! land on: the wgpu renderer in production, a recorder in tests.

use crate::batch::{ClipRect, RawGeometry};
use crate::error::BridgeResult;
use crate::input::RawEvent;
use crate::resource::TextureHandle;

/// Export and import names of the module ABI.
pub mod abi {
    /// Import namespace.
    pub const IMPORT_MODULE: &str = "env";

    /// Exported linear memory.
    pub const MEMORY: &str = "memory";
    /// One-time initialisation.
    pub const INIT: &str = "app_init";
    /// One refresh cycle, returns the wait value.
    pub const UPDATE: &str = "app_update";
    /// Event delivery.
    pub const ADD_EVENT: &str = "add_event";
    /// Transient byte allocator.
    pub const ALLOC_BYTES: &str = "arena_u8";

    /// Fatal module fault.
    pub const PANIC: &str = "wasm_panic";
    /// Append to the log buffer.
    pub const LOG_WRITE: &str = "wasm_log_write";
    /// Emit the log buffer.
    pub const LOG_FLUSH: &str = "wasm_log_flush";
    /// Milliseconds since host start.
    pub const NOW: &str = "wasm_now";
    /// Accepted and ignored.
    pub const SLEEP: &str = "wasm_sleep";
    /// Backing-buffer width.
    pub const PIXEL_WIDTH: &str = "wasm_pixel_width";
    /// Backing-buffer height.
    pub const PIXEL_HEIGHT: &str = "wasm_pixel_height";
    /// Logical width.
    pub const CANVAS_WIDTH: &str = "wasm_canvas_width";
    /// Logical height.
    pub const CANVAS_HEIGHT: &str = "wasm_canvas_height";
    /// Set the clip rectangle.
    pub const SCISSOR: &str = "wasm_scissor";
    /// Fill the clip with opaque black.
    pub const CLEAR: &str = "wasm_clear";
    /// Create an RGBA8 texture.
    pub const TEXTURE_CREATE: &str = "wasm_textureCreate";
    /// Destroy a texture.
    pub const TEXTURE_DESTROY: &str = "wasm_textureDestroy";
    /// Draw one batch.
    pub const RENDER_GEOMETRY: &str = "wasm_renderGeometry";

    /// Every function the host provides under [`IMPORT_MODULE`].
    pub const IMPORTS: [&str; 14] = [
        PANIC,
        LOG_WRITE,
        LOG_FLUSH,
        NOW,
        SLEEP,
        PIXEL_WIDTH,
        PIXEL_HEIGHT,
        CANVAS_WIDTH,
        CANVAS_HEIGHT,
        SCISSOR,
        CLEAR,
        TEXTURE_CREATE,
        TEXTURE_DESTROY,
        RENDER_GEOMETRY,
    ];
}

/// A running module instance.
///
/// None of these calls may be made reentrantly; the host drives them from a
/// single thread, one at a time.
pub trait GuestModule {
    /// Calls the module's init entry point once.
    ///
    /// # Errors
    ///
    /// A trap or a fatal error raised by a host import during the call.
    fn init(&mut self) -> BridgeResult<()>;

    /// Runs one update cycle and returns the wait value
    /// (`0` again now, `> 0` milliseconds, `< 0` stop).
    ///
    /// # Errors
    ///
    /// A trap or a fatal error raised by a host import during the call.
    fn update(&mut self) -> BridgeResult<i64>;

    /// Appends one event to the module's queue.
    ///
    /// # Errors
    ///
    /// A trap inside the module.
    fn push_event(&mut self, event: RawEvent) -> BridgeResult<()>;

    /// Asks the module for `len` transient bytes and returns their address.
    ///
    /// The module may grow its memory to satisfy this, so any memory slice
    /// taken before the call is invalid afterwards.
    ///
    /// # Errors
    ///
    /// A trap inside the module.
    fn allocate_bytes(&mut self, len: u32) -> BridgeResult<u32>;

    /// The module's current linear memory.
    ///
    /// # Errors
    ///
    /// [`crate::BridgeError::MissingExport`] if the module has no memory.
    fn memory_mut(&mut self) -> BridgeResult<&mut [u8]>;
}

/// Receiver of the module's drawing imports.
pub trait DrawTarget {
    /// Backing size in pixels.
    fn pixel_size(&self) -> (u32, u32);

    /// Logical (displayed) size.
    fn logical_size(&self) -> (f32, f32);

    /// Sets the clip rectangle for later clears. A batch drawn with
    /// [`DrawTarget::render`] uses its own clip and leaves this one alone.
    fn set_clip(&mut self, clip: ClipRect);

    /// Fills the clip rectangle with opaque black.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn clear(&mut self) -> BridgeResult<()>;

    /// Draws one batch whose buffers live in `memory`.
    ///
    /// # Errors
    ///
    /// Out-of-bounds views, invalid layouts and backend failures.
    fn render(&mut self, memory: &[u8], raw: &RawGeometry) -> BridgeResult<()>;

    /// Creates an RGBA8 texture from `width * height * 4` bytes at
    /// `pixels_addr`.
    ///
    /// # Errors
    ///
    /// Invalid sizes and out-of-bounds pixel views.
    fn create_texture(
        &mut self,
        memory: &[u8],
        pixels_addr: u32,
        width: u32,
        height: u32,
    ) -> BridgeResult<TextureHandle>;

    /// Destroys a texture; unknown handles are ignored.
    fn destroy_texture(&mut self, raw: u32);
}
