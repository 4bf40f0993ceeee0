//! Rendering statistics.

/// Statistics from one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Batches that reached the GPU.
    pub batches_drawn: u32,
    /// Batches dropped for an empty clip or no geometry.
    pub batches_skipped: u32,
    /// Batches drawn untextured because their texture was unknown.
    pub texture_fallbacks: u32,
    /// Indices submitted.
    pub indices_drawn: u64,
    /// Clears issued by the module.
    pub clears: u32,
    /// Textures alive at the end of the frame.
    pub live_textures: u32,
}

impl FrameStats {
    /// Render passes submitted (each draw and clear is its own pass).
    #[must_use]
    pub fn passes(&self) -> u32 {
        self.batches_drawn + self.clears
    }

    /// True when nothing at all was drawn.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.passes() == 0
    }
}
