//! Draw batch decoding.
//!
//! A draw batch is one self-contained description of geometry, vertex
//! format and clip state. The module hands it over as raw addresses and
//! offsets; this module turns those into validated, borrowed views.

use std::borrow::Cow;

use crate::error::{BridgeError, BridgeResult};
use crate::memory::{self, Region};
use crate::resource::TextureHandle;

/// Size of the position field (`f32 x 2`).
pub const POSITION_SIZE: u32 = 8;
/// Size of the color field (`u8 x 4`).
pub const COLOR_SIZE: u32 = 4;
/// Size of the texture coordinate field (`f32 x 2`).
pub const UV_SIZE: u32 = 8;
/// Largest stride accepted for a vertex record.
pub const MAX_VERTEX_STRIDE: u32 = 2048;

/// Byte layout of one vertex record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    /// Size of one vertex record in bytes.
    pub stride: u32,
    /// Offset of the 2 x f32 position.
    pub pos: u32,
    /// Offset of the 4 x u8 color.
    pub col: u32,
    /// Offset of the 2 x f32 texture coordinate.
    pub uv: u32,
}

impl VertexLayout {
    /// Checks that the layout describes fields that fit the record and can
    /// be bound as vertex attributes.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidVertexLayout`] describing the first problem found.
    pub fn validate(&self) -> BridgeResult<()> {
        let bad = |msg: String| Err(BridgeError::InvalidVertexLayout(msg));

        if self.stride == 0 || self.stride % 4 != 0 || self.stride > MAX_VERTEX_STRIDE {
            return bad(format!(
                "stride {} must be a non-zero multiple of 4 up to {MAX_VERTEX_STRIDE}",
                self.stride
            ));
        }
        for (name, offset, size) in [
            ("position", self.pos, POSITION_SIZE),
            ("color", self.col, COLOR_SIZE),
            ("uv", self.uv, UV_SIZE),
        ] {
            if offset % 4 != 0 {
                return bad(format!("{name} offset {offset} is not 4-byte aligned"));
            }
            if offset.checked_add(size).map_or(true, |end| end > self.stride) {
                return bad(format!(
                    "{name} field at {offset} overruns stride {}",
                    self.stride
                ));
            }
        }
        Ok(())
    }
}

/// Clip rectangle in backing-buffer pixels, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRect {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width.
    pub w: i32,
    /// Height.
    pub h: i32,
}

/// Scissor rectangle in target pixels, origin top-left, inside the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width, never zero.
    pub width: u32,
    /// Height, never zero.
    pub height: u32,
}

impl ClipRect {
    /// Creates a clip rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Clip covering a whole `width` x `height` target.
    #[must_use]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Flips to top-left origin and intersects with the target.
    ///
    /// Returns `None` when nothing of the rectangle is visible.
    #[must_use]
    pub fn to_scissor(self, target_width: u32, target_height: u32) -> Option<ScissorRect> {
        let (tw, th) = (i64::from(target_width), i64::from(target_height));
        let left = i64::from(self.x).clamp(0, tw);
        let right = (i64::from(self.x) + i64::from(self.w.max(0))).clamp(0, tw);
        let bottom = i64::from(self.y);
        let top_gl = bottom + i64::from(self.h.max(0));
        let top = (th - top_gl).clamp(0, th);
        let lower = (th - bottom).clamp(0, th);

        if right <= left || lower <= top {
            return None;
        }
        Some(ScissorRect {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (lower - top) as u32,
        })
    }
}

/// The clip a target keeps between calls.
///
/// Only `set` changes it. A batch carries its own clip, which applies to
/// that batch alone; clears always use the kept one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipState {
    current: ClipRect,
}

impl ClipState {
    /// Starts out covering the whole `width` x `height` target.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            current: ClipRect::full(width, height),
        }
    }

    /// Replaces the kept clip.
    pub fn set(&mut self, clip: ClipRect) {
        self.current = clip;
    }

    /// The kept clip.
    #[must_use]
    pub const fn current(&self) -> ClipRect {
        self.current
    }

    /// Scissor for a clear of a `width` x `height` target.
    #[must_use]
    pub fn clear_scissor(&self, width: u32, height: u32) -> Option<ScissorRect> {
        self.current.to_scissor(width, height)
    }

    /// Scissor for a batch drawn into a `width` x `height` target.
    ///
    /// Leaves the kept clip untouched.
    #[must_use]
    pub fn batch_scissor(&self, batch: ClipRect, width: u32, height: u32) -> Option<ScissorRect> {
        batch.to_scissor(width, height)
    }
}

/// Raw render-geometry arguments as received across the ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawGeometry {
    /// Texture handle, `0` for solid color.
    pub texture: u32,
    /// Index buffer address.
    pub index_addr: u32,
    /// Index buffer length in bytes.
    pub index_len: u32,
    /// Vertex buffer address.
    pub vertex_addr: u32,
    /// Vertex buffer length in bytes.
    pub vertex_len: u32,
    /// Vertex record layout.
    pub layout: VertexLayout,
    /// Clip rectangle.
    pub clip: ClipRect,
}

/// One validated draw call, borrowing module memory.
#[derive(Debug, Clone)]
pub struct DrawBatch<'m> {
    /// 32-bit triangle-list indices.
    pub indices: Cow<'m, [u32]>,
    /// Raw vertex records.
    pub vertices: &'m [u8],
    /// Vertex record layout.
    pub layout: VertexLayout,
    /// Clip rectangle for this draw.
    pub clip: ClipRect,
    /// Texture to sample, `None` for vertex color only.
    pub texture: Option<TextureHandle>,
}

impl<'m> DrawBatch<'m> {
    /// Derives the batch views from the current module memory.
    ///
    /// # Errors
    ///
    /// Out-of-bounds or misaligned views and invalid layouts are fatal.
    pub fn decode(memory: &'m [u8], raw: &RawGeometry) -> BridgeResult<Self> {
        raw.layout.validate()?;
        let indices = memory::view_u32(memory, Region::new(raw.index_addr, raw.index_len))?;
        let vertices = memory::view_bytes(memory, Region::new(raw.vertex_addr, raw.vertex_len))?;
        Ok(Self {
            indices,
            vertices,
            layout: raw.layout,
            clip: raw.clip,
            texture: TextureHandle::from_raw(raw.texture),
        })
    }

    /// Number of indices to draw.
    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Number of whole vertex records in the vertex view.
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32 / self.layout.stride
    }
}

/// Orthographic projection from logical pixels (origin top-left) to clip
/// space, column-major.
///
/// `(0, 0)` maps to `(-1, 1)` and `(width, height)` to `(1, -1)`.
#[must_use]
pub fn ortho_projection(width: f32, height: f32) -> [[f32; 4]; 4] {
    let sx = 2.0 / width;
    let sy = -2.0 / height;
    [
        [sx, 0.0, 0.0, 0.0],
        [0.0, sy, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [-1.0, 1.0, 0.0, 1.0],
    ]
}
