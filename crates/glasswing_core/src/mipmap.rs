//! CPU mip chain generation for RGBA8 textures.
//!
//! Each level halves both dimensions (never below 1) and averages the
//! corresponding 2x2 block of the level above; on odd edges the last
//! row/column is reused.

use crate::error::{BridgeError, BridgeResult};

/// Bytes per RGBA8 texel.
pub const BYTES_PER_TEXEL: usize = 4;

/// One level of a mip chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    /// Level width in texels.
    pub width: u32,
    /// Level height in texels.
    pub height: u32,
    /// Tightly packed RGBA8 texels.
    pub pixels: Vec<u8>,
}

/// Number of levels in a full chain for a `width` x `height` base.
#[must_use]
pub fn level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Checks a requested texture size and returns its RGBA8 byte length.
///
/// # Errors
///
/// [`BridgeError::InvalidTexture`] for a zero dimension, a dimension above
/// `max_dimension`, or a byte length that does not fit in 32 bits.
pub fn texture_byte_len(width: u32, height: u32, max_dimension: u32) -> BridgeResult<u32> {
    let invalid = |reason| BridgeError::InvalidTexture {
        width,
        height,
        reason,
    };
    if width == 0 || height == 0 {
        return Err(invalid("zero-sized"));
    }
    if width > max_dimension || height > max_dimension {
        return Err(invalid("exceeds the device texture limit"));
    }
    width
        .checked_mul(height)
        .and_then(|texels| texels.checked_mul(BYTES_PER_TEXEL as u32))
        .ok_or_else(|| invalid("byte size overflows"))
}

/// Builds levels `1..` of the chain below `base` (the base is not copied).
#[must_use]
pub fn mip_chain(base: &[u8], width: u32, height: u32) -> Vec<MipLevel> {
    let levels = level_count(width, height) as usize;
    let mut chain: Vec<MipLevel> = Vec::with_capacity(levels.saturating_sub(1));

    let (mut src_w, mut src_h) = (width, height);
    for _ in 1..levels {
        let src = chain.last().map_or(base, |level| level.pixels.as_slice());
        let next = downsample(src, src_w, src_h);
        src_w = next.width;
        src_h = next.height;
        chain.push(next);
    }
    chain
}

fn downsample(src: &[u8], width: u32, height: u32) -> MipLevel {
    let dst_w = (width / 2).max(1);
    let dst_h = (height / 2).max(1);
    let (w, h) = (width as usize, height as usize);
    let mut pixels = Vec::with_capacity(dst_w as usize * dst_h as usize * BYTES_PER_TEXEL);

    for y in 0..dst_h as usize {
        let y0 = (y * 2).min(h - 1);
        let y1 = (y * 2 + 1).min(h - 1);
        for x in 0..dst_w as usize {
            let x0 = (x * 2).min(w - 1);
            let x1 = (x * 2 + 1).min(w - 1);
            for channel in 0..BYTES_PER_TEXEL {
                let texel = |tx: usize, ty: usize| u32::from(src[(ty * w + tx) * BYTES_PER_TEXEL + channel]);
                let sum = texel(x0, y0) + texel(x1, y0) + texel(x0, y1) + texel(x1, y1);
                pixels.push(((sum + 2) / 4) as u8);
            }
        }
    }

    MipLevel {
        width: dst_w,
        height: dst_h,
        pixels,
    }
}
