//! Batch shader.
//!
//! One WGSL module for every draw. The vertex stage projects logical-pixel
//! positions with the uniform matrix and premultiplies the `unorm8x4` vertex
//! color; the fragment stage optionally multiplies by the bound texture.
//!
//! Bind group 0:
//! ```text
//! binding 0  uniform   BatchUniforms (matrix, use_tex)
//! binding 1  texture   texture_2d<f32>  (1x1 white when untextured)
//! binding 2  sampler   filtering sampler
//! ```

use bytemuck::{Pod, Zeroable};

/// Vertex entry point.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Fragment entry point.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Uniform block shared by every draw, 80 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BatchUniforms {
    /// Column-major projection.
    pub matrix: [[f32; 4]; 4],
    /// Non-zero to sample the texture.
    pub use_tex: u32,
    /// Std140 tail padding.
    pub _pad: [u32; 3],
}

impl BatchUniforms {
    /// Uniforms for one draw.
    #[must_use]
    pub const fn new(matrix: [[f32; 4]; 4], use_tex: bool) -> Self {
        Self {
            matrix,
            use_tex: use_tex as u32,
            _pad: [0; 3],
        }
    }
}

/// Identity matrix; used for draws already in clip space.
pub const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// WGSL source.
pub const BATCH_WGSL: &str = r"
struct BatchUniforms {
    matrix: mat4x4<f32>,
    use_tex: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};

@group(0) @binding(0) var<uniform> uniforms: BatchUniforms;
@group(0) @binding(1) var batch_texture: texture_2d<f32>;
@group(0) @binding(2) var batch_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = uniforms.matrix * vec4<f32>(in.position, 0.0, 1.0);
    // unorm8x4 already arrives in 0..1; convert to premultiplied alpha.
    out.color = vec4<f32>(in.color.rgb * in.color.a, in.color.a);
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    // Sample unconditionally: textureSample needs uniform control flow.
    let texel = textureSample(batch_texture, batch_sampler, in.uv);
    if (uniforms.use_tex != 0u) {
        return texel * in.color;
    }
    return in.color;
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_block_size() {
        assert_eq!(std::mem::size_of::<BatchUniforms>(), 80);
        assert_eq!(bytemuck::bytes_of(&BatchUniforms::new(IDENTITY, true)).len(), 80);
    }

    #[test]
    fn test_use_tex_flag() {
        assert_eq!(BatchUniforms::new(IDENTITY, true).use_tex, 1);
        assert_eq!(BatchUniforms::new(IDENTITY, false).use_tex, 0);
    }

    #[test]
    fn test_entry_points_exist_in_source() {
        assert!(BATCH_WGSL.contains(&format!("fn {VERTEX_ENTRY}(")));
        assert!(BATCH_WGSL.contains(&format!("fn {FRAGMENT_ENTRY}(")));
    }
}
