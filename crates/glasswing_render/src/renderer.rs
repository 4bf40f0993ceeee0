//! # Batch Renderer
//!
//! Executes the module's draw calls.
//!
//! ```text
//! begin_frame ─> [set_clip | clear | render | create/destroy texture]* ─> end_frame
//!                              │
//!                              └─ per batch: write uniforms, upload index+vertex
//!                                 buffers, one pass, one draw_indexed, submit
//! ```
//!
//! The first pass of a frame clears the target to opaque black; later passes
//! load it. A frame with no passes at all still clears before presenting.

use bytemuck::{Pod, Zeroable};
use glasswing_core::batch::{
    ortho_projection, ClipRect, ClipState, DrawBatch, RawGeometry, ScissorRect, VertexLayout,
};
use glasswing_core::memory::{self, Region};
use glasswing_core::mipmap;
use glasswing_core::resource::resolve_texture;
use glasswing_core::{
    BridgeError, BridgeResult, Diagnostic, DiagnosticSender, DrawTarget, ResourceTable,
    TextureHandle,
};
use tracing::{debug, trace, warn};
use wgpu::util::DeviceExt;

use crate::gpu::{Acquired, GpuContext};
use crate::pipeline::{self, PipelineCache};
use crate::shader::{BatchUniforms, IDENTITY};
use crate::stats::FrameStats;
use crate::texture::{self, GpuTexture, SharedBindings};

/// Vertex record of the internal clear quad. Read by the GPU only.
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct QuadVertex {
    pos: [f32; 2],
    col: [u8; 4],
    uv: [f32; 2],
}

const QUAD_LAYOUT: VertexLayout = VertexLayout {
    stride: 20,
    pos: 0,
    col: 8,
    uv: 12,
};

const BLACK: [u8; 4] = [0, 0, 0, 255];

/// Full-target quad in clip space; the scissor limits it to the clip.
const CLEAR_QUAD: [QuadVertex; 4] = [
    QuadVertex { pos: [-1.0, -1.0], col: BLACK, uv: [0.0, 0.0] },
    QuadVertex { pos: [1.0, -1.0], col: BLACK, uv: [0.0, 0.0] },
    QuadVertex { pos: [1.0, 1.0], col: BLACK, uv: [0.0, 0.0] },
    QuadVertex { pos: [-1.0, 1.0], col: BLACK, uv: [0.0, 0.0] },
];

const CLEAR_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// The surface texture being drawn this frame.
struct FrameTarget {
    surface: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    /// Set once the first pass has cleared the target.
    loaded: bool,
}

/// One draw inside a pass.
struct PassDraw<'a> {
    pipeline: &'a wgpu::RenderPipeline,
    bind_group: &'a wgpu::BindGroup,
    vertices: &'a wgpu::Buffer,
    indices: &'a wgpu::Buffer,
    index_count: u32,
    scissor: ScissorRect,
}

/// Draw-call executor and texture owner.
pub struct Renderer {
    gpu: GpuContext,
    bind_group_layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
    sampler: wgpu::Sampler,
    pipelines: PipelineCache,
    white: GpuTexture,
    textures: ResourceTable<GpuTexture>,
    clip: ClipState,
    logical_size: (f32, f32),
    frame: Option<FrameTarget>,
    stats: FrameStats,
    diagnostics: DiagnosticSender,
}

impl Renderer {
    /// Builds shader, pipeline and shared bindings on top of `gpu`.
    ///
    /// # Errors
    ///
    /// [`glasswing_core::BridgeError::PipelineSetup`] if the shader or the
    /// default pipeline fails validation.
    pub fn new(
        gpu: GpuContext,
        logical_size: (f32, f32),
        diagnostics: DiagnosticSender,
    ) -> BridgeResult<Self> {
        let device = &gpu.device;
        let bind_group_layout = pipeline::bind_group_layout(device);
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glasswing uniforms"),
            size: std::mem::size_of::<BatchUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = texture::create_sampler(device);

        let mut pipelines = PipelineCache::new(device, &bind_group_layout, gpu.format())?;
        // Build one pipeline now so a broken setup fails before the first frame.
        pipelines.get_or_create(device, QUAD_LAYOUT)?;

        let white = GpuTexture::upload(
            device,
            &gpu.queue,
            &SharedBindings {
                layout: &bind_group_layout,
                uniforms: &uniforms,
                sampler: &sampler,
            },
            &[255; 4],
            1,
            1,
        );

        let (width, height) = gpu.size();
        Ok(Self {
            gpu,
            bind_group_layout,
            uniforms,
            sampler,
            pipelines,
            white,
            textures: ResourceTable::new(),
            clip: ClipState::new(width, height),
            logical_size,
            frame: None,
            stats: FrameStats::default(),
            diagnostics,
        })
    }

    // =========================================================================
    // Frame
    // =========================================================================

    /// Matches the backing surface to the window.
    ///
    /// Returns true if the surface was reconfigured.
    pub fn resize(&mut self, pixel_size: (u32, u32), logical_size: (f32, f32)) -> bool {
        self.logical_size = logical_size;
        self.gpu.resize(pixel_size.0, pixel_size.1)
    }

    /// Acquires the frame's target. Returns false when the frame is skipped;
    /// draws until [`Renderer::end_frame`] are then dropped.
    ///
    /// # Errors
    ///
    /// Fatal surface errors.
    pub fn begin_frame(&mut self) -> BridgeResult<bool> {
        self.stats = FrameStats::default();
        if self.frame.is_some() {
            return Ok(true);
        }
        match self.gpu.acquire()? {
            Acquired::Frame(surface) => {
                let view = surface
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                self.frame = Some(FrameTarget {
                    surface,
                    view,
                    loaded: false,
                });
                Ok(true)
            }
            Acquired::Skipped(reason) => {
                self.diagnostics.report(Diagnostic::FrameSkipped {
                    reason: reason.to_owned(),
                });
                Ok(false)
            }
        }
    }

    /// Presents the frame and returns its statistics.
    pub fn end_frame(&mut self) -> FrameStats {
        if let Some(frame) = self.frame.take() {
            if !frame.loaded {
                encode_pass(&self.gpu.device, &self.gpu.queue, &frame.view, false, None);
            }
            frame.surface.present();
        }
        self.stats.live_textures = self.textures.len() as u32;
        trace!(?self.stats, "frame presented");
        self.stats
    }

    // =========================================================================
    // Module calls
    // =========================================================================

    /// Sets the clip rectangle for subsequent clears.
    pub fn set_clip(&mut self, clip: ClipRect) {
        self.clip.set(clip);
    }

    /// Fills the current clip rectangle with opaque black.
    ///
    /// # Errors
    ///
    /// Pipeline failures.
    pub fn clear(&mut self) -> BridgeResult<()> {
        let (width, height) = self.gpu.size();
        let Some(scissor) = self.clip.clear_scissor(width, height) else {
            return Ok(());
        };
        if self.draw(
            QUAD_LAYOUT,
            &CLEAR_INDICES,
            bytemuck::cast_slice(&CLEAR_QUAD),
            scissor,
            None,
            IDENTITY,
        )? {
            self.stats.clears += 1;
        }
        Ok(())
    }

    /// Decodes one batch from module memory and draws it.
    ///
    /// The batch's clip applies to this draw only; the clip set with
    /// [`Renderer::set_clip`] stays in force for later clears.
    ///
    /// # Errors
    ///
    /// Out-of-bounds views, invalid layouts and pipeline failures.
    pub fn render(&mut self, memory: &[u8], raw: &RawGeometry) -> BridgeResult<()> {
        let batch = DrawBatch::decode(memory, raw)?;
        self.draw_batch(&batch)
    }

    /// Uploads an RGBA8 texture from module memory and returns its handle.
    ///
    /// # Errors
    ///
    /// Invalid sizes, out-of-bounds pixel views and
    /// [`BridgeError::HandlesExhausted`].
    pub fn create_texture(
        &mut self,
        memory: &[u8],
        pixels_addr: u32,
        width: u32,
        height: u32,
    ) -> BridgeResult<TextureHandle> {
        let len = mipmap::texture_byte_len(width, height, self.gpu.max_texture_dimension())?;
        let pixels = memory::view_bytes(memory, Region::new(pixels_addr, len))?;

        let texture = GpuTexture::upload(
            &self.gpu.device,
            &self.gpu.queue,
            &SharedBindings {
                layout: &self.bind_group_layout,
                uniforms: &self.uniforms,
                sampler: &self.sampler,
            },
            pixels,
            width,
            height,
        );
        let mip_levels = texture.mip_levels();
        let handle = self
            .textures
            .insert(texture)
            .ok_or(BridgeError::HandlesExhausted)?;
        debug!(%handle, width, height, mip_levels, "texture created");
        Ok(handle)
    }

    /// Releases a texture. Unknown handles are ignored and reported.
    pub fn destroy_texture(&mut self, raw: u32) {
        match TextureHandle::from_raw(raw).and_then(|handle| self.textures.remove(handle)) {
            Some(texture) => {
                texture.release();
                debug!(handle = raw, "texture destroyed");
            }
            None => {
                warn!(handle = raw, "destroy of unknown texture ignored");
                self.diagnostics
                    .report(Diagnostic::UnknownTextureOnDestroy { handle: raw });
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Backing size in pixels.
    #[must_use]
    pub fn pixel_size(&self) -> (u32, u32) {
        self.gpu.size()
    }

    /// Logical (displayed) size.
    #[must_use]
    pub fn logical_size(&self) -> (f32, f32) {
        self.logical_size
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn draw_batch(&mut self, batch: &DrawBatch<'_>) -> BridgeResult<()> {
        let (width, height) = self.gpu.size();
        let (logical_w, logical_h) = self.logical_size;
        let scissor = self.clip.batch_scissor(batch.clip, width, height);

        let Some(scissor) = scissor.filter(|_| {
            batch.index_count() > 0 && !batch.vertices.is_empty() && logical_w > 0.0 && logical_h > 0.0
        }) else {
            self.stats.batches_skipped += 1;
            trace!(clip = ?batch.clip, vertices = batch.vertex_count(), "batch skipped");
            return Ok(());
        };

        let texture = resolve_texture(&self.textures, batch.texture, &self.diagnostics);
        if batch.texture.is_some() && texture.is_none() {
            self.stats.texture_fallbacks += 1;
        }

        let drawn = self.draw(
            batch.layout,
            &batch.indices,
            batch.vertices,
            scissor,
            texture,
            ortho_projection(logical_w, logical_h),
        )?;
        if drawn {
            self.stats.batches_drawn += 1;
            self.stats.indices_drawn += u64::from(batch.index_count());
        } else {
            self.stats.batches_skipped += 1;
        }
        Ok(())
    }

    /// Submits one pass with one draw. Returns false outside a frame.
    fn draw(
        &mut self,
        layout: VertexLayout,
        indices: &[u32],
        vertices: &[u8],
        scissor: ScissorRect,
        texture: Option<TextureHandle>,
        matrix: [[f32; 4]; 4],
    ) -> BridgeResult<bool> {
        let Some(frame) = self.frame.as_mut() else {
            trace!("draw outside a frame dropped");
            return Ok(false);
        };
        let device = &self.gpu.device;
        let pipeline = self.pipelines.get_or_create(device, layout)?;
        let bound = texture.and_then(|handle| self.textures.get(handle));
        let bind_group = bound.map_or(&self.white.bind_group, |t| &t.bind_group);

        self.gpu.queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&BatchUniforms::new(matrix, bound.is_some())),
        );
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("glasswing indices"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("glasswing vertices"),
            contents: vertices,
            usage: wgpu::BufferUsages::VERTEX,
        });

        encode_pass(
            device,
            &self.gpu.queue,
            &frame.view,
            frame.loaded,
            Some(PassDraw {
                pipeline,
                bind_group,
                vertices: &vertex_buffer,
                indices: &index_buffer,
                index_count: indices.len() as u32,
                scissor,
            }),
        );
        frame.loaded = true;
        Ok(true)
    }
}

impl DrawTarget for Renderer {
    fn pixel_size(&self) -> (u32, u32) {
        Renderer::pixel_size(self)
    }

    fn logical_size(&self) -> (f32, f32) {
        Renderer::logical_size(self)
    }

    fn set_clip(&mut self, clip: ClipRect) {
        Renderer::set_clip(self, clip);
    }

    fn clear(&mut self) -> BridgeResult<()> {
        Renderer::clear(self)
    }

    fn render(&mut self, memory: &[u8], raw: &RawGeometry) -> BridgeResult<()> {
        Renderer::render(self, memory, raw)
    }

    fn create_texture(
        &mut self,
        memory: &[u8],
        pixels_addr: u32,
        width: u32,
        height: u32,
    ) -> BridgeResult<TextureHandle> {
        Renderer::create_texture(self, memory, pixels_addr, width, height)
    }

    fn destroy_texture(&mut self, raw: u32) {
        Renderer::destroy_texture(self, raw);
    }
}

/// Records and submits one render pass over `view`.
fn encode_pass(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    view: &wgpu::TextureView,
    load_existing: bool,
    draw: Option<PassDraw<'_>>,
) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("glasswing batch encoder"),
    });
    {
        let load = if load_existing {
            wgpu::LoadOp::Load
        } else {
            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("glasswing batch pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Some(draw) = draw {
            let ScissorRect {
                x,
                y,
                width,
                height,
            } = draw.scissor;
            pass.set_pipeline(draw.pipeline);
            pass.set_bind_group(0, draw.bind_group, &[]);
            pass.set_vertex_buffer(0, draw.vertices.slice(..));
            pass.set_index_buffer(draw.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.set_scissor_rect(x, y, width, height);
            pass.draw_indexed(0..draw.index_count, 0, 0..1);
        }
    }
    queue.submit(Some(encoder.finish()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_quad_matches_its_layout() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), QUAD_LAYOUT.stride as usize);
        assert!(QUAD_LAYOUT.validate().is_ok());
        let bytes: &[u8] = bytemuck::cast_slice(&CLEAR_QUAD);
        assert_eq!(&bytes[8..12], &BLACK);
    }

    #[test]
    fn test_clear_quad_covers_clip_space() {
        for index in CLEAR_INDICES {
            assert!((index as usize) < CLEAR_QUAD.len());
        }
        let xs: Vec<f32> = CLEAR_QUAD.iter().map(|v| v.pos[0]).collect();
        assert!(xs.contains(&-1.0) && xs.contains(&1.0));
    }
}
