//! Render pipelines, one per vertex layout.
//!
//! The module picks stride and field offsets per draw. wgpu bakes those
//! into the pipeline, so pipelines are built on first use of a layout and
//! kept for the session. In practice a module uses one or two layouts.

use std::collections::HashMap;

use glasswing_core::{BridgeError, BridgeResult, VertexLayout};
use tracing::debug;

use crate::shader::{BATCH_WGSL, FRAGMENT_ENTRY, VERTEX_ENTRY};

/// Bind group layout shared by every pipeline (uniforms, texture, sampler).
pub(crate) fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("glasswing batch bind group layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Vertex attributes for `layout`: position, color, uv at locations 0..3.
#[must_use]
pub fn vertex_attributes(layout: VertexLayout) -> [wgpu::VertexAttribute; 3] {
    [
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: u64::from(layout.pos),
            shader_location: 0,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Unorm8x4,
            offset: u64::from(layout.col),
            shader_location: 1,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: u64::from(layout.uv),
            shader_location: 2,
        },
    ]
}

/// Shader module plus every pipeline built so far.
pub struct PipelineCache {
    shader: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    pipelines: HashMap<VertexLayout, wgpu::RenderPipeline>,
}

impl PipelineCache {
    /// Compiles the batch shader.
    ///
    /// # Errors
    ///
    /// [`BridgeError::PipelineSetup`] if the shader fails validation.
    pub fn new(
        device: &wgpu::Device,
        bind_group_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
    ) -> BridgeResult<Self> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("glasswing batch shader"),
            source: wgpu::ShaderSource::Wgsl(BATCH_WGSL.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("glasswing batch pipeline layout"),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });
        check_scope(device)?;

        Ok(Self {
            shader,
            layout,
            format,
            pipelines: HashMap::new(),
        })
    }

    /// The pipeline for `layout`, building it on first use.
    ///
    /// # Errors
    ///
    /// [`BridgeError::PipelineSetup`] if pipeline creation fails validation.
    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        layout: VertexLayout,
    ) -> BridgeResult<&wgpu::RenderPipeline> {
        if !self.pipelines.contains_key(&layout) {
            let pipeline = self.build(device, layout)?;
            debug!(?layout, total = self.pipelines.len() + 1, "pipeline built");
            self.pipelines.insert(layout, pipeline);
        }
        self.pipelines
            .get(&layout)
            .ok_or_else(|| BridgeError::PipelineSetup(format!("pipeline for {layout:?} vanished")))
    }

    fn build(&self, device: &wgpu::Device, layout: VertexLayout) -> BridgeResult<wgpu::RenderPipeline> {
        let attributes = vertex_attributes(layout);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("glasswing batch pipeline"),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: VERTEX_ENTRY,
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: u64::from(layout.stride),
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: FRAGMENT_ENTRY,
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.format,
                    // ONE, ONE_MINUS_SRC_ALPHA
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });
        check_scope(device)?;
        Ok(pipeline)
    }
}

fn check_scope(device: &wgpu::Device) -> BridgeResult<()> {
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(BridgeError::PipelineSetup(err.to_string())),
        None => Ok(()),
    }
}
