//! GPU textures created from module pixel data.

use glasswing_core::mipmap::{self, BYTES_PER_TEXEL};

/// Format of every module texture.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A texture with its ready-to-bind group.
pub struct GpuTexture {
    texture: wgpu::Texture,
    pub(crate) bind_group: wgpu::BindGroup,
    mip_levels: u32,
}

impl GpuTexture {
    /// Uploads `pixels` (tightly packed RGBA8) with a full mip chain.
    ///
    /// The caller has already checked the dimensions against the device
    /// limits and that `pixels` holds `width * height * 4` bytes.
    pub(crate) fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bindings: &SharedBindings<'_>,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Self {
        let mip_levels = mipmap::level_count(width, height);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("glasswing module texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        write_level(queue, &texture, 0, pixels, width, height);
        for (level, mip) in (1..).zip(mipmap::mip_chain(pixels, width, height)) {
            write_level(queue, &texture, level, &mip.pixels, mip.width, mip.height);
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = bindings.bind(device, &view);

        Self {
            texture,
            bind_group,
            mip_levels,
        }
    }

    /// Frees the GPU allocation now rather than when the last bind group
    /// referencing it is dropped.
    pub(crate) fn release(self) {
        self.texture.destroy();
    }

    /// Number of mip levels, base included.
    #[must_use]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

/// Everything but the texture view that goes into a batch bind group.
pub(crate) struct SharedBindings<'a> {
    pub layout: &'a wgpu::BindGroupLayout,
    pub uniforms: &'a wgpu::Buffer,
    pub sampler: &'a wgpu::Sampler,
}

impl SharedBindings<'_> {
    fn bind(&self, device: &wgpu::Device, view: &wgpu::TextureView) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("glasswing batch bind group"),
            layout: self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(self.sampler),
                },
            ],
        })
    }
}

/// Linear magnification, nearest minification, linear between mips, repeat.
pub(crate) fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("glasswing sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

fn write_level(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    level: u32,
    pixels: &[u8],
    width: u32,
    height: u32,
) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: level,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(width * BYTES_PER_TEXEL as u32),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}
