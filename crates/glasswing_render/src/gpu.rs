//! One-time GPU setup and surface management.

use glasswing_core::{BridgeError, BridgeResult};
use tracing::{debug, error, info, warn};

/// Knobs for GPU setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuOptions {
    /// Present in sync with the display.
    pub vsync: bool,
    /// Adapter preference.
    pub power_preference: wgpu::PowerPreference,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            vsync: true,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Outcome of acquiring the next surface texture.
pub enum Acquired {
    /// Ready to draw into.
    Frame(wgpu::SurfaceTexture),
    /// No frame this time; the surface was reconfigured or timed out.
    Skipped(&'static str),
}

/// Device, queue and configured presentation surface.
pub struct GpuContext {
    surface: wgpu::Surface<'static>,
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    adapter_name: String,
}

impl GpuContext {
    /// Creates the instance, surface, adapter and device, and configures the
    /// surface at `width` x `height` backing pixels.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Surface`] when no surface, adapter or device can be had.
    pub fn new<W>(window: W, width: u32, height: u32, options: &GpuOptions) -> BridgeResult<Self>
    where
        W: wgpu::WindowHandle + 'static,
    {
        #[cfg(target_os = "windows")]
        let backends = wgpu::Backends::DX12;
        #[cfg(not(target_os = "windows"))]
        let backends = wgpu::Backends::PRIMARY;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            dx12_shader_compiler: wgpu::Dx12Compiler::Fxc,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| BridgeError::Surface(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| BridgeError::Surface("no compatible GPU adapter".into()))?;

        let adapter_name = adapter.get_info().name;
        info!(adapter = %adapter_name, backend = ?adapter.get_info().backend, "GPU adapter selected");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("glasswing"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
            },
            None,
        ))
        .map_err(|e| BridgeError::Surface(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|err| {
            error!(%err, "uncaptured GPU error");
        }));

        let caps = surface.get_capabilities(&adapter);
        // Blend in the module's own color space: avoid sRGB re-encoding.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| BridgeError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if options.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        debug!(?format, width = config.width, height = config.height, "surface configured");

        Ok(Self {
            surface,
            device,
            queue,
            config,
            adapter_name,
        })
    }

    /// Reconfigures the surface if the backing size changed.
    ///
    /// Zero sizes (minimised windows) are ignored. Returns true if the
    /// surface was reconfigured.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || (width, height) == self.size() {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        debug!(width, height, "surface resized");
        true
    }

    /// Acquires the next texture to draw into.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Surface`] when the GPU is out of memory.
    pub fn acquire(&mut self) -> BridgeResult<Acquired> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(Acquired::Frame(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                Ok(Acquired::Skipped("surface lost or outdated"))
            }
            Err(wgpu::SurfaceError::Timeout) => Ok(Acquired::Skipped("surface acquire timed out")),
            Err(err) => Err(BridgeError::Surface(err.to_string())),
        }
    }

    /// Backing size in pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Surface texture format.
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Largest texture edge the device accepts.
    #[must_use]
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Name of the selected adapter.
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }
}
