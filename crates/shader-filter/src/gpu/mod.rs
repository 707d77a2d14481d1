use std::any::Any;

use anyhow::Result;
use wgpu::{
    Device, DeviceDescriptor, ExperimentalFeatures, Instance, InstanceDescriptor, MemoryHints,
    PowerPreference, Queue, RequestAdapterOptions, Trace,
};

use crate::error::ResourceError;
use crate::host::{GpuTexture, Graphics, TexelFormat, Texture};

fn wgpu_format(format: TexelFormat) -> wgpu::TextureFormat {
    match format {
        TexelFormat::R32Float => wgpu::TextureFormat::R32Float,
        TexelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
    }
}

#[derive(Debug)]
pub struct WgpuTexture {
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    format: TexelFormat,
}

impl GpuTexture for WgpuTexture {
    fn width(&self) -> u32 {
        self.texture.width()
    }

    fn height(&self) -> u32 {
        self.texture.height()
    }

    fn format(&self) -> TexelFormat {
        self.format
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Headless device and queue. Textures are uploaded immediately.
pub struct WgpuGraphics {
    pub device: Device,
    pub queue: Queue,
}

impl WgpuGraphics {
    pub fn new() -> Result<Self> {
        let instance = Instance::new(&InstanceDescriptor::default());

        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&DeviceDescriptor {
            label: Some("shader-filter-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: ExperimentalFeatures::default(),
            memory_hints: MemoryHints::Performance,
            trace: Trace::Off,
        }))?;

        log::info!(
            "GPU initialized: {} ({:?})",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        Ok(Self { device, queue })
    }
}

impl Graphics for WgpuGraphics {
    fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: TexelFormat,
        data: &[u8],
    ) -> Result<Texture, ResourceError> {
        let max = self.device.limits().max_texture_dimension_2d;
        let bytes_per_row = width * format.bytes_per_texel();
        let expected = bytes_per_row as usize * height as usize;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(ResourceError::Texture {
                width,
                height,
                message: format!("dimensions must be within 1..={max}"),
            });
        }
        if data.len() < expected {
            return Err(ResourceError::Texture {
                width,
                height,
                message: format!("{} bytes supplied, {expected} required", data.len()),
            });
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shader-filter-param"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data[..expected],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: None,
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Texture::new(WgpuTexture {
            texture,
            view,
            format,
        }))
    }
}
