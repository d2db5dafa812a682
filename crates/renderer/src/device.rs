//! wgpu-backed resource arenas behind the loader's `GpuDevice` seam.

use std::borrow::Cow;

use asset::gpu::{Filter, GpuDevice, GpuMeshId, GpuTextureId, SamplerDesc, WrapMode};
use asset::mesh::Vertex;
use asset::texture::{PixelLayout, TextureImage};
use asset::{AssetError, AssetResult};
use wgpu::util::DeviceExt;
use wgpu::{
    AddressMode, Buffer, BufferUsages, Device, ErrorFilter, Extent3d, FilterMode, Origin3d, Queue,
    Sampler, SamplerDescriptor, TexelCopyBufferLayout, TexelCopyTextureInfo, TextureAspect,
    TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
};

/// An uploaded texture as the material bind group sees it.
pub struct GpuTexture {
    pub view: TextureView,
    /// Index into the device's sampler table.
    pub sampler: usize,
    /// Channel count of the source image (1, 3 or 4).
    pub channels: u32,
}

pub struct GpuMesh {
    pub vertex: Buffer,
    pub index: Buffer,
    pub index_count: u32,
}

/// Owns the wgpu device and queue plus every texture and mesh uploaded
/// through [`GpuDevice`]. Handles index the arenas; released meshes leave a hole.
pub struct WgpuDevice {
    device: Device,
    queue: Queue,
    textures: Vec<GpuTexture>,
    meshes: Vec<Option<GpuMesh>>,
    samplers: Vec<(SamplerDesc, Sampler)>,
    fallback: GpuTexture,
}

impl WgpuDevice {
    pub fn new(device: Device, queue: Queue) -> AssetResult<Self> {
        let white = TextureImage {
            width: 1,
            height: 1,
            layout: PixelLayout::Rgba,
            levels: vec![vec![255; 4]],
        };
        let mut samplers = Vec::new();
        let fallback = create_texture(
            &device,
            &queue,
            &mut samplers,
            &white,
            SamplerDesc::REPEAT_TRILINEAR,
            "Fallback white",
        )?;
        Ok(Self {
            device,
            queue,
            textures: Vec::new(),
            meshes: Vec::new(),
            samplers,
            fallback,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn texture(&self, id: GpuTextureId) -> Option<&GpuTexture> {
        self.textures.get(id.0 as usize)
    }

    pub fn mesh(&self, id: GpuMeshId) -> Option<&GpuMesh> {
        self.meshes.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// 1x1 opaque white, bound for empty material slots.
    pub fn fallback_texture(&self) -> &GpuTexture {
        &self.fallback
    }

    /// Sampler `index`, or the fallback's sampler for unknown indices.
    pub fn sampler(&self, index: usize) -> &Sampler {
        let entry = self.samplers.get(index).unwrap_or(&self.samplers[self.fallback.sampler]);
        &entry.1
    }

    pub fn live_mesh_count(&self) -> usize {
        self.meshes.iter().flatten().count()
    }
}

impl GpuDevice for WgpuDevice {
    fn upload_texture(
        &mut self,
        image: &TextureImage,
        sampler: SamplerDesc,
    ) -> AssetResult<GpuTextureId> {
        let label = format!("Texture #{}", self.textures.len());
        let texture = create_texture(
            &self.device,
            &self.queue,
            &mut self.samplers,
            image,
            sampler,
            &label,
        )?;
        self.textures.push(texture);
        Ok(GpuTextureId(self.textures.len() as u32 - 1))
    }

    fn upload_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> AssetResult<GpuMeshId> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(AssetError::Gpu("refusing to upload an empty mesh".into()));
        }
        let max = self.device.limits().max_buffer_size;
        check_buffer_size("vertex", vertices.len() as u64 * Vertex::STRIDE, max)?;
        check_buffer_size("index", std::mem::size_of_val(indices) as u64, max)?;
        let id = self.meshes.len();

        let device = &self.device;
        let (vertex, index) = scoped(device, || {
            let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("Mesh #{id} VB")),
                contents: bytemuck::cast_slice(vertices),
                usage: BufferUsages::VERTEX,
            });
            let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("Mesh #{id} IB")),
                contents: bytemuck::cast_slice(indices),
                usage: BufferUsages::INDEX,
            });
            (vertex, index)
        })?;

        self.meshes.push(Some(GpuMesh {
            vertex,
            index,
            index_count: indices.len() as u32,
        }));
        log::debug!(
            "Uploaded mesh #{id}: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );
        Ok(GpuMeshId(id as u32))
    }

    fn release_mesh(&mut self, mesh: GpuMeshId) {
        if let Some(slot) = self.meshes.get_mut(mesh.0 as usize) {
            if let Some(buffers) = slot.take() {
                buffers.vertex.destroy();
                buffers.index.destroy();
            }
        }
    }
}

/// Run `f` with validation and out-of-memory errors captured instead of
/// reaching the uncaptured-error handler.
fn scoped<T>(device: &Device, f: impl FnOnce() -> T) -> AssetResult<T> {
    device.push_error_scope(ErrorFilter::OutOfMemory);
    device.push_error_scope(ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(err) => Err(AssetError::Gpu(err.to_string())),
        None => Ok(value),
    }
}

/// Reject buffers the device cannot allocate before asking it to.
pub fn check_buffer_size(kind: &str, bytes: u64, max: u64) -> AssetResult<()> {
    if bytes > max {
        return Err(AssetError::Gpu(format!(
            "{kind} buffer of {bytes} bytes exceeds the device limit of {max}"
        )));
    }
    Ok(())
}

/// Texel format for an uploaded layout. RGB has no 24-bit wgpu format and is
/// widened to RGBA.
pub fn texel_format(layout: PixelLayout) -> TextureFormat {
    match layout {
        PixelLayout::Luminance => TextureFormat::R8Unorm,
        PixelLayout::Rgb | PixelLayout::Rgba => TextureFormat::Rgba8UnormSrgb,
    }
}

/// Append an opaque alpha byte to every RGB triple.
pub fn expand_rgb(rgb: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb.len() / 3 * 4);
    for texel in rgb.chunks_exact(3) {
        out.extend_from_slice(texel);
        out.push(u8::MAX);
    }
    out
}

pub fn address_mode(wrap: WrapMode) -> AddressMode {
    match wrap {
        WrapMode::Repeat => AddressMode::Repeat,
        WrapMode::ClampToEdge => AddressMode::ClampToEdge,
    }
}

pub fn filter_mode(filter: Filter) -> FilterMode {
    match filter {
        Filter::Nearest => FilterMode::Nearest,
        Filter::Linear => FilterMode::Linear,
    }
}

fn sampler_index(
    device: &Device,
    samplers: &mut Vec<(SamplerDesc, Sampler)>,
    desc: SamplerDesc,
) -> usize {
    if let Some(index) = samplers.iter().position(|(known, _)| *known == desc) {
        return index;
    }
    let sampler = device.create_sampler(&SamplerDescriptor {
        label: Some("Material sampler"),
        address_mode_u: address_mode(desc.wrap_u),
        address_mode_v: address_mode(desc.wrap_v),
        address_mode_w: AddressMode::Repeat,
        mag_filter: filter_mode(desc.mag_filter),
        min_filter: filter_mode(desc.min_filter),
        mipmap_filter: filter_mode(desc.mipmap_filter),
        ..Default::default()
    });
    samplers.push((desc, sampler));
    samplers.len() - 1
}

fn create_texture(
    device: &Device,
    queue: &Queue,
    samplers: &mut Vec<(SamplerDesc, Sampler)>,
    image: &TextureImage,
    sampler: SamplerDesc,
    label: &str,
) -> AssetResult<GpuTexture> {
    let max = device.limits().max_texture_dimension_2d;
    if image.width > max || image.height > max {
        return Err(AssetError::Gpu(format!(
            "{}x{} exceeds the device texture limit of {max}",
            image.width, image.height
        )));
    }

    let format = texel_format(image.layout);
    let bytes_per_texel = match image.layout {
        PixelLayout::Luminance => 1,
        PixelLayout::Rgb | PixelLayout::Rgba => 4,
    };

    let texture = scoped(device, || {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: image.mip_level_count(),
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, texels) in image.levels.iter().enumerate() {
            let level = level as u32;
            let (width, height) = image.level_size(level);
            let data: Cow<'_, [u8]> = match image.layout {
                PixelLayout::Rgb => Cow::Owned(expand_rgb(texels)),
                _ => Cow::Borrowed(texels),
            };
            queue.write_texture(
                TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level,
                    origin: Origin3d::ZERO,
                    aspect: TextureAspect::All,
                },
                &data,
                TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * bytes_per_texel),
                    rows_per_image: Some(height),
                },
                Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
        texture
    })?;

    Ok(GpuTexture {
        view: texture.create_view(&Default::default()),
        sampler: sampler_index(device, samplers, sampler),
        channels: image.layout.channels(),
    })
}
