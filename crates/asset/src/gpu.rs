//! The seam between the loading pipeline and a graphics backend.
//!
//! The pipeline only ever sees opaque handles; the renderer crate owns the
//! actual GPU objects behind them.

use crate::error::AssetResult;
use crate::mesh::Vertex;
use crate::texture::TextureImage;

/// Opaque handle of an uploaded texture (all mip levels + sampler state).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GpuTextureId(pub u32);

/// Opaque handle of an uploaded vertex + index buffer pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GpuMeshId(pub u32);

/// Texture coordinate wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

/// Texel filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Sampler state requested together with a texture upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerDesc {
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_filter: Filter,
}

impl SamplerDesc {
    /// Repeat wrapping, linear magnification, trilinear minification.
    pub const REPEAT_TRILINEAR: Self = Self {
        wrap_u: WrapMode::Repeat,
        wrap_v: WrapMode::Repeat,
        mag_filter: Filter::Linear,
        min_filter: Filter::Linear,
        mipmap_filter: Filter::Linear,
    };
}

/// Allocates GPU resources.
pub trait GpuDevice {
    fn upload_texture(
        &mut self,
        image: &TextureImage,
        sampler: SamplerDesc,
    ) -> AssetResult<GpuTextureId>;

    /// Upload a tightly packed vertex buffer and a `u32` triangle-list index buffer.
    fn upload_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> AssetResult<GpuMeshId>;

    /// Free the buffers behind `mesh`. Unknown handles are ignored.
    fn release_mesh(&mut self, mesh: GpuMeshId);
}

/// The draw-time interface of a linked shader program, modelled on texture
/// units and named sampler uniforms.
pub trait ShaderProgram {
    /// Select the texture unit that the next [`bind_texture`](Self::bind_texture) targets.
    fn active_texture(&mut self, unit: u32);

    /// Point the sampler uniform `name` at texture unit `unit`.
    /// Names the program does not declare are ignored.
    fn set_sampler(&mut self, name: &str, unit: u32);

    /// Bind `texture` to the active texture unit.
    fn bind_texture(&mut self, texture: GpuTextureId);

    /// Draw `index_count` indices of `mesh` as a triangle list.
    fn draw_indexed(&mut self, mesh: GpuMeshId, index_count: u32);
}
