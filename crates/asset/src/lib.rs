//! Model and texture loading for the viewer.
//!
//! A model file is imported into an [`scene::ImportedScene`], post-processed,
//! flattened into [`mesh::Mesh`]es and uploaded through the [`gpu::GpuDevice`]
//! seam. [`resources::ResourceManager`] caches models and textures by path.

pub mod error;
pub mod gpu;
pub mod import;
pub mod mesh;
pub mod model;
pub mod paths;
pub mod postprocess;
pub mod resources;
pub mod scene;
pub mod terrain;
pub mod texture;

#[cfg(test)]
mod test_support;

pub use error::{AssetError, AssetResult};
pub use gpu::{GpuDevice, GpuMeshId, GpuTextureId, SamplerDesc, ShaderProgram};
pub use mesh::{Mesh, MeshData, Vertex};
pub use model::Model;
pub use resources::{ModelId, ResourceManager, TextureId};
pub use texture::{Texture, TextureRole};
