//! In-memory fakes for the GPU seam and the importer.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{AssetError, AssetResult};
use crate::gpu::{GpuDevice, GpuMeshId, GpuTextureId, SamplerDesc, ShaderProgram};
use crate::import::SceneImporter;
use crate::mesh::Vertex;
use crate::scene::{ImportedMesh, ImportedScene, SceneNode};
use crate::texture::TextureImage;

/// Keeps every upload; handles are positions in the vectors.
#[derive(Default)]
pub struct RecordingGpu {
    pub textures: Vec<(TextureImage, SamplerDesc)>,
    pub meshes: Vec<(Vec<Vertex>, Vec<u32>)>,
    pub released: Vec<GpuMeshId>,
    /// Mesh uploads beyond this many fail.
    pub mesh_budget: Option<usize>,
}

impl RecordingGpu {
    pub fn live_meshes(&self) -> usize {
        self.meshes.len() - self.released.len()
    }
}

impl GpuDevice for RecordingGpu {
    fn upload_texture(
        &mut self,
        image: &TextureImage,
        sampler: SamplerDesc,
    ) -> AssetResult<GpuTextureId> {
        self.textures.push((image.clone(), sampler));
        Ok(GpuTextureId(self.textures.len() as u32 - 1))
    }

    fn upload_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> AssetResult<GpuMeshId> {
        if self.mesh_budget.is_some_and(|budget| self.meshes.len() >= budget) {
            return Err(AssetError::Gpu("out of memory".into()));
        }
        self.meshes.push((vertices.to_vec(), indices.to_vec()));
        Ok(GpuMeshId(self.meshes.len() as u32 - 1))
    }

    fn release_mesh(&mut self, mesh: GpuMeshId) {
        self.released.push(mesh);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ShaderCall {
    ActiveTexture(u32),
    SetSampler(String, u32),
    BindTexture(GpuTextureId),
    DrawIndexed(GpuMeshId, u32),
}

#[derive(Default)]
pub struct RecordingProgram {
    pub calls: Vec<ShaderCall>,
}

impl ShaderProgram for RecordingProgram {
    fn active_texture(&mut self, unit: u32) {
        self.calls.push(ShaderCall::ActiveTexture(unit));
    }

    fn set_sampler(&mut self, name: &str, unit: u32) {
        self.calls.push(ShaderCall::SetSampler(name.to_string(), unit));
    }

    fn bind_texture(&mut self, texture: GpuTextureId) {
        self.calls.push(ShaderCall::BindTexture(texture));
    }

    fn draw_indexed(&mut self, mesh: GpuMeshId, index_count: u32) {
        self.calls.push(ShaderCall::DrawIndexed(mesh, index_count));
    }
}

/// Returns a clone of a fixed scene for every path and counts the calls.
pub struct FixedImporter {
    pub scene: ImportedScene,
    pub imports: Rc<Cell<usize>>,
}

impl FixedImporter {
    pub fn new(scene: ImportedScene) -> (Self, Rc<Cell<usize>>) {
        let imports = Rc::new(Cell::new(0));
        let importer = Self {
            scene,
            imports: Rc::clone(&imports),
        };
        (importer, imports)
    }
}

impl SceneImporter for FixedImporter {
    fn import(&self, _path: &Path) -> AssetResult<ImportedScene> {
        self.imports.set(self.imports.get() + 1);
        Ok(self.scene.clone())
    }
}

/// A single triangle; the first vertex sits at (2, 4, 6).
pub fn triangle(name: &str, material: Option<usize>) -> ImportedMesh {
    ImportedMesh {
        name: name.to_string(),
        positions: vec![[2.0, 4.0, 6.0], [0.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
        faces: vec![vec![0, 1, 2]],
        material,
        ..ImportedMesh::default()
    }
}

/// A root node that references every mesh once, in index order.
pub fn flat_root(mesh_count: usize) -> SceneNode {
    SceneNode {
        name: "root".into(),
        meshes: (0..mesh_count).collect(),
        children: Vec::new(),
    }
}

/// Write a small RGB png named `name` into `dir`.
pub fn write_png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image::RgbImage::from_pixel(4, 4, image::Rgb([200, 100, 50]))
        .save(&path)
        .unwrap();
    path
}
