//! A whole imported file as a flat list of meshes.

use std::path::{Path, PathBuf};

use crate::error::{AssetError, AssetResult};
use crate::gpu::{GpuDevice, ShaderProgram};
use crate::import::SceneImporter;
use crate::mesh::Mesh;
use crate::postprocess::{self, PostProcess};
use crate::resources::TextureCache;

#[derive(Debug)]
pub struct Model {
    path: PathBuf,
    meshes: Vec<Mesh>,
}

impl Model {
    /// Import `path`, post-process it and build one uploaded [`Mesh`] per
    /// sub-mesh. Each sub-mesh is loaded exactly once, in
    /// [`ImportedScene::mesh_visit_order`](crate::scene::ImportedScene::mesh_visit_order).
    pub fn load(
        path: &Path,
        importer: &dyn SceneImporter,
        textures: &mut TextureCache,
        gpu: &mut dyn GpuDevice,
    ) -> AssetResult<Self> {
        let mut scene = importer.import(path)?;
        if scene.incomplete {
            return Err(AssetError::IncompleteScene {
                path: path.to_path_buf(),
            });
        }
        if scene.root.is_none() {
            return Err(AssetError::MissingRootNode {
                path: path.to_path_buf(),
            });
        }
        postprocess::apply(&mut scene, PostProcess::VIEWER);

        let mut meshes = Vec::with_capacity(scene.meshes.len());
        for index in scene.mesh_visit_order() {
            let sub_mesh = &scene.meshes[index];
            if sub_mesh.faces.is_empty() {
                log::warn!(
                    "Skipping mesh {} ('{}') of {}: no triangles",
                    index,
                    sub_mesh.name,
                    path.display()
                );
                continue;
            }
            log::debug!("loading mesh {index}");
            meshes.push(Mesh::load(&scene, sub_mesh, Some(path), textures, gpu)?);
        }

        let mut model = Self::from_meshes(path, meshes);
        model.setup(gpu)?;

        log::info!(
            "Loaded model {} ({} meshes, {} triangles)",
            path.display(),
            model.meshes.len(),
            model.triangle_count()
        );
        Ok(model)
    }

    /// A model that did not come from a file. Call [`setup`](Self::setup) before drawing.
    pub fn from_meshes(path: impl Into<PathBuf>, meshes: Vec<Mesh>) -> Self {
        Self {
            path: path.into(),
            meshes,
        }
    }

    /// Upload every mesh; on failure the meshes uploaded so far are released again.
    pub fn setup(&mut self, gpu: &mut dyn GpuDevice) -> AssetResult<()> {
        for i in 0..self.meshes.len() {
            if let Err(err) = self.meshes[i].setup(gpu) {
                for mesh in &mut self.meshes[..i] {
                    mesh.release(gpu);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Draw meshes in order. No node transforms are applied.
    pub fn draw(&self, textures: &TextureCache, program: &mut dyn ShaderProgram) {
        for mesh in &self.meshes {
            mesh.draw(textures, program);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.data().triangle_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::GpuMeshId;
    use crate::scene::{ImportedMesh, ImportedScene, SceneNode};
    use crate::test_support::{FixedImporter, RecordingGpu, flat_root, triangle};

    /// Triangle whose first vertex has x == 2 * `tag`, i.e. `tag` after scaling.
    fn tagged(tag: usize) -> ImportedMesh {
        let mut mesh = triangle(&format!("m{tag}"), None);
        mesh.positions[0] = [2.0 * tag as f32, 0.0, 0.0];
        mesh
    }

    fn tags(model: &Model) -> Vec<usize> {
        model
            .meshes()
            .iter()
            .map(|m| m.data().vertices[0].position[0] as usize)
            .collect()
    }

    fn load(scene: ImportedScene, gpu: &mut RecordingGpu) -> AssetResult<Model> {
        let (importer, _) = FixedImporter::new(scene);
        Model::load(Path::new("scene.obj"), &importer, &mut TextureCache::new(), gpu)
    }

    #[test]
    fn shared_meshes_load_once_in_first_reference_order() {
        let scene = ImportedScene {
            meshes: (0..4).map(tagged).collect(),
            root: Some(SceneNode {
                name: "root".into(),
                meshes: Vec::new(),
                children: vec![
                    SceneNode {
                        name: "a".into(),
                        meshes: vec![2],
                        children: Vec::new(),
                    },
                    SceneNode {
                        name: "b".into(),
                        meshes: vec![2, 0],
                        children: Vec::new(),
                    },
                ],
            }),
            ..ImportedScene::default()
        };
        let mut gpu = RecordingGpu::default();
        let model = load(scene, &mut gpu).unwrap();

        // 1 and 3 are unreferenced and come last
        assert_eq!(tags(&model), [2, 0, 1, 3]);
        assert_eq!(gpu.meshes.len(), 4);
        assert!(model.meshes().iter().all(|m| m.gpu_handle().is_some()));
        assert_eq!(model.path(), Path::new("scene.obj"));
        assert_eq!(model.triangle_count(), 4);
    }

    #[test]
    fn incomplete_and_rootless_scenes_are_rejected() {
        let mut gpu = RecordingGpu::default();
        let incomplete = ImportedScene {
            incomplete: true,
            root: Some(flat_root(0)),
            ..ImportedScene::default()
        };
        let err = load(incomplete, &mut gpu).unwrap_err();
        assert!(matches!(err, AssetError::IncompleteScene { .. }));
        assert!(err.to_string().contains("scene.obj"));

        let rootless = ImportedScene {
            meshes: vec![tagged(0)],
            ..ImportedScene::default()
        };
        let err = load(rootless, &mut gpu).unwrap_err();
        assert!(matches!(err, AssetError::MissingRootNode { .. }));
        assert!(gpu.meshes.is_empty());
    }

    #[test]
    fn quads_are_triangulated_with_generated_normals() {
        let quad = ImportedMesh {
            name: "quad".into(),
            positions: vec![
                [0.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [2.0, 2.0, 0.0],
                [0.0, 2.0, 0.0],
            ],
            faces: vec![vec![0, 1, 2, 3]],
            ..ImportedMesh::default()
        };
        let scene = ImportedScene {
            meshes: vec![quad],
            root: Some(flat_root(1)),
            ..ImportedScene::default()
        };
        let mut gpu = RecordingGpu::default();
        let model = load(scene, &mut gpu).unwrap();

        let data = model.meshes()[0].data();
        assert_eq!(data.indices, vec![0, 1, 2, 0, 2, 3]);
        for v in &data.vertices {
            assert!((v.normal[2] - 1.0).abs() < 1e-5, "{:?}", v.normal);
        }
    }

    #[test]
    fn meshes_without_faces_are_skipped() {
        let mut empty = tagged(1);
        empty.faces.clear();
        let scene = ImportedScene {
            meshes: vec![tagged(0), empty],
            root: Some(flat_root(2)),
            ..ImportedScene::default()
        };
        let mut gpu = RecordingGpu::default();
        let model = load(scene, &mut gpu).unwrap();
        assert_eq!(tags(&model), [0]);
    }

    #[test]
    fn failed_setup_releases_uploaded_meshes() {
        let scene = ImportedScene {
            meshes: (0..3).map(tagged).collect(),
            root: Some(flat_root(3)),
            ..ImportedScene::default()
        };
        let mut gpu = RecordingGpu {
            mesh_budget: Some(2),
            ..RecordingGpu::default()
        };
        let err = load(scene, &mut gpu).unwrap_err();
        assert!(matches!(err, AssetError::Gpu(_)));
        assert_eq!(gpu.released, vec![GpuMeshId(0), GpuMeshId(1)]);
        assert_eq!(gpu.live_meshes(), 0);
    }
}
