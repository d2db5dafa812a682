//! In-memory result of importing a model file, before any GPU work.
//!
//! Texture coordinates follow the bottom-left origin convention regardless of
//! the source format; [`crate::postprocess`] flips them for upload.

use std::collections::HashMap;

/// Which material slot a texture reference was declared in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Diffuse,
    Specular,
    Ambient,
    Height,
    Normals,
    Emissive,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedMaterial {
    pub name: String,
    pub diffuse_color: Option<[f32; 4]>,
    pub textures: HashMap<TextureSlot, Vec<String>>,
}

impl ImportedMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Texture references declared in `slot`, in declaration order.
    pub fn textures(&self, slot: TextureSlot) -> &[String] {
        self.textures.get(&slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn add_texture(&mut self, slot: TextureSlot, reference: impl Into<String>) {
        self.textures.entry(slot).or_default().push(reference.into());
    }
}

/// One vertex/index/material group of a scene.
///
/// All per-vertex arrays that are present have `positions.len()` entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// Texture coordinate channel 0.
    pub tex_coords: Option<Vec<[f32; 2]>>,
    /// Vertex color channel 0.
    pub colors: Option<Vec<[f32; 4]>>,
    pub tangents: Option<Vec<[f32; 3]>>,
    pub bitangents: Option<Vec<[f32; 3]>>,
    /// Polygons as vertex indices; triangles once post-processed.
    pub faces: Vec<Vec<u32>>,
    pub material: Option<usize>,
}

impl ImportedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneNode {
    pub name: String,
    /// Indices into [`ImportedScene::meshes`].
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedScene {
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    pub root: Option<SceneNode>,
    /// Set by importers that could not produce usable geometry.
    pub incomplete: bool,
}

impl ImportedScene {
    pub fn material_of(&self, mesh: &ImportedMesh) -> Option<&ImportedMaterial> {
        mesh.material.and_then(|index| self.materials.get(index))
    }

    /// Sub-mesh indices in load order: depth-first from the root, each index
    /// once at its first reference; indices no node references follow in
    /// ascending order.
    pub fn mesh_visit_order(&self) -> Vec<usize> {
        let mut seen = vec![false; self.meshes.len()];
        let mut order = Vec::with_capacity(self.meshes.len());

        let mut stack: Vec<&SceneNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            for &index in &node.meshes {
                if index < seen.len() && !seen[index] {
                    seen[index] = true;
                    order.push(index);
                }
            }
            // reversed so the first child is visited first
            stack.extend(node.children.iter().rev());
        }

        order.extend((0..self.meshes.len()).filter(|&i| !seen[i]));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(meshes: Vec<usize>, children: Vec<SceneNode>) -> SceneNode {
        SceneNode {
            name: String::new(),
            meshes,
            children,
        }
    }

    #[test]
    fn visit_order_is_depth_first_and_deduplicated() {
        let scene = ImportedScene {
            meshes: vec![ImportedMesh::default(); 5],
            root: Some(node(
                vec![2],
                vec![
                    node(vec![1], vec![node(vec![2, 0], vec![])]),
                    node(vec![1], vec![]),
                ],
            )),
            ..ImportedScene::default()
        };
        // 4 is referenced nowhere, 3 neither
        assert_eq!(scene.mesh_visit_order(), vec![2, 1, 0, 3, 4]);
    }

    #[test]
    fn out_of_range_references_are_ignored() {
        let scene = ImportedScene {
            meshes: vec![ImportedMesh::default()],
            root: Some(node(vec![7, 0], vec![])),
            ..ImportedScene::default()
        };
        assert_eq!(scene.mesh_visit_order(), vec![0]);
    }

    #[test]
    fn material_textures_keep_declaration_order() {
        let mut mat = ImportedMaterial::new("bark");
        mat.add_texture(TextureSlot::Diffuse, "a.png");
        mat.add_texture(TextureSlot::Diffuse, "b.png");
        assert_eq!(mat.textures(TextureSlot::Diffuse), ["a.png", "b.png"]);
        assert!(mat.textures(TextureSlot::Specular).is_empty());
    }
}
