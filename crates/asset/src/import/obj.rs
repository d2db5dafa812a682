//! Wavefront OBJ + MTL via `tobj`.

use std::path::Path;

use crate::error::{AssetError, AssetResult};
use crate::scene::{ImportedMaterial, ImportedMesh, ImportedScene, SceneNode, TextureSlot};

use super::SceneImporter;

/// Imports `.obj` files. Polygons are kept as written; triangulation is a
/// post-process step.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjImporter;

impl SceneImporter for ObjImporter {
    fn import(&self, path: &Path) -> AssetResult<ImportedScene> {
        let options = tobj::LoadOptions {
            single_index: true,
            triangulate: false,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };

        let (models, materials) =
            tobj::load_obj(path, &options).map_err(|e| AssetError::SceneImport {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let materials = match materials {
            Ok(materials) => materials,
            Err(e) => {
                log::warn!("No usable MTL for {}: {}", path.display(), e);
                Vec::new()
            }
        };

        let mut scene = ImportedScene {
            materials: materials.iter().map(convert_material).collect(),
            ..ImportedScene::default()
        };

        let mut root = SceneNode {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ..SceneNode::default()
        };

        for model in &models {
            let index = scene.meshes.len();
            scene.meshes.push(convert_mesh(&model.name, &model.mesh));
            root.children.push(SceneNode {
                name: model.name.clone(),
                meshes: vec![index],
                children: Vec::new(),
            });
        }

        scene.incomplete = scene.meshes.is_empty();
        scene.root = Some(root);
        log::debug!(
            "OBJ {}: {} meshes, {} materials",
            path.display(),
            scene.meshes.len(),
            scene.materials.len()
        );
        Ok(scene)
    }
}

fn convert_mesh(name: &str, mesh: &tobj::Mesh) -> ImportedMesh {
    let vec3s = |flat: &[f32]| -> Vec<[f32; 3]> {
        flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
    };

    let faces = if mesh.face_arities.is_empty() {
        mesh.indices.chunks(3).map(<[u32]>::to_vec).collect()
    } else {
        let mut faces = Vec::with_capacity(mesh.face_arities.len());
        let mut start = 0usize;
        for &arity in &mesh.face_arities {
            let end = (start + arity as usize).min(mesh.indices.len());
            faces.push(mesh.indices[start..end].to_vec());
            start = end;
        }
        faces
    };

    ImportedMesh {
        name: name.to_string(),
        positions: vec3s(&mesh.positions),
        normals: (!mesh.normals.is_empty()).then(|| vec3s(&mesh.normals)),
        tex_coords: (!mesh.texcoords.is_empty())
            .then(|| mesh.texcoords.chunks_exact(2).map(|c| [c[0], c[1]]).collect()),
        colors: (!mesh.vertex_color.is_empty()).then(|| {
            mesh.vertex_color
                .chunks_exact(3)
                .map(|c| [c[0], c[1], c[2], 1.0])
                .collect()
        }),
        tangents: None,
        bitangents: None,
        faces,
        material: mesh.material_id,
    }
}

fn convert_material(material: &tobj::Material) -> ImportedMaterial {
    let mut out = ImportedMaterial::new(material.name.clone());
    out.diffuse_color = material
        .diffuse
        .map(|[r, g, b]| [r, g, b, material.dissolve.unwrap_or(1.0)]);

    let slots = [
        (TextureSlot::Diffuse, &material.diffuse_texture),
        (TextureSlot::Specular, &material.specular_texture),
        (TextureSlot::Ambient, &material.ambient_texture),
        (TextureSlot::Height, &material.normal_texture),
    ];
    for (slot, texture) in slots {
        if let Some(file) = texture.as_deref().and_then(texture_file) {
            out.add_texture(slot, file);
        }
    }
    if let Some(file) = material.unknown_param.get("norm").and_then(|v| texture_file(v)) {
        out.add_texture(TextureSlot::Normals, file);
    }
    if let Some(file) = material.unknown_param.get("map_Ke").and_then(|v| texture_file(v)) {
        out.add_texture(TextureSlot::Emissive, file);
    }
    out
}

/// File name of an MTL texture statement, without options such as `-bm 0.5`.
fn texture_file(statement: &str) -> Option<&str> {
    let statement = statement.trim();
    if statement.is_empty() {
        return None;
    }
    if statement.starts_with('-') {
        statement.split_whitespace().last()
    } else {
        Some(statement)
    }
}
