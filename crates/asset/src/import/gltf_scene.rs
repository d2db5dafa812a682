//! glTF 2.0 (`.gltf` / `.glb`) via the `gltf` crate.
//!
//! Only buffers are loaded here. Images stay references and are decoded by the
//! texture cache like any other texture file, so embedded images (data URIs,
//! buffer views) are skipped.

use std::path::Path;

use ::gltf::image::Source;
use ::gltf::mesh::Mode;

use crate::error::{AssetError, AssetResult};
use crate::scene::{ImportedMaterial, ImportedMesh, ImportedScene, SceneNode, TextureSlot};

use super::SceneImporter;

#[derive(Clone, Copy, Debug, Default)]
pub struct GltfImporter;

impl SceneImporter for GltfImporter {
    fn import(&self, path: &Path) -> AssetResult<ImportedScene> {
        let fail = |reason: String| AssetError::SceneImport {
            path: path.to_path_buf(),
            reason,
        };

        let ::gltf::Gltf { document, blob } =
            ::gltf::Gltf::open(path).map_err(|e| fail(e.to_string()))?;
        let buffers = ::gltf::import_buffers(&document, path.parent(), blob)
            .map_err(|e| fail(e.to_string()))?;

        let mut scene = ImportedScene {
            materials: document.materials().map(convert_material).collect(),
            ..ImportedScene::default()
        };

        // glTF mesh index -> our sub-mesh indices (one per primitive)
        let mut primitives_of: Vec<Vec<usize>> = Vec::with_capacity(document.meshes().len());
        for mesh in document.meshes() {
            let mut subs = Vec::new();
            for primitive in mesh.primitives() {
                let name = format!(
                    "{}#{}",
                    mesh.name().unwrap_or("mesh"),
                    primitive.index()
                );
                if primitive.mode() != Mode::Triangles {
                    log::warn!(
                        "{}: skipping primitive {} with mode {:?}",
                        path.display(),
                        name,
                        primitive.mode()
                    );
                    continue;
                }
                let Some(converted) = convert_primitive(name, &primitive, &buffers).map_err(&fail)?
                else {
                    log::warn!("{}: primitive without positions skipped", path.display());
                    continue;
                };
                subs.push(scene.meshes.len());
                scene.meshes.push(converted);
            }
            primitives_of.push(subs);
        }

        let gltf_scene = document
            .default_scene()
            .or_else(|| document.scenes().next());
        scene.root = gltf_scene.map(|s| SceneNode {
            name: s.name().unwrap_or_default().to_string(),
            meshes: Vec::new(),
            children: s.nodes().map(|n| convert_node(&n, &primitives_of)).collect(),
        });
        scene.incomplete = scene.meshes.is_empty();

        log::debug!(
            "glTF {}: {} sub-meshes, {} materials",
            path.display(),
            scene.meshes.len(),
            scene.materials.len()
        );
        Ok(scene)
    }
}

fn convert_node(node: &::gltf::Node<'_>, primitives_of: &[Vec<usize>]) -> SceneNode {
    SceneNode {
        name: node.name().unwrap_or_default().to_string(),
        meshes: node
            .mesh()
            .and_then(|m| primitives_of.get(m.index()).cloned())
            .unwrap_or_default(),
        children: node
            .children()
            .map(|child| convert_node(&child, primitives_of))
            .collect(),
    }
}

/// `Ok(None)` for primitives without positions. Attribute arrays whose length
/// differs from the position count are an error.
fn convert_primitive(
    name: String,
    primitive: &::gltf::Primitive<'_>,
    buffers: &[::gltf::buffer::Data],
) -> Result<Option<ImportedMesh>, String> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));

    let Some(positions) = reader.read_positions() else {
        return Ok(None);
    };
    let positions: Vec<[f32; 3]> = positions.collect();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
    // glTF puts the UV origin top-left; scenes use bottom-left
    let tex_coords: Option<Vec<[f32; 2]>> = reader
        .read_tex_coords(0)
        .map(|uvs| uvs.into_f32().map(|[u, v]| [u, 1.0 - v]).collect());
    let colors: Option<Vec<[f32; 4]>> = reader
        .read_colors(0)
        .map(|colors| colors.into_rgba_f32().collect());
    let tangents: Option<Vec<[f32; 4]>> = reader.read_tangents().map(Iterator::collect);

    let count = positions.len();
    check_count(&name, "NORMAL", normals.as_ref().map(Vec::len), count)?;
    check_count(&name, "TEXCOORD_0", tex_coords.as_ref().map(Vec::len), count)?;
    check_count(&name, "COLOR_0", colors.as_ref().map(Vec::len), count)?;
    check_count(&name, "TANGENT", tangents.as_ref().map(Vec::len), count)?;

    let (tangents, bitangents) = match (tangents, normals.as_ref()) {
        (Some(tangents), Some(normals)) => {
            let bitangents = tangents
                .iter()
                .zip(normals)
                .map(|(t, n)| {
                    let t3 = glam::Vec3::new(t[0], t[1], t[2]);
                    (glam::Vec3::from(*n).cross(t3) * t[3]).to_array()
                })
                .collect();
            let tangents = tangents.iter().map(|t| [t[0], t[1], t[2]]).collect();
            (Some(tangents), Some(bitangents))
        }
        _ => (None, None),
    };

    let indices: Vec<u32> = reader
        .read_indices()
        .map(|indices| indices.into_u32().collect())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());

    Ok(Some(ImportedMesh {
        name,
        positions,
        normals,
        tex_coords,
        colors,
        tangents,
        bitangents,
        faces: indices.chunks_exact(3).map(<[u32]>::to_vec).collect(),
        material: primitive.material().index(),
    }))
}

fn check_count(
    mesh: &str,
    attribute: &str,
    len: Option<usize>,
    expected: usize,
) -> Result<(), String> {
    match len {
        Some(len) if len != expected => Err(format!(
            "primitive {mesh}: {attribute} has {len} entries but POSITION has {expected}"
        )),
        _ => Ok(()),
    }
}

fn convert_material(material: ::gltf::Material<'_>) -> ImportedMaterial {
    let pbr = material.pbr_metallic_roughness();
    let mut out = ImportedMaterial::new(material.name().unwrap_or_default());
    out.diffuse_color = Some(pbr.base_color_factor());

    if let Some(file) = pbr.base_color_texture().and_then(|info| image_uri(info.texture())) {
        out.add_texture(TextureSlot::Diffuse, file);
    }
    if let Some(file) = material.normal_texture().and_then(|n| image_uri(n.texture())) {
        out.add_texture(TextureSlot::Height, file);
    }
    if let Some(file) = material.emissive_texture().and_then(|e| image_uri(e.texture())) {
        out.add_texture(TextureSlot::Emissive, file);
    }
    out
}

fn image_uri(texture: ::gltf::Texture<'_>) -> Option<String> {
    match texture.source().source() {
        Source::Uri { uri, .. } if !uri.starts_with("data:") => Some(percent_decode(uri)),
        _ => {
            log::warn!(
                "Embedded image {} is not supported, texture skipped",
                texture.source().index()
            );
            None
        }
    }
}

/// Decode `%XX` escapes of a relative URI; malformed escapes are kept verbatim.
fn percent_decode(uri: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(uri.as_bytes())).into_owned()
}
