//! Vertex layout and GPU-drawable meshes.

use std::path::Path;

use bytemuck::{Pod, Zeroable};

use crate::error::{AssetError, AssetResult};
use crate::gpu::{GpuDevice, GpuMeshId, ShaderProgram};
use crate::resources::{TextureCache, TextureId};
use crate::scene::{ImportedMesh, ImportedScene, TextureSlot};
use crate::texture::TextureRole;

/// Imported positions are divided by this. Models in the asset set are
/// authored at twice the viewer's unit scale.
pub const POSITION_SCALE_DIVISOR: f32 = 2.0;

/// Material slots read for every mesh and the role each one is bound as,
/// in binding order. Height maps carry normals in the asset set.
pub const MATERIAL_ROLES: [(TextureSlot, TextureRole); 4] = [
    (TextureSlot::Diffuse, TextureRole::Diffuse),
    (TextureSlot::Specular, TextureRole::Specular),
    (TextureSlot::Height, TextureRole::Normal),
    (TextureSlot::Ambient, TextureRole::Height),
];

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// GPU vertex. Attribute locations 0..=5 in field order, tightly packed.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
    pub tex_coords: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

/// One shader-visible vertex attribute (`f32` components).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub offset: u64,
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    pub const ATTRIBUTES: [VertexAttribute; 6] = [
        VertexAttribute {
            location: 0,
            components: 3,
            offset: std::mem::offset_of!(Vertex, position) as u64,
        },
        VertexAttribute {
            location: 1,
            components: 3,
            offset: std::mem::offset_of!(Vertex, normal) as u64,
        },
        VertexAttribute {
            location: 2,
            components: 4,
            offset: std::mem::offset_of!(Vertex, color) as u64,
        },
        VertexAttribute {
            location: 3,
            components: 2,
            offset: std::mem::offset_of!(Vertex, tex_coords) as u64,
        },
        VertexAttribute {
            location: 4,
            components: 3,
            offset: std::mem::offset_of!(Vertex, tangent) as u64,
        },
        VertexAttribute {
            location: 5,
            components: 3,
            offset: std::mem::offset_of!(Vertex, bitangent) as u64,
        },
    ];
}

/// Indexed triangle list with tightly-packed vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Every index addresses a vertex and the indices form whole triangles.
    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            ));
        }
        let count = self.vertices.len();
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= count) {
            return Err(format!("index {bad} out of range for {count} vertices"));
        }
        Ok(())
    }
}

/// A mesh ready to be drawn: geometry, texture references and, once
/// [`setup`](Mesh::setup) ran, its GPU buffers.
#[derive(Debug)]
pub struct Mesh {
    data: MeshData,
    textures: Vec<TextureId>,
    gpu: Option<GpuMeshId>,
}

impl Mesh {
    /// Wrap generated geometry that has no material.
    pub fn from_data(data: MeshData) -> Self {
        Self {
            data,
            textures: Vec::new(),
            gpu: None,
        }
    }

    /// Convert one imported sub-mesh. Texture references are resolved against
    /// `relative_to` (the model file) and go through the shared cache.
    pub fn load(
        scene: &ImportedScene,
        sub_mesh: &ImportedMesh,
        relative_to: Option<&Path>,
        textures: &mut TextureCache,
        gpu: &mut dyn GpuDevice,
    ) -> AssetResult<Self> {
        let material = scene.material_of(sub_mesh);
        let material_color = material.and_then(|m| m.diffuse_color);

        let vertices: Vec<Vertex> = (0..sub_mesh.vertex_count())
            .map(|i| {
                let [x, y, z] = sub_mesh.positions[i];
                let pick3 = |channel: &Option<Vec<[f32; 3]>>| {
                    channel
                        .as_ref()
                        .and_then(|values| values.get(i).copied())
                        .unwrap_or_default()
                };
                Vertex {
                    position: [
                        x / POSITION_SCALE_DIVISOR,
                        y / POSITION_SCALE_DIVISOR,
                        z / POSITION_SCALE_DIVISOR,
                    ],
                    normal: pick3(&sub_mesh.normals),
                    color: material_color
                        .or_else(|| sub_mesh.colors.as_ref().and_then(|c| c.get(i).copied()))
                        .unwrap_or(WHITE),
                    tex_coords: sub_mesh
                        .tex_coords
                        .as_ref()
                        .and_then(|uvs| uvs.get(i).copied())
                        .unwrap_or_default(),
                    tangent: pick3(&sub_mesh.tangents),
                    bitangent: pick3(&sub_mesh.bitangents),
                }
            })
            .collect();

        let indices: Vec<u32> = sub_mesh.faces.iter().flatten().copied().collect();

        let data = MeshData::new(vertices, indices);
        data.validate().map_err(|reason| AssetError::InvalidMesh {
            path: relative_to.unwrap_or(Path::new("")).to_path_buf(),
            name: sub_mesh.name.clone(),
            reason,
        })?;

        let mut texture_ids = Vec::new();
        if let Some(material) = material {
            for (slot, role) in MATERIAL_ROLES {
                let ids = textures.load_textures(material, slot, role, relative_to, gpu)?;
                texture_ids.extend(ids);
            }
        }

        log::debug!(
            "Mesh '{}': {} vertices, {} triangles, {} textures",
            sub_mesh.name,
            data.vertices.len(),
            data.triangle_count(),
            texture_ids.len()
        );

        Ok(Self {
            data,
            textures: texture_ids,
            gpu: None,
        })
    }

    /// Upload vertex and index buffers. Runs at most once per mesh; later calls
    /// return the existing handle.
    pub fn setup(&mut self, gpu: &mut dyn GpuDevice) -> AssetResult<GpuMeshId> {
        if let Some(id) = self.gpu {
            return Ok(id);
        }
        let id = gpu.upload_mesh(&self.data.vertices, &self.data.indices)?;
        self.gpu = Some(id);
        Ok(id)
    }

    /// Free the GPU buffers, if any.
    pub fn release(&mut self, gpu: &mut dyn GpuDevice) {
        if let Some(id) = self.gpu.take() {
            gpu.release_mesh(id);
        }
    }

    /// Bind textures to consecutive units from 0, set `<role><n>` samplers,
    /// draw, and leave unit 0 active.
    pub fn draw(&self, textures: &TextureCache, program: &mut dyn ShaderProgram) {
        let Some(buffers) = self.gpu else {
            return;
        };

        let mut ordinals = [0u32; TextureRole::ALL.len()];
        for (unit, id) in self.textures.iter().enumerate() {
            let Some(texture) = textures.get(*id) else {
                continue;
            };
            let unit = unit as u32;
            let role = texture.role();
            let ordinal = &mut ordinals[role.index()];
            *ordinal += 1;

            program.active_texture(unit);
            program.set_sampler(&format!("{}{}", role.uniform_prefix(), ordinal), unit);
            program.bind_texture(texture.handle());
        }

        program.draw_indexed(buffers, self.data.indices.len() as u32);
        program.active_texture(0);
    }

    pub fn data(&self) -> &MeshData {
        &self.data
    }

    pub fn textures(&self) -> &[TextureId] {
        &self.textures
    }

    pub fn gpu_handle(&self) -> Option<GpuMeshId> {
        self.gpu
    }
}
