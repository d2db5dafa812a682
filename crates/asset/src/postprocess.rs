//! Mesh fix-ups applied to every imported scene before it becomes GPU data.

use glam::{Vec2, Vec3};

use crate::scene::{ImportedMesh, ImportedScene};

/// Which post-process steps to run. They always run in field order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostProcess {
    /// Split polygons into triangle fans; drop points and lines.
    pub triangulate: bool,
    /// Area-weighted vertex normals for meshes that have none.
    pub gen_smooth_normals: bool,
    /// `v -> 1 - v` on texture channel 0.
    pub flip_uvs: bool,
    /// Per-vertex tangent/bitangent from UVs, for meshes that have none.
    pub calc_tangent_space: bool,
}

impl PostProcess {
    /// The fixed pipeline used for every model the viewer loads.
    pub const VIEWER: Self = Self {
        triangulate: true,
        gen_smooth_normals: true,
        flip_uvs: true,
        calc_tangent_space: true,
    };

    pub const NONE: Self = Self {
        triangulate: false,
        gen_smooth_normals: false,
        flip_uvs: false,
        calc_tangent_space: false,
    };
}

pub fn apply(scene: &mut ImportedScene, steps: PostProcess) {
    for mesh in &mut scene.meshes {
        if steps.triangulate {
            triangulate(mesh);
        }
        if steps.gen_smooth_normals && mesh.normals.is_none() {
            generate_smooth_normals(mesh);
        }
        if steps.flip_uvs {
            flip_uvs(mesh);
        }
        if steps.calc_tangent_space && mesh.tangents.is_none() {
            calc_tangent_space(mesh);
        }
    }
}

pub fn triangulate(mesh: &mut ImportedMesh) {
    if mesh.faces.iter().all(|f| f.len() == 3) {
        return;
    }

    let mut dropped = 0usize;
    let mut triangles = Vec::with_capacity(mesh.faces.len());
    for face in mesh.faces.drain(..) {
        match face.len() {
            0..=2 => dropped += 1,
            3 => triangles.push(face),
            _ => {
                for i in 1..face.len() - 1 {
                    triangles.push(vec![face[0], face[i], face[i + 1]]);
                }
            }
        }
    }
    if dropped > 0 {
        log::debug!(
            "Mesh '{}': dropped {} point/line primitives",
            mesh.name,
            dropped
        );
    }
    mesh.faces = triangles;
}

fn position(mesh: &ImportedMesh, index: u32) -> Option<Vec3> {
    mesh.positions.get(index as usize).map(|&p| Vec3::from(p))
}

pub fn generate_smooth_normals(mesh: &mut ImportedMesh) {
    let mut normals = vec![Vec3::ZERO; mesh.vertex_count()];

    for face in mesh.faces.iter().filter(|f| f.len() == 3) {
        let (Some(a), Some(b), Some(c)) = (
            position(mesh, face[0]),
            position(mesh, face[1]),
            position(mesh, face[2]),
        ) else {
            continue;
        };
        // unnormalized: magnitude is twice the triangle area
        let n = (b - a).cross(c - a);
        for &i in face {
            normals[i as usize] += n;
        }
    }

    mesh.normals = Some(
        normals
            .into_iter()
            .map(|n| n.normalize_or_zero().to_array())
            .collect(),
    );
}

pub fn flip_uvs(mesh: &mut ImportedMesh) {
    if let Some(uvs) = mesh.tex_coords.as_mut() {
        for uv in uvs {
            uv[1] = 1.0 - uv[1];
        }
    }
}

pub fn calc_tangent_space(mesh: &mut ImportedMesh) {
    let (Some(uvs), Some(normals)) = (mesh.tex_coords.as_ref(), mesh.normals.as_ref()) else {
        return;
    };

    let count = mesh.vertex_count();
    let mut tangents = vec![Vec3::ZERO; count];
    let mut bitangents = vec![Vec3::ZERO; count];

    // channels shorter than the positions only cover their own prefix
    let covered = count.min(uvs.len()).min(normals.len());
    for face in mesh.faces.iter().filter(|f| f.len() == 3) {
        let [i0, i1, i2] = [face[0] as usize, face[1] as usize, face[2] as usize];
        if i0.max(i1).max(i2) >= covered {
            continue;
        }
        let p0 = Vec3::from(mesh.positions[i0]);
        let e1 = Vec3::from(mesh.positions[i1]) - p0;
        let e2 = Vec3::from(mesh.positions[i2]) - p0;

        let uv0 = Vec2::from(uvs[i0]);
        let d1 = Vec2::from(uvs[i1]) - uv0;
        let d2 = Vec2::from(uvs[i2]) - uv0;

        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < 1e-12 {
            continue;
        }
        let r = 1.0 / det;
        let t = (e1 * d2.y - e2 * d1.y) * r;
        let b = (e2 * d1.x - e1 * d2.x) * r;
        for i in [i0, i1, i2] {
            tangents[i] += t;
            bitangents[i] += b;
        }
    }

    let mut out_t = Vec::with_capacity(count);
    let mut out_b = Vec::with_capacity(count);
    for ((t, b), n) in tangents.into_iter().zip(bitangents).zip(normals) {
        let n = Vec3::from(*n);
        // Gram-Schmidt against the normal
        let t = (t - n * n.dot(t)).normalize_or_zero();
        let b = b.normalize_or_zero();
        out_t.push(t.to_array());
        out_b.push(b.to_array());
    }
    mesh.tangents = Some(out_t);
    mesh.bitangents = Some(out_b);
}
