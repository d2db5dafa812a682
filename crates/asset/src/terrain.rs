//! Procedural height field drawn under the model.

use std::f32::consts::TAU;

use glam::Vec3;

use crate::mesh::{MeshData, Vertex};

/// Distance between neighbouring grid vertices.
pub const DEFAULT_SPACING: f32 = 0.1;

/// Largest grid whose `(size + 1)²` vertices are addressable by `u32` indices.
pub const MAX_SIZE: u32 = u16::MAX as u32 - 1;

const NORMAL_EPSILON: f32 = 1e-4;

/// `2 cos²(r)` of the distance to the origin, repeating after one full turn.
pub fn height(x: f32, z: f32) -> f32 {
    let mut r = (x * x + z * z).sqrt();
    if r > TAU {
        r -= TAU;
    }
    2.0 * r.cos().powi(2)
}

/// Surface normal from forward differences of [`height`].
pub fn normal(x: f32, z: f32) -> Vec3 {
    let h = height(x, z);
    let dx = (height(x + NORMAL_EPSILON, z) - h) / NORMAL_EPSILON;
    let dz = (height(x, z + NORMAL_EPSILON) - h) / NORMAL_EPSILON;
    Vec3::new(-dx, 1.0, -dz).normalize()
}

fn color(h: f32) -> [f32; 4] {
    let c = (5.0 * h).sin() * 0.5 + 0.5;
    [c, 1.0 - c, 1.0, 1.0]
}

/// `size` limited to [`MAX_SIZE`].
pub fn clamp_size(size: u32) -> u32 {
    if size > MAX_SIZE {
        log::warn!("Terrain size {size} too large, using {MAX_SIZE}");
        return MAX_SIZE;
    }
    size
}

/// A `size x size` cell grid (`(size + 1)²` vertices) centred on the origin,
/// Y up, two triangles per cell. `size` is clamped to [`MAX_SIZE`].
pub fn generate(size: u32, spacing: f32) -> MeshData {
    let size = clamp_size(size);
    let side = size + 1;
    let half = size as f32 * spacing / 2.0;

    let mut vertices = Vec::with_capacity(side as usize * side as usize);
    for row in 0..side {
        for col in 0..side {
            let x = col as f32 * spacing - half;
            let z = row as f32 * spacing - half;
            let h = height(x, z);
            vertices.push(Vertex {
                position: [x, h, z],
                normal: normal(x, z).to_array(),
                color: color(h),
                tex_coords: [col as f32 / size.max(1) as f32, row as f32 / size.max(1) as f32],
                ..Vertex::default()
            });
        }
    }

    let mut indices = Vec::with_capacity(size as usize * size as usize * 6);
    for row in 0..size {
        for col in 0..size {
            let top_left = row * side + col;
            let bottom_left = top_left + side;
            indices.extend_from_slice(&[
                top_left,
                bottom_left,
                top_left + 1,
                top_left + 1,
                bottom_left,
                bottom_left + 1,
            ]);
        }
    }

    log::debug!(
        "Generated terrain: {} vertices, {} triangles",
        vertices.len(),
        indices.len() / 3
    );
    MeshData::new(vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_shape() {
        let data = generate(4, DEFAULT_SPACING);
        assert_eq!(data.vertices.len(), 25);
        assert_eq!(data.triangle_count(), 32);
        data.validate().unwrap();

        let first = data.vertices[0].position;
        let last = data.vertices[24].position;
        assert!((first[0] + 0.2).abs() < 1e-6 && (first[2] + 0.2).abs() < 1e-6);
        assert!((last[0] - 0.2).abs() < 1e-6 && (last[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn height_peaks_at_origin_and_wraps() {
        assert!((height(0.0, 0.0) - 2.0).abs() < 1e-6);
        assert!(height(std::f32::consts::FRAC_PI_2, 0.0).abs() < 1e-6);
        assert!((height(TAU + 0.5, 0.0) - height(0.5, 0.0)).abs() < 1e-4);
    }

    #[test]
    fn normals_face_up() {
        for vertex in generate(8, 0.5).vertices {
            let n = Vec3::from(vertex.normal);
            assert!((n.length() - 1.0).abs() < 1e-4);
            assert!(n.y > 0.0);
        }
    }

    #[test]
    fn color_channels_are_complementary() {
        for vertex in generate(3, 1.0).vertices {
            let [r, g, b, a] = vertex.color;
            assert!((r + g - 1.0).abs() < 1e-6);
            assert_eq!((b, a), (1.0, 1.0));
        }
    }

    #[test]
    fn oversized_grids_are_clamped() {
        assert_eq!(clamp_size(64), 64);
        assert_eq!(clamp_size(MAX_SIZE), MAX_SIZE);
        assert_eq!(clamp_size(u32::MAX), MAX_SIZE);
        // last vertex index of the largest grid still fits
        let side = u64::from(MAX_SIZE) + 1;
        assert!(side * side - 1 <= u64::from(u32::MAX));
    }

    #[test]
    fn empty_grid_is_a_single_vertex() {
        let data = generate(0, DEFAULT_SPACING);
        assert_eq!(data.vertices.len(), 1);
        assert!(data.indices.is_empty());
    }
}
