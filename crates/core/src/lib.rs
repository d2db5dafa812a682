//! Core types: math re-exports, Camera, fly-camera controls.

pub use glam::{Mat4, Vec3, vec3};

pub mod camera;
pub mod controls;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_pv_is_finite() {
        let cam = camera::Camera::new_perspective(
            vec3(0.0, 0.0, 4.0),
            vec3(0.0, 0.0, 0.0),
            Vec3::Y,
            45f32.to_radians(),
            0.01,
            150.0,
            16.0 / 9.0,
        );
        let pv = cam.proj_view();
        let a = pv.to_cols_array();
        assert!(a.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn zero_aspect_does_not_produce_nan() {
        let cam = camera::Camera::new_perspective(
            Vec3::ZERO,
            Vec3::NEG_Z,
            Vec3::Y,
            1.0,
            0.1,
            10.0,
            0.0,
        );
        assert!(cam.proj().to_cols_array().iter().all(|f| f.is_finite()));
    }
}
