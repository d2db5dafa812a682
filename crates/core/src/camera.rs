use crate::{Mat4, Vec3};

/// Simple perspective camera (right-handed, depth in [0, 1]).
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub aspect: f32,
}

impl Camera {
    #[allow(clippy::too_many_arguments)]
    pub fn new_perspective(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y_rad: f32,
        z_near: f32,
        z_far: f32,
        aspect: f32,
    ) -> Self {
        Self {
            eye,
            target,
            up,
            fov_y_rad,
            z_near,
            z_far,
            aspect,
        }
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// glam's `perspective_rh` already maps depth to [0, 1], which is what wgpu expects.
    #[inline]
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    #[inline]
    pub fn proj_view(&self) -> Mat4 {
        self.proj() * self.view()
    }

    #[inline]
    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }
}

/// Degrees of rotation per pixel of mouse motion.
pub const MOUSE_SENSITIVITY: f32 = 0.1;
/// Pitch stays strictly inside (-90°, 90°) so `look_at` never degenerates.
pub const PITCH_LIMIT_DEG: f32 = 89.0;

/// Free-flying first-person camera driven by mouse look and movement keys.
///
/// Yaw/pitch are kept in degrees; world up is +Y.
#[derive(Clone, Copy, Debug)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
    /// Units per second.
    pub walk_speed: f32,
    /// Units per second while the run modifier is held.
    pub run_speed: f32,
    pub sensitivity: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            yaw_deg: -90.0,
            pitch_deg: 0.0,
            fov_y_deg: 45.0,
            z_near: 0.01,
            z_far: 150.0,
            walk_speed: 1.5,
            run_speed: 8.0,
            sensitivity: MOUSE_SENSITIVITY,
        }
    }
}

impl FlyCamera {
    /// Unit view direction derived from yaw and pitch.
    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw_deg.to_radians(), self.pitch_deg.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }

    /// Apply a raw mouse delta in pixels. Positive `dy` (mouse moved down) looks down.
    pub fn look(&mut self, dx: f32, dy: f32) {
        self.yaw_deg += dx * self.sensitivity;
        self.pitch_deg = (self.pitch_deg - dy * self.sensitivity)
            .clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
    }

    /// Move according to the held keys for `dt` seconds.
    pub fn advance(&mut self, keys: &crate::controls::MoveKeys, dt: f32) {
        let front = self.front();
        let right = self.right();

        let mut direction = Vec3::ZERO;
        if keys.forward {
            direction += front;
        }
        if keys.backward {
            direction -= front;
        }
        if keys.right {
            direction += right;
        }
        if keys.left {
            direction -= right;
        }
        if keys.up {
            direction += Vec3::Y;
        }
        if keys.down {
            direction -= Vec3::Y;
        }

        if direction.length_squared() < 1e-6 {
            return;
        }
        let speed = if keys.run { self.run_speed } else { self.walk_speed };
        self.position += direction.normalize() * speed * dt;
    }

    /// Snapshot as a perspective [`Camera`] for the given aspect ratio.
    pub fn camera(&self, aspect: f32) -> Camera {
        Camera::new_perspective(
            self.position,
            self.position + self.front(),
            Vec3::Y,
            self.fov_y_deg.to_radians(),
            self.z_near,
            self.z_far,
            aspect,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{MoveKey, MoveKeys};

    #[test]
    fn default_camera_looks_down_negative_z() {
        let cam = FlyCamera::default();
        let f = cam.front();
        assert!(f.x.abs() < 1e-5);
        assert!(f.y.abs() < 1e-5);
        assert!((f.z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = FlyCamera::default();
        cam.look(0.0, -100_000.0);
        assert_eq!(cam.pitch_deg, PITCH_LIMIT_DEG);
        cam.look(0.0, 100_000.0);
        assert_eq!(cam.pitch_deg, -PITCH_LIMIT_DEG);
    }

    #[test]
    fn run_modifier_uses_run_speed() {
        let mut keys = MoveKeys::default();
        keys.set(MoveKey::Forward, true);

        let mut walker = FlyCamera::default();
        walker.advance(&keys, 1.0);
        let walked = (walker.position - FlyCamera::default().position).length();
        assert!((walked - walker.walk_speed).abs() < 1e-4);

        keys.set(MoveKey::Run, true);
        let mut runner = FlyCamera::default();
        runner.advance(&keys, 1.0);
        let ran = (runner.position - FlyCamera::default().position).length();
        assert!((ran - runner.run_speed).abs() < 1e-4);
    }

    #[test]
    fn opposite_keys_cancel_out() {
        let mut keys = MoveKeys::default();
        keys.set(MoveKey::Left, true);
        keys.set(MoveKey::Right, true);
        let mut cam = FlyCamera::default();
        cam.advance(&keys, 1.0);
        assert_eq!(cam.position, FlyCamera::default().position);
    }
}
