use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// First-person camera: a position and an Euler rotation in degrees.
///
/// `rotation.x` is pitch, `rotation.y` is yaw, `rotation.z` is roll. The
/// camera is mutated by game logic each tick; the renderer only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl Camera {
    pub fn new(position: Vec3, rotation: Vec3) -> Self {
        Self { position, rotation }
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = Vec3::new(x, y, z);
    }

    /// Move relative to the camera's heading.
    ///
    /// `offset.x` strafes right, `offset.y` moves straight up and
    /// `offset.z` moves backwards (negative z walks forward). Pitch does not
    /// affect movement, so looking down and walking forward stays level.
    pub fn move_position(&mut self, offset: Vec3) {
        let heading = Mat3::from_rotation_y(self.rotation.y.to_radians());
        let planar = heading * Vec3::new(offset.x, 0.0, offset.z);
        self.position += planar + Vec3::new(0.0, offset.y, 0.0);
    }

    pub fn set_rotation(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Vec3::new(x, y, z);
    }

    /// Add to the rotation, in degrees.
    pub fn move_rotation(&mut self, offset: Vec3) {
        self.rotation += offset;
    }
}

/// Constant/linear/exponential distance falloff of a point light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub exponent: f32,
}

impl Attenuation {
    pub fn new(constant: f32, linear: f32, exponent: f32) -> Self {
        Self {
            constant,
            linear,
            exponent,
        }
    }

    /// Light intensity factor at `distance`: `1 / (c + l*d + e*d²)`.
    pub fn factor(&self, distance: f32) -> f32 {
        1.0 / (self.constant + self.linear * distance + self.exponent * distance * distance)
    }
}

impl Default for Attenuation {
    /// No falloff.
    fn default() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }
}

/// A point light in world space.
///
/// The renderer uploads a view-space copy every frame; this value stays the
/// canonical world-space light and is only changed by game logic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub color: Vec3,
    pub position: Vec3,
    pub intensity: f32,
    pub attenuation: Attenuation,
}

impl PointLight {
    pub fn new(color: Vec3, position: Vec3, intensity: f32) -> Self {
        Self {
            color,
            position,
            intensity,
            attenuation: Attenuation::default(),
        }
    }

    pub fn with_attenuation(mut self, attenuation: Attenuation) -> Self {
        self.attenuation = attenuation;
        self
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self::new(Vec3::ONE, Vec3::ZERO, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_default_is_origin() {
        let cam = Camera::default();
        assert_eq!(cam.position, Vec3::ZERO);
        assert_eq!(cam.rotation, Vec3::ZERO);
    }

    #[test]
    fn camera_moves_forward_along_negative_z_without_yaw() {
        let mut cam = Camera::default();
        cam.move_position(Vec3::new(0.0, 0.0, -1.0));
        assert!(cam.position.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-6));
    }

    #[test]
    fn camera_movement_follows_yaw() {
        let mut cam = Camera::default();
        cam.set_rotation(0.0, 90.0, 0.0);
        // Yawed 90° left, forward is now -x.
        cam.move_position(Vec3::new(0.0, 0.0, -1.0));
        assert!(cam.position.abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn camera_vertical_movement_ignores_heading() {
        let mut cam = Camera::default();
        cam.set_rotation(45.0, 30.0, 0.0);
        cam.move_position(Vec3::new(0.0, 2.0, 0.0));
        assert!(cam.position.abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn camera_rotation_accumulates() {
        let mut cam = Camera::default();
        cam.move_rotation(Vec3::new(1.0, 2.0, 0.0));
        cam.move_rotation(Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(cam.rotation, Vec3::new(2.0, 4.0, 0.0));
    }

    #[test]
    fn attenuation_default_has_no_falloff() {
        let att = Attenuation::default();
        assert_eq!(att.factor(0.0), 1.0);
        assert_eq!(att.factor(100.0), 1.0);
    }

    #[test]
    fn attenuation_exponent_falloff() {
        let att = Attenuation::new(0.0, 0.0, 1.0);
        assert!((att.factor(2.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn point_light_builder_sets_attenuation() {
        let light = PointLight::new(Vec3::ONE, Vec3::new(0.0, 0.0, 1.0), 1.0)
            .with_attenuation(Attenuation::new(0.0, 0.0, 1.0));
        assert_eq!(light.attenuation.exponent, 1.0);
        assert_eq!(light.position.z, 1.0);
    }
}
