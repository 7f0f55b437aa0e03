use std::rc::Rc;

use glam::Vec3;

use crate::material::Material;
use crate::mesh::{Drawable, Mesh};

/// What the renderer needs from one placed object.
pub trait SceneObject {
    fn position(&self) -> Vec3;
    /// Euler rotation in degrees.
    fn rotation(&self) -> Vec3;
    fn scale(&self) -> f32;
    fn drawable(&self) -> &dyn Drawable;
    /// `None` draws with the default material.
    fn material(&self) -> Option<Material>;
}

/// A mesh placed in the world. Many items may share one mesh.
#[derive(Debug, Clone)]
pub struct SceneItem {
    mesh: Rc<Mesh>,
    position: Vec3,
    rotation: Vec3,
    scale: f32,
}

impl SceneItem {
    pub fn new(mesh: Rc<Mesh>) -> Self {
        Self {
            mesh,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: 1.0,
        }
    }

    pub fn mesh(&self) -> &Rc<Mesh> {
        &self.mesh
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = Vec3::new(x, y, z);
    }

    /// Degrees about x, y and z.
    pub fn set_rotation(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Vec3::new(x, y, z);
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }
}

impl SceneObject for SceneItem {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Vec3 {
        self.rotation
    }

    fn scale(&self) -> f32 {
        self.scale
    }

    fn drawable(&self) -> &dyn Drawable {
        self.mesh.as_ref()
    }

    fn material(&self) -> Option<Material> {
        Some(self.mesh.material())
    }
}
