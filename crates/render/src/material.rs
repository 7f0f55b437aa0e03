use std::rc::Rc;

use glam::Vec4;
use hearth_common::PointLight;

use crate::device::UniformValue;
use crate::texture::Texture;

/// Something that uploads as a uniform struct.
///
/// `uniforms` lists member names relative to the struct, e.g. `ambient` or
/// `att.linear`; the caller supplies the prefix (`material`, `pointLight`).
pub trait UniformSource {
    fn uniforms(&self) -> Vec<(&'static str, UniformValue)>;
}

/// Surface reflectance used by the lighting shader.
#[derive(Debug, Clone)]
pub struct Material {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub reflectance: f32,
    /// Shared with every other material and mesh using the same image.
    pub texture: Option<Rc<Texture>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec4::ONE,
            diffuse: Vec4::ONE,
            specular: Vec4::ONE,
            reflectance: 0.0,
            texture: None,
        }
    }
}

impl Material {
    /// Same colour for all three terms.
    pub fn from_color(color: Vec4, reflectance: f32) -> Self {
        Self {
            ambient: color,
            diffuse: color,
            specular: color,
            reflectance,
            texture: None,
        }
    }

    pub fn textured(texture: Rc<Texture>, reflectance: f32) -> Self {
        Self {
            reflectance,
            texture: Some(texture),
            ..Self::default()
        }
    }

    pub fn is_textured(&self) -> bool {
        self.texture.is_some()
    }
}

impl UniformSource for Material {
    fn uniforms(&self) -> Vec<(&'static str, UniformValue)> {
        vec![
            ("ambient", UniformValue::Vec4(self.ambient)),
            ("diffuse", UniformValue::Vec4(self.diffuse)),
            ("specular", UniformValue::Vec4(self.specular)),
            ("hasTexture", UniformValue::Int(i32::from(self.is_textured()))),
            ("reflectance", UniformValue::Float(self.reflectance)),
        ]
    }
}

/// Uniform view of a point light. Wraps the view-space copy built each frame.
#[derive(Debug, Clone, Copy)]
pub struct LightUniforms<'a>(pub &'a PointLight);

impl UniformSource for LightUniforms<'_> {
    fn uniforms(&self) -> Vec<(&'static str, UniformValue)> {
        let light = self.0;
        vec![
            ("color", UniformValue::Vec3(light.color)),
            ("position", UniformValue::Vec3(light.position)),
            ("intensity", UniformValue::Float(light.intensity)),
            ("att.constant", UniformValue::Float(light.attenuation.constant)),
            ("att.linear", UniformValue::Float(light.attenuation.linear)),
            ("att.exponent", UniformValue::Float(light.attenuation.exponent)),
        ]
    }
}
