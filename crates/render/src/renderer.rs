use glam::{Vec3, Vec4};
use hearth_common::{Camera, PointLight};
use serde::{Deserialize, Serialize};

use crate::device::{GpuDevice, ShaderStage, UniformValue};
use crate::error::RenderError;
use crate::material::Material;
use crate::scene::SceneObject;
use crate::shader::ShaderProgram;
use crate::transform::{self, Transformation};

pub const PROJECTION_MATRIX: &str = "projectionMatrix";
pub const MODEL_VIEW_MATRIX: &str = "modelViewMatrix";
pub const TEXTURE_SAMPLER: &str = "texture_sampler";
pub const AMBIENT_LIGHT: &str = "ambientLight";
pub const SPECULAR_POWER: &str = "specularPower";
pub const MATERIAL: &str = "material";
pub const POINT_LIGHT: &str = "pointLight";

/// Projection and shading constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub specular_power: f32,
    pub clear_color: Vec4,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            z_near: 0.01,
            z_far: 1000.0,
            specular_power: 10.0,
            clear_color: Vec4::ZERO,
        }
    }
}

/// Scene-wide light state for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient: Vec3,
    /// In world space; the renderer uploads a camera-space copy.
    pub point_light: PointLight,
}

/// Drawable area for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    /// Whether the surface changed size since the previous frame.
    pub resized: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub uniform_uploads: u32,
}

/// Draws scene objects with one lighting program.
pub struct Renderer {
    program: ShaderProgram,
    transformation: Transformation,
    settings: RendererSettings,
    viewport: Option<(u32, u32)>,
}

impl Renderer {
    /// Build the scene program from its two stages and resolve every uniform
    /// the frame uploads.
    pub fn init(
        device: &mut dyn GpuDevice,
        vertex_source: &str,
        fragment_source: &str,
        settings: RendererSettings,
    ) -> Result<Self, RenderError> {
        let mut program = ShaderProgram::new(device)?;
        if let Err(err) = build_program(&mut program, device, vertex_source, fragment_source) {
            program.cleanup(device);
            return Err(err);
        }
        tracing::info!(backend = device.backend(), "renderer ready");
        Ok(Self {
            program,
            transformation: Transformation::new(),
            settings,
            viewport: None,
        })
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    /// Draw `items` in order as seen from `camera`.
    ///
    /// Nothing stays bound afterwards. If a draw or upload fails the frame
    /// is abandoned without being submitted.
    pub fn render<S: SceneObject>(
        &mut self,
        device: &mut dyn GpuDevice,
        viewport: Viewport,
        camera: &Camera,
        items: &[S],
        lighting: &Lighting,
    ) -> Result<RenderStats, RenderError> {
        device.clear(self.settings.clear_color)?;

        let size = (viewport.width, viewport.height);
        if viewport.resized || self.viewport != Some(size) {
            device.set_viewport(viewport.width, viewport.height);
            self.transformation.update_projection(
                self.settings.fov_degrees.to_radians(),
                viewport.width,
                viewport.height,
                self.settings.z_near,
                self.settings.z_far,
            );
            self.viewport = Some(size);
            tracing::debug!(width = size.0, height = size.1, "projection updated");
        }

        let view = self.transformation.update_view(camera);
        let light = transform::view_space_light(&lighting.point_light, &view);
        let default_material = Material::default();
        let mut stats = RenderStats::default();

        let mut bound = self.program.bind(device)?;
        bound.set_uniform(
            PROJECTION_MATRIX,
            UniformValue::Mat4(self.transformation.projection()),
        )?;
        bound.set_uniform(TEXTURE_SAMPLER, UniformValue::Int(0))?;
        bound.set_uniform(AMBIENT_LIGHT, UniformValue::Vec3(lighting.ambient))?;
        bound.set_uniform(
            SPECULAR_POWER,
            UniformValue::Float(self.settings.specular_power),
        )?;
        bound.set_point_light(POINT_LIGHT, &light)?;

        for item in items {
            let model_view = transform::model_view_matrix(item, &view);
            bound.set_uniform(MODEL_VIEW_MATRIX, UniformValue::Mat4(model_view))?;
            match item.material() {
                Some(material) => bound.set_material(MATERIAL, &material)?,
                None => bound.set_material(MATERIAL, &default_material)?,
            }
            item.drawable().draw(bound.device())?;
            stats.draw_calls += 1;
        }
        stats.uniform_uploads = bound.uploads();
        drop(bound);

        device.finish_frame()?;
        Ok(stats)
    }

    pub fn cleanup(&mut self, device: &mut dyn GpuDevice) {
        self.program.cleanup(device);
    }
}

fn build_program(
    program: &mut ShaderProgram,
    device: &mut dyn GpuDevice,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<(), RenderError> {
    program.compile(device, ShaderStage::Vertex, vertex_source)?;
    program.compile(device, ShaderStage::Fragment, fragment_source)?;
    program.link(device)?;

    for name in [
        PROJECTION_MATRIX,
        MODEL_VIEW_MATRIX,
        TEXTURE_SAMPLER,
        AMBIENT_LIGHT,
        SPECULAR_POWER,
    ] {
        program.create_uniform(device, name)?;
    }
    program.create_material_uniform(device, MATERIAL)?;
    program.create_point_light_uniform(device, POINT_LIGHT)?;
    Ok(())
}
