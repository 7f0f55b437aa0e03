use std::path::PathBuf;
use std::rc::Rc;

use glam::{Vec2, Vec3};
use hearth_assets::{
    AssetDir, AssetError, BuiltinShaders, ImageLoader, MeshLoader, ShaderSource, primitives,
};
use hearth_common::{Attenuation, Camera, PointLight};
use hearth_input::Key;
use hearth_kernel::{DisplaySurface, GameLogic};
use hearth_render::{
    GpuDevice, Lighting, Material, Mesh, RenderError, RenderStats, Renderer, RendererSettings,
    SceneItem, SceneObject, Texture, Viewport,
};
use serde::{Deserialize, Serialize};

use crate::GpuSurface;

pub const VERTEX_SHADER: &str = "scene.vert.wgsl";
pub const FRAGMENT_SHADER: &str = "scene.frag.wgsl";

/// Camera travel per tick while a movement key is held.
pub const CAMERA_POS_STEP: f32 = 0.1;
/// Degrees of rotation per pixel of mouse motion.
pub const MOUSE_SENSITIVITY: f32 = 0.4;
/// Light travel along z per iteration while N or M is held.
pub const LIGHT_STEP: f32 = 0.1;

const CUBE_SCALE: f32 = 0.1;

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("display has no GPU device")]
    NoDevice,
    #[error("render called before init")]
    NotInitialized,
}

/// What the demo loads and how it draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoOptions {
    /// Directory with `scene.vert.wgsl` and `scene.frag.wgsl`; the built-in
    /// stages are used when unset.
    pub shader_dir: Option<PathBuf>,
    /// Root that `cube_model`, `model` and `texture` are resolved against.
    pub asset_dir: PathBuf,
    /// OBJ used for the spiral; the built-in coloured cube when unset.
    pub cube_model: Option<String>,
    /// Extra OBJ placed at the origin.
    pub model: Option<String>,
    pub model_scale: f32,
    /// Image applied to every mesh.
    pub texture: Option<String>,
    pub cubes: usize,
    pub renderer: RendererSettings,
    pub ambient_light: Vec3,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            shader_dir: None,
            asset_dir: PathBuf::from("."),
            cube_model: None,
            model: None,
            model_scale: 1.5,
            texture: None,
            cubes: 100,
            renderer: RendererSettings::default(),
            ambient_light: Vec3::splat(0.3),
        }
    }
}

/// Position of cube `i` on the spiral.
pub fn spiral_position(i: usize) -> Vec3 {
    let swing = (((i + 100) * 10) as f32).to_radians().sin();
    Vec3::new(swing, 0.2 * i as f32, swing)
}

/// A spiral of small cubes around an optional model, one cube enlarged per
/// tick in turn. WASD/Tab/Space move the camera, dragging with the right
/// mouse button looks around and N/M move the light along z.
pub struct SpiralDemo {
    options: DemoOptions,
    renderer: Option<Renderer>,
    meshes: Vec<Rc<Mesh>>,
    texture: Option<Rc<Texture>>,
    items: Vec<SceneItem>,
    camera: Camera,
    point_light: PointLight,
    camera_inc: Vec3,
    pending_rotation: Vec2,
    tick: usize,
    frames: u64,
    last_stats: RenderStats,
}

impl SpiralDemo {
    pub fn new(options: DemoOptions) -> Self {
        let point_light = PointLight::new(Vec3::ONE, Vec3::new(0.0, 0.0, 1.0), 1.0)
            .with_attenuation(Attenuation::new(0.0, 0.0, 1.0));
        Self {
            options,
            renderer: None,
            meshes: Vec::new(),
            texture: None,
            items: Vec::new(),
            camera: Camera::default(),
            point_light,
            camera_inc: Vec3::ZERO,
            pending_rotation: Vec2::ZERO,
            tick: 0,
            frames: 0,
            last_stats: RenderStats::default(),
        }
    }

    pub fn items(&self) -> &[SceneItem] {
        &self.items
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn point_light(&self) -> &PointLight {
        &self.point_light
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_stats(&self) -> RenderStats {
        self.last_stats
    }

    fn load_scene(&mut self, device: &mut dyn GpuDevice) -> Result<(), DemoError> {
        let assets = AssetDir::new(&self.options.asset_dir);

        let material = match &self.options.texture {
            Some(name) => {
                let image = assets.load_image(name)?;
                let texture = Rc::new(Texture::create(
                    device,
                    image.width,
                    image.height,
                    &image.pixels,
                )?);
                self.texture = Some(Rc::clone(&texture));
                Material::textured(texture, 1.0)
            }
            None => Material {
                reflectance: 1.0,
                ..Material::default()
            },
        };

        let cube_data = match &self.options.cube_model {
            Some(name) => assets.load_mesh(name)?,
            None => primitives::cube(),
        };
        let cube = Rc::new(Mesh::create(device, &cube_data)?.with_material(material.clone()));
        self.meshes.push(Rc::clone(&cube));

        for i in 0..self.options.cubes {
            let mut item = SceneItem::new(Rc::clone(&cube));
            let position = spiral_position(i);
            item.set_position(position.x, position.y, position.z);
            let angle = 3.0 * i as f32;
            item.set_rotation(angle, angle, angle);
            item.set_scale(CUBE_SCALE);
            self.items.push(item);
        }

        if let Some(name) = &self.options.model {
            let data = assets.load_mesh(name)?;
            let mesh = Rc::new(Mesh::create(device, &data)?.with_material(material));
            self.meshes.push(Rc::clone(&mesh));
            let mut item = SceneItem::new(mesh);
            item.set_scale(self.options.model_scale);
            self.items.push(item);
        }

        tracing::info!(
            items = self.items.len(),
            meshes = self.meshes.len(),
            textured = self.texture.is_some(),
            "demo scene loaded"
        );
        Ok(())
    }

    fn release(&mut self, device: &mut dyn GpuDevice) {
        self.items.clear();
        for mesh in self.meshes.drain(..) {
            mesh.cleanup(device);
        }
        if let Some(texture) = self.texture.take() {
            match Rc::try_unwrap(texture) {
                Ok(texture) => texture.cleanup(device),
                Err(shared) => tracing::warn!(id = %shared.id(), "texture still shared at cleanup"),
            }
        }
        if let Some(mut renderer) = self.renderer.take() {
            renderer.cleanup(device);
        }
    }
}

impl<D> GameLogic<D> for SpiralDemo
where
    D: DisplaySurface + GpuSurface,
{
    type Error = DemoError;

    fn init(&mut self, display: &mut D) -> Result<(), DemoError> {
        let (vertex, fragment) = match &self.options.shader_dir {
            Some(dir) => {
                let dir = AssetDir::new(dir);
                (dir.load_source(VERTEX_SHADER)?, dir.load_source(FRAGMENT_SHADER)?)
            }
            None => (
                BuiltinShaders.load_source(VERTEX_SHADER)?,
                BuiltinShaders.load_source(FRAGMENT_SHADER)?,
            ),
        };

        let device = display.gpu().ok_or(DemoError::NoDevice)?;
        self.renderer = Some(Renderer::init(
            device,
            &vertex,
            &fragment,
            self.options.renderer,
        )?);
        self.load_scene(device)
    }

    fn input(&mut self, display: &mut D) {
        let axis = |negative: Key, positive: Key| {
            if display.is_key_pressed(negative) {
                -1.0
            } else if display.is_key_pressed(positive) {
                1.0
            } else {
                0.0
            }
        };
        self.camera_inc = Vec3::new(
            axis(Key::A, Key::D),
            axis(Key::Tab, Key::Space),
            axis(Key::W, Key::S),
        );

        if display.is_key_pressed(Key::N) {
            self.point_light.position.z += LIGHT_STEP;
        } else if display.is_key_pressed(Key::M) {
            self.point_light.position.z -= LIGHT_STEP;
        }

        let displacement = display.take_mouse_displacement();
        if display.mouse().right_pressed {
            self.pending_rotation += displacement;
        }
    }

    fn update(&mut self, _interval: f32) {
        self.camera.move_position(self.camera_inc * CAMERA_POS_STEP);

        // Mouse motion is consumed by the first tick of the iteration. The
        // view applies the inverse rotation, so dragging right yaws right
        // only when the displacement is subtracted.
        let rotation = std::mem::take(&mut self.pending_rotation) * MOUSE_SENSITIVITY;
        if rotation != Vec2::ZERO {
            self.camera.move_rotation((-rotation).extend(0.0));
        }

        for (index, item) in self.items.iter_mut().enumerate() {
            if index == self.tick {
                item.set_scale(item.scale() * 10.0);
            } else {
                item.set_scale(CUBE_SCALE);
            }
        }
        if self.tick > self.items.len() {
            self.tick = 0;
        }
        self.tick += 1;
    }

    fn render(&mut self, display: &mut D) -> Result<(), DemoError> {
        let (width, height) = display.size();
        let resized = display.take_resized();
        let lighting = Lighting {
            ambient: self.options.ambient_light,
            point_light: self.point_light,
        };
        let renderer = self.renderer.as_mut().ok_or(DemoError::NotInitialized)?;
        let device = display.gpu().ok_or(DemoError::NoDevice)?;
        self.last_stats = renderer.render(
            device,
            Viewport {
                width,
                height,
                resized,
            },
            &self.camera,
            &self.items,
            &lighting,
        )?;
        self.frames += 1;
        tracing::trace!(
            frame = self.frames,
            draw_calls = self.last_stats.draw_calls,
            "frame rendered"
        );
        Ok(())
    }

    fn cleanup(&mut self, display: &mut D) {
        match display.gpu() {
            Some(device) => self.release(device),
            None => {
                if self.renderer.is_some() || !self.meshes.is_empty() {
                    tracing::warn!("no GPU device at cleanup, GPU resources leak");
                }
            }
        }
        tracing::info!(frames = self.frames, "demo cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessSurface;
    use hearth_render::UniformValue;
    use hearth_render::transform::view_matrix;

    fn started(options: DemoOptions) -> (SpiralDemo, HeadlessSurface) {
        let mut surface = HeadlessSurface::new(320, 240);
        surface.init().unwrap();
        let mut demo = SpiralDemo::new(options);
        demo.init(&mut surface).unwrap();
        (demo, surface)
    }

    #[test]
    fn spiral_layout() {
        let (demo, _surface) = started(DemoOptions::default());
        assert_eq!(demo.items().len(), 100);
        let fifth = &demo.items()[5];
        assert!((fifth.position() - spiral_position(5)).length() < 1e-6);
        assert_eq!(fifth.rotation(), Vec3::splat(15.0));
        assert_eq!(fifth.scale(), 0.1);
        assert!((spiral_position(0).x - 1000f32.to_radians().sin()).abs() < 1e-6);
        assert!((spiral_position(10).y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn one_cube_is_enlarged_per_tick() {
        let (mut demo, _surface) = started(DemoOptions::default());
        GameLogic::<HeadlessSurface>::update(&mut demo, 1.0 / 30.0);
        assert!((demo.items()[0].scale() - 1.0).abs() < 1e-6);
        GameLogic::<HeadlessSurface>::update(&mut demo, 1.0 / 30.0);
        assert_eq!(demo.items()[0].scale(), 0.1);
        assert!((demo.items()[1].scale() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tick_wraps_past_the_last_item() {
        let options = DemoOptions {
            cubes: 2,
            ..DemoOptions::default()
        };
        let (mut demo, _surface) = started(options);
        for _ in 0..4 {
            GameLogic::<HeadlessSurface>::update(&mut demo, 1.0 / 30.0);
        }
        // Ticks 0, 1, 2 (none), then 3 > 2 wrapped back to 0 and counted to 1.
        assert_eq!(demo.tick, 1);
        assert!(demo.items().iter().all(|item| item.scale() == 0.1));
    }

    #[test]
    fn keys_move_camera_and_light() {
        let (mut demo, mut surface) = started(DemoOptions::default());
        surface.press(Key::W);
        surface.press(Key::D);
        surface.press(Key::N);
        demo.input(&mut surface);
        GameLogic::<HeadlessSurface>::update(&mut demo, 1.0 / 30.0);
        GameLogic::<HeadlessSurface>::update(&mut demo, 1.0 / 30.0);

        let position = demo.camera().position;
        assert!((position - Vec3::new(0.2, 0.0, -0.2)).length() < 1e-5);
        assert!((demo.point_light().position.z - 1.1).abs() < 1e-6);
    }

    #[test]
    fn right_drag_rotates_once_per_iteration() {
        let (mut demo, mut surface) = started(DemoOptions::default());
        surface.mouse_mut().right_pressed = true;
        surface.mouse_mut().moved_by(10.0, 5.0);
        demo.input(&mut surface);
        GameLogic::<HeadlessSurface>::update(&mut demo, 1.0 / 30.0);
        GameLogic::<HeadlessSurface>::update(&mut demo, 1.0 / 30.0);
        assert!((demo.camera().rotation - Vec3::new(-2.0, -4.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn camera_turns_towards_the_drag() {
        let right_of_centre = Vec3::new(1.0, 0.0, -5.0);
        let below_centre = Vec3::new(0.0, -1.0, -5.0);

        let (mut demo, mut surface) = started(DemoOptions::default());
        surface.mouse_mut().right_pressed = true;
        surface.mouse_mut().moved_by(10.0, 0.0);
        demo.input(&mut surface);
        GameLogic::<HeadlessSurface>::update(&mut demo, 1.0 / 30.0);
        let seen = view_matrix(demo.camera()).transform_point3(right_of_centre);
        assert!(seen.x.abs() < right_of_centre.x, "drag right moved x to {}", seen.x);

        let (mut demo, mut surface) = started(DemoOptions::default());
        surface.mouse_mut().right_pressed = true;
        surface.mouse_mut().moved_by(0.0, 10.0);
        demo.input(&mut surface);
        GameLogic::<HeadlessSurface>::update(&mut demo, 1.0 / 30.0);
        let seen = view_matrix(demo.camera()).transform_point3(below_centre);
        assert!(seen.y.abs() < below_centre.y.abs(), "drag down moved y to {}", seen.y);
    }

    #[test]
    fn mouse_motion_without_right_button_is_discarded() {
        let (mut demo, mut surface) = started(DemoOptions::default());
        surface.mouse_mut().moved_by(10.0, 5.0);
        demo.input(&mut surface);
        GameLogic::<HeadlessSurface>::update(&mut demo, 1.0 / 30.0);
        assert_eq!(demo.camera().rotation, Vec3::ZERO);
        assert_eq!(surface.mouse().displacement, Vec2::ZERO);
    }

    #[test]
    fn render_uploads_the_ambient_light() {
        let (mut demo, mut surface) = started(DemoOptions::default());
        demo.render(&mut surface).unwrap();
        assert_eq!(demo.last_stats().draw_calls, 100);
        assert_eq!(
            surface.device().uploads_to("ambientLight"),
            vec![UniformValue::Vec3(Vec3::splat(0.3))]
        );
    }

    #[test]
    fn cleanup_releases_every_handle() {
        let (mut demo, mut surface) = started(DemoOptions::default());
        demo.render(&mut surface).unwrap();
        demo.cleanup(&mut surface);
        assert_eq!(surface.device().live_handles(), 0);
        assert!(demo.items().is_empty());
    }

    #[test]
    fn textured_model_shares_one_texture() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tri.obj"),
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1 2/2 3/3\n",
        )
        .unwrap();
        image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]))
            .save(dir.path().join("red.png"))
            .unwrap();

        let options = DemoOptions {
            asset_dir: dir.path().to_path_buf(),
            model: Some("tri.obj".into()),
            texture: Some("red.png".into()),
            cubes: 3,
            ..DemoOptions::default()
        };
        let (mut demo, mut surface) = started(options);
        assert_eq!(demo.items().len(), 4);
        assert_eq!(surface.device().live_textures(), 1);
        assert_eq!(demo.items()[3].scale(), 1.5);

        demo.cleanup(&mut surface);
        assert_eq!(surface.device().live_handles(), 0);
    }

    #[test]
    fn missing_model_fails_init_and_cleanup_still_releases() {
        let dir = tempfile::tempdir().unwrap();
        let options = DemoOptions {
            asset_dir: dir.path().to_path_buf(),
            model: Some("bunny.obj".into()),
            ..DemoOptions::default()
        };
        let mut surface = HeadlessSurface::new(320, 240);
        surface.init().unwrap();
        let mut demo = SpiralDemo::new(options);
        assert!(matches!(
            demo.init(&mut surface),
            Err(DemoError::Asset(AssetError::NotFound(_)))
        ));
        demo.cleanup(&mut surface);
        assert_eq!(surface.device().live_handles(), 0);
    }

    #[test]
    fn render_before_init_is_an_error() {
        let mut surface = HeadlessSurface::new(320, 240);
        surface.init().unwrap();
        let mut demo = SpiralDemo::new(DemoOptions::default());
        assert!(matches!(
            demo.render(&mut surface),
            Err(DemoError::NotInitialized)
        ));
    }
}
