//! Model, view and projection matrices.
//!
//! All angles stored on scene values are degrees; conversion to radians
//! happens here. Matrices are column-major `glam::Mat4` in a right-handed,
//! GL-style clip space (depth in `[-1, 1]`).

use glam::{Mat4, Vec3};
use hearth_common::{Camera, PointLight};

use crate::scene::SceneObject;

/// `T · Rx · Ry · Rz · S` for a position, an Euler rotation in degrees and a
/// uniform scale.
pub fn world_matrix(position: Vec3, rotation_deg: Vec3, scale: f32) -> Mat4 {
    Mat4::from_translation(position)
        * Mat4::from_rotation_x(rotation_deg.x.to_radians())
        * Mat4::from_rotation_y(rotation_deg.y.to_radians())
        * Mat4::from_rotation_z(rotation_deg.z.to_radians())
        * Mat4::from_scale(Vec3::splat(scale))
}

/// Placement of the camera in the world: `T · Ry(yaw) · Rx(pitch) · Rz(roll)`.
pub fn camera_world_matrix(camera: &Camera) -> Mat4 {
    let r = camera.rotation;
    Mat4::from_translation(camera.position)
        * Mat4::from_rotation_y(r.y.to_radians())
        * Mat4::from_rotation_x(r.x.to_radians())
        * Mat4::from_rotation_z(r.z.to_radians())
}

/// World to camera space; the exact inverse of [`camera_world_matrix`].
pub fn view_matrix(camera: &Camera) -> Mat4 {
    let r = camera.rotation;
    Mat4::from_rotation_z(-r.z.to_radians())
        * Mat4::from_rotation_x(-r.x.to_radians())
        * Mat4::from_rotation_y(-r.y.to_radians())
        * Mat4::from_translation(-camera.position)
}

pub fn model_view_matrix(item: &dyn SceneObject, view: &Mat4) -> Mat4 {
    *view * world_matrix(item.position(), item.rotation(), item.scale())
}

/// Right-handed perspective projection. A zero height is treated as one
/// pixel so a minimised surface never produces a non-finite aspect ratio.
pub fn projection_matrix(fov_rad: f32, width: u32, height: u32, z_near: f32, z_far: f32) -> Mat4 {
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    Mat4::perspective_rh_gl(fov_rad, aspect, z_near, z_far)
}

/// A copy of `light` with its position moved into camera space.
pub fn view_space_light(light: &PointLight, view: &Mat4) -> PointLight {
    PointLight {
        position: view.transform_point3(light.position),
        ..*light
    }
}

/// Per-renderer matrix cache. The projection only changes on resize; the
/// view matrix is recomputed from the camera every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transformation {
    projection: Mat4,
    view: Mat4,
}

impl Default for Transformation {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformation {
    pub fn new() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        }
    }

    pub fn update_projection(
        &mut self,
        fov_rad: f32,
        width: u32,
        height: u32,
        z_near: f32,
        z_far: f32,
    ) -> Mat4 {
        self.projection = projection_matrix(fov_rad, width, height, z_near, z_far);
        self.projection
    }

    pub fn update_view(&mut self, camera: &Camera) -> Mat4 {
        self.view = view_matrix(camera);
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::GpuDevice;
    use crate::error::RenderError;
    use crate::material::Material;
    use crate::mesh::Drawable;
    use glam::Vec4;

    const EPS: f32 = 1e-4;

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        assert!(a.abs_diff_eq(b, EPS), "{a:?}\n!=\n{b:?}");
    }

    #[test]
    fn identity_transform() {
        assert_mat_eq(world_matrix(Vec3::ZERO, Vec3::ZERO, 1.0), Mat4::IDENTITY);
        assert_mat_eq(view_matrix(&Camera::default()), Mat4::IDENTITY);
    }

    #[test]
    fn world_matrix_applies_scale_then_rotation_then_translation() {
        let m = world_matrix(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, 90.0), 2.0);
        // (1,0,0) scaled to (2,0,0), rotated 90° about z to (0,2,0), then moved.
        let p = m.transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 4.0, 3.0), EPS), "{p}");
    }

    #[test]
    fn view_is_inverse_of_camera_placement() {
        let cameras = [
            Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO),
            Camera::new(Vec3::new(-3.0, 2.0, 1.5), Vec3::new(30.0, -45.0, 10.0)),
            Camera::new(Vec3::new(10.0, -4.0, 0.0), Vec3::new(-80.0, 170.0, 0.0)),
        ];
        for camera in cameras {
            let product = view_matrix(&camera) * camera_world_matrix(&camera);
            assert_mat_eq(product, Mat4::IDENTITY);
        }
    }

    #[test]
    fn camera_origin_maps_to_view_origin() {
        let camera = Camera::new(Vec3::new(4.0, 5.0, 6.0), Vec3::new(20.0, 75.0, 0.0));
        let p = view_matrix(&camera).transform_point3(camera.position);
        assert!(p.abs_diff_eq(Vec3::ZERO, EPS));
    }

    #[test]
    fn unit_cube_round_trips_through_view_space() {
        let camera = Camera::new(Vec3::new(1.0, 2.0, 8.0), Vec3::new(15.0, -30.0, 5.0));
        let view = view_matrix(&camera);
        let inverse_view = camera_world_matrix(&camera);
        let corners = [
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ];
        for scale in [0.1, 1.0, 3.5] {
            for rotation in [Vec3::ZERO, Vec3::new(10.0, 20.0, 30.0), Vec3::splat(270.0)] {
                let world = world_matrix(Vec3::new(2.0, -1.0, 0.5), rotation, scale);
                let model_view = view * world;
                for corner in corners {
                    let expected = world.transform_point3(corner);
                    let recovered =
                        inverse_view.transform_point3(model_view.transform_point3(corner));
                    assert!(recovered.abs_diff_eq(expected, EPS), "{recovered} vs {expected}");
                }
            }
        }
    }

    struct Placed {
        position: Vec3,
        rotation: Vec3,
        scale: f32,
    }

    impl Drawable for Placed {
        fn draw(&self, _device: &mut dyn GpuDevice) -> Result<(), RenderError> {
            Ok(())
        }
    }

    impl SceneObject for Placed {
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
            self
        }
        fn material(&self) -> Option<Material> {
            None
        }
    }

    #[test]
    fn model_view_is_view_times_world() {
        let items = [
            Placed {
                position: Vec3::ZERO,
                rotation: Vec3::ZERO,
                scale: 1.0,
            },
            Placed {
                position: Vec3::new(0.5, 2.0, 0.5),
                rotation: Vec3::splat(30.0),
                scale: 0.1,
            },
            Placed {
                position: Vec3::new(-7.0, 0.25, -3.0),
                rotation: Vec3::new(90.0, -45.0, 200.0),
                scale: 1.5,
            },
        ];
        let cameras = [
            Camera::default(),
            Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(-10.0, 20.0, 0.0)),
            Camera::new(Vec3::new(3.0, -2.0, 1.0), Vec3::new(45.0, 170.0, 5.0)),
        ];
        for camera in &cameras {
            let view = view_matrix(camera);
            for item in &items {
                let world = world_matrix(item.position, item.rotation, item.scale);
                assert_eq!(model_view_matrix(item, &view), view * world);
            }
        }
    }

    #[test]
    fn projection_clamps_zero_height() {
        let m = projection_matrix(60f32.to_radians(), 800, 0, 0.01, 1000.0);
        assert!(m.is_finite());
        assert_mat_eq(m, projection_matrix(60f32.to_radians(), 800, 1, 0.01, 1000.0));
    }

    #[test]
    fn projection_maps_near_and_far_planes() {
        let m = projection_matrix(60f32.to_radians(), 1280, 720, 0.01, 1000.0);
        let near = m * Vec4::new(0.0, 0.0, -0.01, 1.0);
        let far = m * Vec4::new(0.0, 0.0, -1000.0, 1.0);
        assert!((near.z / near.w + 1.0).abs() < 1e-3);
        assert!((far.z / far.w - 1.0).abs() < 1e-3);
    }

    #[test]
    fn view_space_light_leaves_original_untouched() {
        let light = PointLight::new(Vec3::ONE, Vec3::new(0.0, 0.0, 1.0), 1.0);
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let moved = view_space_light(&light, &view_matrix(&camera));
        assert!(moved.position.abs_diff_eq(Vec3::new(0.0, 0.0, -4.0), EPS));
        assert_eq!(light.position, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(moved.color, light.color);
        assert_eq!(moved.attenuation, light.attenuation);
    }

    #[test]
    fn transformation_caches_projection() {
        let mut t = Transformation::new();
        let p = t.update_projection(1.0, 640, 480, 0.1, 100.0);
        t.update_view(&Camera::new(Vec3::X, Vec3::ZERO));
        assert_eq!(t.projection(), p);
        assert!(t.view().abs_diff_eq(Mat4::from_translation(-Vec3::X), EPS));
    }
}
