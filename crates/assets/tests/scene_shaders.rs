use hearth_assets::{BuiltinShaders, ShaderSource, primitives};
use hearth_render::{HeadlessDevice, Mesh, Renderer, RendererSettings};

#[test]
fn builtin_shaders_declare_every_renderer_uniform() {
    let mut device = HeadlessDevice::new();
    let vertex = BuiltinShaders.load_source("scene.vert.wgsl").unwrap();
    let fragment = BuiltinShaders.load_source("scene.frag.wgsl").unwrap();

    let mut renderer = Renderer::init(&mut device, &vertex, &fragment, RendererSettings::default())
        .unwrap_or_else(|e| panic!("renderer init failed: {e}"));
    renderer.cleanup(&mut device);
    assert_eq!(device.live_handles(), 0);
}

#[test]
fn cube_uploads_to_the_device() {
    let mut device = HeadlessDevice::new();
    let mesh = Mesh::create(&mut device, &primitives::cube()).unwrap();
    assert_eq!(mesh.vertex_count(), 8);
    assert_eq!(mesh.index_count(), 36);
    mesh.cleanup(&mut device);
}
