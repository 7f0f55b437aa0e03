//! Scene rendering on top of a bind-then-draw GPU device.
//!
//! The [`GpuDevice`] trait is the only way this crate reaches the GPU; the
//! wgpu implementation lives in `hearth-render-wgpu`, and [`HeadlessDevice`]
//! records commands for tests and headless runs.
//!
//! # Invariants
//! - Whatever is bound during an operation is unbound before it returns,
//!   also on error (bind guards).
//! - Uniform locations are resolved once, right after linking, and served
//!   from a per-program cache afterwards.
//! - A GPU handle is released at most once; shared textures are released by
//!   their last owner.
//! - The renderer never mutates the camera or the canonical light.

pub mod device;
mod error;
pub mod headless;
pub mod material;
pub mod mesh;
pub mod renderer;
pub mod scene;
pub mod shader;
pub mod texture;
pub mod transform;

pub use device::{
    BufferId, BufferKind, GpuDevice, GpuError, ProgramId, ShaderId, ShaderStage, TextureId,
    UniformLocation, UniformValue, VertexArrayId, VertexAttribute, VertexLayout,
};
pub use error::RenderError;
pub use headless::{DeviceCommand, HeadlessDevice};
pub use material::{LightUniforms, Material, UniformSource};
pub use mesh::{Drawable, Mesh, MeshData, Secondary};
pub use renderer::{Lighting, RenderStats, Renderer, RendererSettings, Viewport};
pub use scene::{SceneItem, SceneObject};
pub use shader::{BoundProgram, ProgramState, ShaderProgram};
pub use texture::Texture;
pub use transform::Transformation;
