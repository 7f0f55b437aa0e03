//! Loaders that turn files into the raw data the renderer consumes.
//!
//! Everything here is a collaborator of the render core: loaders return
//! plain data ([`MeshData`], [`ImageData`], shader text) and never touch the
//! GPU.

mod dir;
mod obj;
mod pixels;
pub mod primitives;
mod shaders;

use hearth_render::MeshData;

pub use dir::AssetDir;
pub use obj::mesh_data_from_obj;
pub use pixels::ImageData;
pub use shaders::{BuiltinShaders, SCENE_FRAGMENT, SCENE_VERTEX};

/// Errors from reading or decoding an asset.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("malformed asset {name}: {reason}")]
    Malformed { name: String, reason: String },
}

/// Source text of a shader stage, looked up by name.
pub trait ShaderSource {
    fn load_source(&self, name: &str) -> Result<String, AssetError>;
}

/// Triangle meshes, looked up by name.
pub trait MeshLoader {
    fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError>;
}

/// RGBA8 images, looked up by name.
pub trait ImageLoader {
    fn load_image(&self, name: &str) -> Result<ImageData, AssetError>;
}
