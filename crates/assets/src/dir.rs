use std::path::{Path, PathBuf};

use hearth_render::MeshData;

use crate::pixels::ImageData;
use crate::{AssetError, ImageLoader, MeshLoader, ShaderSource, obj, pixels};

/// Assets under one root directory; names are paths relative to it.
#[derive(Debug, Clone)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, AssetError> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }
        Ok(path)
    }
}

impl ShaderSource for AssetDir {
    fn load_source(&self, name: &str) -> Result<String, AssetError> {
        let path = self.resolve(name)?;
        let source = std::fs::read_to_string(&path)?;
        tracing::debug!(path = %path.display(), bytes = source.len(), "shader source loaded");
        Ok(source)
    }
}

impl MeshLoader for AssetDir {
    fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError> {
        let path = self.resolve(name)?;
        obj::load_obj_file(&path)
    }
}

impl ImageLoader for AssetDir {
    fn load_image(&self, name: &str) -> Result<ImageData, AssetError> {
        let path = self.resolve(name)?;
        pixels::load_image_file(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetDir::new(dir.path());
        assert!(matches!(
            assets.load_source("scene.vert.wgsl"),
            Err(AssetError::NotFound(_))
        ));
        assert!(matches!(
            assets.load_mesh("cube.obj"),
            Err(AssetError::NotFound(_))
        ));
        assert!(matches!(
            assets.load_image("grass.png"),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn reads_shader_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("flat.frag"), "void main() {}").unwrap();
        let assets = AssetDir::new(dir.path());
        assert_eq!(assets.load_source("flat.frag").unwrap(), "void main() {}");
    }
}
