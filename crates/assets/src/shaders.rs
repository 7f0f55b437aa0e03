use crate::{AssetError, ShaderSource};

/// Lit scene vertex stage (WGSL).
pub const SCENE_VERTEX: &str = include_str!("../shaders/scene.vert.wgsl");
/// Lit scene fragment stage (WGSL).
pub const SCENE_FRAGMENT: &str = include_str!("../shaders/scene.frag.wgsl");

/// Shader sources compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinShaders;

impl ShaderSource for BuiltinShaders {
    fn load_source(&self, name: &str) -> Result<String, AssetError> {
        match name {
            "scene.vert.wgsl" => Ok(SCENE_VERTEX.to_owned()),
            "scene.frag.wgsl" => Ok(SCENE_FRAGMENT.to_owned()),
            other => Err(AssetError::NotFound(format!("builtin shader {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_stages_share_the_uniform_block() {
        let block = |src: &str| {
            let start = src.find("struct Uniforms").unwrap();
            let end = start + src[start..].find('}').unwrap();
            src[start..end].to_owned()
        };
        assert_eq!(block(SCENE_VERTEX), block(SCENE_FRAGMENT));
    }

    #[test]
    fn unknown_builtin_is_not_found() {
        assert!(BuiltinShaders.load_source("scene.vert.wgsl").is_ok());
        assert!(matches!(
            BuiltinShaders.load_source("sky.wgsl"),
            Err(AssetError::NotFound(_))
        ));
    }
}
