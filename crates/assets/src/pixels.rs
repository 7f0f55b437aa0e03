use std::path::Path;

use crate::AssetError;

/// Decoded RGBA8 pixels, row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// A single-colour image.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat(width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }
}

pub(crate) fn load_image_file(path: &Path) -> Result<ImageData, AssetError> {
    let decoded = image::open(path)?.to_rgba8();
    let (width, height) = decoded.dimensions();
    tracing::debug!(path = %path.display(), width, height, "image decoded");
    Ok(ImageData {
        width,
        height,
        pixels: decoded.into_raw(),
    })
}
