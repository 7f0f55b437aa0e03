use std::cell::Cell;

use crate::device::{GpuDevice, TextureId};
use crate::error::RenderError;

/// An RGBA8 texture on the GPU.
///
/// Shared between meshes through `Rc<Texture>`; whoever drops the last
/// reference calls [`cleanup`](Self::cleanup). Dropping an unreleased texture
/// only logs a warning since release needs the device.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    released: Cell<bool>,
}

impl Texture {
    /// Upload `rgba` (`width * height * 4` bytes).
    pub fn create(
        device: &mut dyn GpuDevice,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<Self, RenderError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 {
            return Err(RenderError::resource(format!(
                "texture size {width}x{height} is empty"
            )));
        }
        if rgba.len() != expected {
            return Err(RenderError::resource(format!(
                "{width}x{height} texture needs {expected} bytes of RGBA, got {}",
                rgba.len()
            )));
        }
        let id = device
            .create_texture(width, height, rgba)
            .map_err(|e| RenderError::resource(format!("texture upload failed: {e}")))?;
        tracing::debug!(%id, width, height, "texture created");
        Ok(Self {
            id,
            width,
            height,
            released: Cell::new(false),
        })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_released(&self) -> bool {
        self.released.get()
    }

    /// Release the GPU texture. Safe to call more than once.
    pub fn cleanup(&self, device: &mut dyn GpuDevice) {
        if self.released.replace(true) {
            return;
        }
        match device.delete_texture(self.id) {
            Ok(()) => tracing::debug!(id = %self.id, "texture released"),
            Err(err) => tracing::warn!(id = %self.id, error = %err, "texture release failed"),
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if !self.released.get() {
            tracing::warn!(id = %self.id, "texture dropped without cleanup; GPU memory leaked");
        }
    }
}
