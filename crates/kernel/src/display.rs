use glam::Vec2;
use hearth_input::{Key, KeyboardState, MouseState};

/// Errors raised by a display surface.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("failed to create display surface: {0}")]
    Creation(String),
    #[error("display backend error: {0}")]
    Backend(String),
}

/// The window/surface the engine presents into.
///
/// Creation, event polling and input translation live behind this trait so
/// the loop never depends on a particular windowing library. All methods
/// are called from the loop thread.
pub trait DisplaySurface {
    /// Create the underlying window/surface.
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Tear the surface down. Called once when the loop exits, whether or
    /// not [`init`](Self::init) succeeded.
    fn destroy(&mut self);

    /// True once the user (or game logic) asked to close.
    fn should_close(&self) -> bool;

    fn request_close(&mut self);

    /// Current drawable size in pixels.
    fn size(&self) -> (u32, u32);

    /// Whether the surface was resized since the last call; clears the flag.
    fn take_resized(&mut self) -> bool;

    /// Present the rendered frame. With vsync enabled this is where the loop
    /// waits for the display.
    fn swap_buffers(&mut self);

    /// Process pending window events and refresh the input snapshots.
    fn poll_events(&mut self);

    fn keyboard(&self) -> &KeyboardState;

    fn mouse(&self) -> &MouseState;

    /// Mouse motion since the previous call; resets the accumulator.
    fn take_mouse_displacement(&mut self) -> Vec2;

    fn is_key_pressed(&self, key: Key) -> bool {
        self.keyboard().is_pressed(key)
    }
}
