//! The demo game shared by the desktop and command-line front ends.
//!
//! [`SpiralDemo`] is a [`hearth_kernel::GameLogic`] that works with any
//! display which also hands out a GPU device ([`GpuSurface`]).
//! [`HeadlessSurface`] is such a display backed by a
//! [`hearth_render::HeadlessDevice`], so the whole game runs in tests and in
//! the CLI without a window.

mod headless;
mod spiral;

use hearth_render::GpuDevice;

pub use headless::{HeadlessSurface, RetainedDevice};
pub use spiral::{
    CAMERA_POS_STEP, DemoError, DemoOptions, FRAGMENT_SHADER, LIGHT_STEP, MOUSE_SENSITIVITY,
    SpiralDemo, VERTEX_SHADER, spiral_position,
};

/// A display that owns the GPU device frames are rendered with.
pub trait GpuSurface {
    /// `None` until the surface is initialized, and again after it is
    /// destroyed.
    fn gpu(&mut self) -> Option<&mut dyn GpuDevice>;
}
