//! wgpu backend for `hearth-render`.
//!
//! [`WgpuDevice`] implements the bind-then-draw [`hearth_render::GpuDevice`]
//! contract on top of wgpu by recording each frame's draws and replaying
//! them in one render pass at `finish_frame`.
//!
//! # Invariants
//! - Stage sources are WGSL with entry points `vs_main` and `fs_main` and a
//!   single `var<uniform>` struct at group 0, binding 0. Both stages of a
//!   program must declare the same struct.
//! - Clip-space depth arrives GL-style and is remapped in the vertex stage.
//! - Uniform values are captured at draw time; later uploads never affect an
//!   already recorded draw.

mod device;
pub mod layout;
mod streams;

pub use device::{FRAGMENT_ENTRY, VERTEX_ENTRY, WgpuDevice};
pub use layout::{LayoutError, UniformBlock, reflect};
