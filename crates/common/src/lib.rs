//! Scene value types shared by the kernel, the renderer and game logic.
//!
//! Everything here is plain CPU-side state. GPU resources live in
//! `hearth-render`; nothing in this crate touches a device.

pub mod types;

pub use types::{Attenuation, Camera, PointLight};
