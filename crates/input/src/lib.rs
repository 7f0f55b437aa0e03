//! Input snapshots consumed by game logic.
//!
//! # Invariants
//! - Game logic sees logical [`Key`] ids, never platform key codes.
//! - A snapshot is read-only for the duration of one `input` call.

pub mod key;
pub mod state;

pub use key::Key;
pub use state::{KeyboardState, MouseState};
