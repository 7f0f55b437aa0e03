//! Engine kernel: wall-clock timing, fixed-timestep simulation stepping and
//! the loop that drives a [`GameLogic`] against a [`DisplaySurface`].
//!
//! # Invariants
//! - Simulation advances only in whole fixed ticks; rendering happens exactly
//!   once per loop iteration regardless of how many ticks ran.
//! - Game-logic cleanup runs exactly once on every exit path.
//! - Everything runs on the thread that called [`GameEngine::run`].

pub mod config;
pub mod display;
pub mod engine;
pub mod step;
pub mod timer;

pub use config::{ConfigError, EngineConfig};
pub use display::{DisplayError, DisplaySurface};
pub use engine::{EngineError, GameEngine, GameLogic, LoopStats};
pub use step::FixedTimestep;
pub use timer::{DeltaSource, Timer};
