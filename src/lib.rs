//! Audio-reactive mesh-warp preset renderer.

pub mod app;
pub mod audio;
pub mod builtin;
pub mod capability;
pub mod capture;
pub mod config;
pub mod crossfade;
pub mod eqn;
pub mod preset;
pub mod render;
pub mod scheduler;
pub mod term;
pub mod visualizer;
