//! OpenGL compositor device for canvas layers, built on glium.
//!
//! Use [`GliumDevice`] and [`GliumEffect`] when the host composites with
//! OpenGL. Create the device while the host's context is current; every
//! later call assumes the same context is still current.
//!
//! ### Warning
//!
//! This module makes assumptions about the OpenGL context inside the host.
//! Bugs and crashes may occur if the host changes contexts between calls.

mod device;
mod effect;
mod gl_backend;
pub mod glsl;
pub mod validate_gl;

pub use device::{GliumDevice, GliumTexture, GliumView};
pub use effect::GliumEffect;
