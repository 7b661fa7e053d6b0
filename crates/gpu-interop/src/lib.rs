//! Compositor device seam for canvas layers.
//!
//! This crate defines the [`CompositorDevice`] and [`LayerEffect`] traits, the
//! narrow interface a canvas layer uses to create and map textures, open
//! shared producer surfaces and draw its quad. On Windows the [`dx11`] module
//! implements it on Direct3D 11, opening producer surfaces through DXGI shared
//! handles. The [`soft`] module is an in-memory device available everywhere.

pub mod device;
pub use device::{CompositorDevice, LayerEffect, MappedMemory, MappedTexture};

// Backends.

pub mod soft;

#[cfg(target_os = "windows")]
pub mod dx11;
