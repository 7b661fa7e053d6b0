//! Core types shared by the canvas layer bridge.
//!
//! This crate holds everything the bridge and its backends agree on without
//! depending on a particular GPU API:
//!
//! - [`CanvasFrameDescriptor`] describes how a canvas produces its pixels.
//! - [`producer`] defines the producer-side traits (offscreen GPU contexts,
//!   shared surfaces, CPU drawing surfaces).
//! - [`shader`] holds [`ShaderFlags`], the [`Technique`] table and the
//!   shader constant types.
//! - [`DrawTarget`] is the 4-channel drawing target bound to mapped texture
//!   memory.
//! - [`LayerConfig`] and [`logging`] cover configuration and tracing setup.

pub mod config;
pub mod descriptor;
pub mod draw_target;
pub mod logging;
pub mod producer;
pub mod shader;
pub mod transaction;

pub use config::LayerConfig;
pub use descriptor::{CanvasFrameDescriptor, ContentOrigin};
pub use draw_target::{DrawTarget, PixelFormat};
pub use producer::{
    DrawingSurface, OffscreenContext, ShareHandle, SharedSurface, SharedSurfaceKind,
    SnapshotImage,
};
pub use shader::{Filter, LayerTransform, ShaderConstantRect, ShaderFlags, Technique};
pub use transaction::TransactionCallbacks;
