//! Presents a canvas's content as a compositor layer.
//!
//! A [`CanvasLayer`] turns whatever the canvas produced this frame into a
//! texture the compositor can sample, then draws it as a textured quad. Three
//! producers are supported:
//!
//! - an offscreen GPU context publishing shared surfaces, imported through
//!   their cross-API handle or read back through the CPU;
//! - a CPU drawing surface, uploaded through a dynamic texture;
//! - a texture the compositor can sample directly.
//!
//! The pipeline is split the same way the work is:
//!
//! - [`SurfaceSource`] classifies the producer once, at initialization.
//! - [`SurfaceImporter`] moves new content into GPU memory on dirty frames.
//! - [`TextureCache`] holds the current texture and view.
//! - [`CompositeRenderer`] picks the shader variant and issues the draw.
//!
//! Resource failures never escape [`CanvasLayer::render_layer`]; they are
//! logged and the previous frame keeps being drawn.

pub mod cache;
pub mod importer;
pub mod layer;
pub mod renderer;
pub mod source;

pub use cache::{CachedTexture, TextureCache};
pub use importer::{ImportOutcome, ImportPath, ImportStats, SurfaceImporter};
pub use layer::{CanvasLayer, LayerId};
pub use renderer::{CompositeRenderer, RenderOutcome, TextureCoordsGuard};
pub use source::{LayerContent, ProducerKind, SourceError, SurfaceSource};
