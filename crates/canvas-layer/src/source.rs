//! Producer classification.
//!
//! A [`CanvasFrameDescriptor`] is resolved once, at initialization, into a
//! [`SurfaceSource`]: the producer mode plus the content properties the
//! renderer needs. Each mode owns only the state it uses.

use std::fmt;
use std::rc::Rc;

use canvas_core::{
    CanvasFrameDescriptor, ContentOrigin, DrawingSurface, OffscreenContext, SnapshotImage,
};
use gpu_interop::CompositorDevice;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::TextureCache;

/// Host configuration errors reported by `CanvasLayer::initialize`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("canvas descriptor has no producer")]
    NoProducer,
    #[error("canvas descriptor has {count} producers, expected exactly one")]
    MultipleProducers { count: usize },
    #[error("GPU context producer is not an offscreen context")]
    NotOffscreen,
    #[error("canvas has empty size {width}x{height}")]
    EmptySize { width: u32, height: u32 },
    #[error("layer is already initialized")]
    AlreadyInitialized,
}

/// Which producer a layer was initialized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProducerKind {
    /// A texture the compositor samples directly.
    Texture,
    /// An offscreen GPU context publishing shared surfaces.
    GlContext,
    /// A CPU drawing surface uploaded through a dynamic texture.
    DrawingSurface,
}

/// Content properties fixed at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerContent {
    pub size: (u32, u32),
    pub premultiplied: bool,
    pub has_alpha: bool,
    pub origin: ContentOrigin,
}

/// The CPU-writable texture readbacks and uploads land in.
pub(crate) struct UploadTarget<D: CompositorDevice> {
    pub(crate) texture: D::Texture,
    pub(crate) view: D::View,
}

impl<D: CompositorDevice> UploadTarget<D> {
    /// Allocate the texture and its view. Failures are logged and yield `None`.
    pub(crate) fn allocate(device: &D, (width, height): (u32, u32)) -> Option<Self> {
        let texture = match device.create_dynamic_texture(width, height) {
            Ok(texture) => texture,
            Err(e) => {
                warn!("upload texture {width}x{height} unavailable: {e:#}");
                return None;
            }
        };
        let view = match device.create_view(&texture) {
            Ok(view) => view,
            Err(e) => {
                warn!("upload texture view unavailable: {e:#}");
                return None;
            }
        };
        debug!(width, height, "upload texture allocated");
        Some(Self { texture, view })
    }
}

pub(crate) enum ProducerMode<D: CompositorDevice> {
    /// The texture lives in the cache for the layer's lifetime.
    Texture,
    GlContext {
        context: Rc<dyn OffscreenContext>,
        upload: Option<UploadTarget<D>>,
    },
    DrawingSurface {
        surface: Rc<dyn DrawingSurface>,
        /// Taken at initialization; drawn when a fresh snapshot fails.
        fallback: SnapshotImage,
        upload: Option<UploadTarget<D>>,
    },
}

/// A resolved producer.
pub struct SurfaceSource<D: CompositorDevice> {
    pub(crate) mode: ProducerMode<D>,
    content: LayerContent,
}

impl<D: CompositorDevice> SurfaceSource<D> {
    /// Classify `descriptor`.
    ///
    /// A pre-existing texture is wrapped and installed in `cache` here; its
    /// view is created exactly once. Resource failures are logged and leave
    /// the layer with nothing to draw; only configuration errors are
    /// returned.
    pub fn resolve(
        device: &D,
        descriptor: CanvasFrameDescriptor<D::Texture>,
        cache: &mut TextureCache<D>,
    ) -> Result<Self, SourceError> {
        match descriptor.producer_count() {
            0 => return Err(SourceError::NoProducer),
            1 => {}
            count => return Err(SourceError::MultipleProducers { count }),
        }
        let (width, height) = descriptor.size;
        if width == 0 || height == 0 {
            return Err(SourceError::EmptySize { width, height });
        }

        let mut content = LayerContent {
            size: descriptor.size,
            premultiplied: descriptor.premultiplied,
            has_alpha: descriptor.has_alpha,
            origin: descriptor.origin,
        };

        let mode = if let Some(context) = descriptor.gl_context {
            if !context.is_offscreen() {
                return Err(SourceError::NotOffscreen);
            }
            // Shared surfaces are always published top row first.
            content.origin = ContentOrigin::TopLeft;
            ProducerMode::GlContext {
                context,
                upload: UploadTarget::allocate(device, descriptor.size),
            }
        } else if let Some(surface) = descriptor.drawing_surface {
            let fallback = match surface.snapshot() {
                Ok(image) => image,
                Err(e) => {
                    warn!("initial snapshot failed, starting blank: {e:#}");
                    SnapshotImage::new(width, height)
                }
            };
            ProducerMode::DrawingSurface {
                surface,
                fallback,
                upload: UploadTarget::allocate(device, descriptor.size),
            }
        } else if let Some(texture) = descriptor.texture {
            match device.create_view(&texture) {
                Ok(view) => cache.replace(texture, view),
                Err(e) => warn!("view for producer texture unavailable: {e:#}"),
            }
            ProducerMode::Texture
        } else {
            return Err(SourceError::NoProducer);
        };

        let source = Self { mode, content };
        debug!(kind = ?source.kind(), ?content, "canvas source resolved");
        Ok(source)
    }

    pub fn kind(&self) -> ProducerKind {
        match self.mode {
            ProducerMode::Texture => ProducerKind::Texture,
            ProducerMode::GlContext { .. } => ProducerKind::GlContext,
            ProducerMode::DrawingSurface { .. } => ProducerKind::DrawingSurface,
        }
    }

    pub fn content(&self) -> &LayerContent {
        &self.content
    }

    /// Whether an upload texture is currently allocated.
    pub fn has_upload_target(&self) -> bool {
        match &self.mode {
            ProducerMode::Texture => false,
            ProducerMode::GlContext { upload, .. } | ProducerMode::DrawingSurface { upload, .. } => {
                upload.is_some()
            }
        }
    }
}

impl<D: CompositorDevice> fmt::Debug for SurfaceSource<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceSource")
            .field("kind", &self.kind())
            .field("content", &self.content)
            .field("upload", &self.has_upload_target())
            .finish()
    }
}
