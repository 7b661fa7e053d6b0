//! The host-facing canvas layer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use canvas_core::{
    CanvasFrameDescriptor, Filter, LayerConfig, LayerTransform, ShaderConstantRect,
    TransactionCallbacks,
};
use gpu_interop::{CompositorDevice, LayerEffect};
use tracing::{debug, trace};

use crate::cache::TextureCache;
use crate::importer::{ImportOutcome, ImportStats, SurfaceImporter};
use crate::renderer::{CompositeRenderer, RenderOutcome};
use crate::source::{ProducerKind, SourceError, SurfaceSource};

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a layer in the host's layer tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

/// A compositor layer presenting one canvas.
///
/// Construct it once per canvas, [`initialize`](Self::initialize) it with the
/// canvas's frame descriptor, then call [`render_layer`](Self::render_layer)
/// every composite. The host calls [`mark_dirty`](Self::mark_dirty) whenever
/// the canvas paints.
pub struct CanvasLayer<D: CompositorDevice, E: LayerEffect<D>> {
    id: LayerId,
    device: D,
    effect: E,
    source: Option<SurfaceSource<D>>,
    importer: SurfaceImporter,
    cache: TextureCache<D>,
    renderer: CompositeRenderer,
    dirty: bool,
}

impl<D: CompositorDevice, E: LayerEffect<D>> CanvasLayer<D, E> {
    pub fn new(device: D, effect: E, config: LayerConfig) -> Self {
        let id = LayerId(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed));
        debug!(?id, ?config, "canvas layer created");
        Self {
            id,
            device,
            effect,
            source: None,
            importer: SurfaceImporter::new(config.force_readback),
            cache: TextureCache::new(),
            renderer: CompositeRenderer::new(config.filter),
            dirty: false,
        }
    }

    /// Resolve the canvas's producer. Only configuration errors are
    /// returned; resource failures leave the layer drawing nothing.
    pub fn initialize(
        &mut self,
        descriptor: CanvasFrameDescriptor<D::Texture>,
    ) -> Result<(), SourceError> {
        if self.source.is_some() {
            return Err(SourceError::AlreadyInitialized);
        }
        let source = SurfaceSource::resolve(&self.device, descriptor, &mut self.cache)?;
        debug!(id = ?self.id, ?source, "canvas layer initialized");
        self.source = Some(source);
        Ok(())
    }

    pub fn get_layer(&self) -> LayerId {
        self.id
    }

    pub fn is_initialized(&self) -> bool {
        self.source.is_some()
    }

    pub fn producer_kind(&self) -> Option<ProducerKind> {
        self.source.as_ref().map(SurfaceSource::kind)
    }

    /// New content has been painted.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn filter(&self) -> Filter {
        self.renderer.filter()
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.renderer.set_filter(filter);
    }

    pub fn set_transform(&mut self, transform: LayerTransform) {
        self.renderer.set_transform(transform);
    }

    /// The layer's bounding rectangle, `(0, 0, width, height)`. Empty before
    /// initialization.
    pub fn bounds(&self) -> ShaderConstantRect {
        match &self.source {
            Some(source) => {
                let (width, height) = source.content().size;
                ShaderConstantRect::from_size(width, height)
            }
            None => ShaderConstantRect::from_size(0, 0),
        }
    }

    pub fn import_stats(&self) -> ImportStats {
        self.importer.stats()
    }

    pub fn texture_cache(&self) -> &TextureCache<D> {
        &self.cache
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn effect(&self) -> &E {
        &self.effect
    }

    /// Run the import step without drawing or firing the transaction
    /// callbacks. Hosts go through [`render_layer`](Self::render_layer).
    #[doc(hidden)]
    pub fn update_surface(&mut self) -> ImportOutcome {
        let Some(source) = self.source.as_mut() else {
            return ImportOutcome::Clean;
        };
        self.importer
            .import(&self.device, source, &mut self.dirty, &mut self.cache)
    }

    /// Per-frame entry point: bracket the import step with the transaction
    /// callbacks, then draw whatever is cached.
    pub fn render_layer(&mut self, callbacks: &mut impl TransactionCallbacks) -> RenderOutcome {
        callbacks.will_render();
        let import = self.update_surface();
        callbacks.did_render();
        trace!(id = ?self.id, ?import, "canvas surface updated");

        let Some(source) = self.source.as_ref() else {
            return RenderOutcome::NothingToDraw;
        };
        self.renderer
            .draw(&self.device, &mut self.effect, &self.cache, source.content())
    }
}

impl<D: CompositorDevice, E: LayerEffect<D>> Drop for CanvasLayer<D, E> {
    fn drop(&mut self) {
        self.cache.clear();
        self.source = None;
        debug!(id = ?self.id, "canvas layer released");
    }
}

impl<D: CompositorDevice, E: LayerEffect<D>> fmt::Debug for CanvasLayer<D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasLayer")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("cache", &self.cache)
            .field("dirty", &self.dirty)
            .finish()
    }
}
