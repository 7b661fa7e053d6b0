//! Per-frame import of producer content into the texture cache.

use anyhow::{anyhow, Context as _, Result};
use canvas_core::{DrawTarget, PixelFormat, SharedSurface, SharedSurfaceKind};
use gpu_interop::CompositorDevice;
use tracing::{trace, warn};

use crate::cache::TextureCache;
use crate::source::{ProducerMode, SurfaceSource, UploadTarget};

/// How a frame reached the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportPath {
    /// Opened from the producer's shared handle.
    SharedHandle,
    /// Shared surface read back into the upload texture.
    Readback,
    /// CPU snapshot written into the upload texture.
    Upload,
}

/// Result of one import step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportOutcome {
    /// Nothing was painted since the last import.
    Clean,
    /// The producer is a texture the compositor samples directly.
    Static,
    /// The producer has no frame to hand over yet.
    NotReady,
    Imported(ImportPath),
    /// A resource could not be acquired; the previous texture stays cached.
    Failed,
}

/// Import counters since the layer was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Dirty frames that reached a producer.
    pub attempts: u64,
    pub shared_imports: u64,
    pub readbacks: u64,
    pub uploads: u64,
    pub failures: u64,
    /// Front surfaces whose size differed from the layer's.
    pub size_mismatches: u64,
}

/// Moves producer content into GPU-accessible form on dirty frames.
#[derive(Debug, Default)]
pub struct SurfaceImporter {
    force_readback: bool,
    stats: ImportStats,
}

impl SurfaceImporter {
    /// `force_readback` routes shareable GPU-context frames through the
    /// upload texture instead of opening their handles.
    pub fn new(force_readback: bool) -> Self {
        Self {
            force_readback,
            stats: ImportStats::default(),
        }
    }

    pub fn stats(&self) -> ImportStats {
        self.stats
    }

    /// Run the import step for one frame.
    ///
    /// `dirty` is cleared before any fallible work: a failed import waits for
    /// the next dirty signal.
    pub fn import<D: CompositorDevice>(
        &mut self,
        device: &D,
        source: &mut SurfaceSource<D>,
        dirty: &mut bool,
        cache: &mut TextureCache<D>,
    ) -> ImportOutcome {
        if !*dirty {
            return ImportOutcome::Clean;
        }
        *dirty = false;

        let size = source.content().size;
        let result = match &mut source.mode {
            ProducerMode::Texture => return ImportOutcome::Static,
            ProducerMode::GlContext { context, upload } => {
                self.stats.attempts += 1;
                let Some(surface) = context.front_surface() else {
                    trace!("no front surface yet");
                    return ImportOutcome::NotReady;
                };
                if !surface.wait_sync() {
                    trace!("front surface sync did not complete");
                    return ImportOutcome::NotReady;
                }
                let surface_size = surface.size();
                if surface_size != size {
                    self.stats.size_mismatches += 1;
                    warn!(
                        ?surface_size,
                        layer_size = ?size,
                        "front surface size differs from the layer"
                    );
                }
                if surface.kind() == SharedSurfaceKind::ShareHandle && !self.force_readback {
                    import_shared(device, surface.as_ref(), cache)
                        .map(|()| ImportPath::SharedHandle)
                } else {
                    ensure_upload(device, upload, size)
                        .and_then(|upload| {
                            write_upload(device, upload, cache, |target| {
                                surface.read_pixels(target)
                            })
                        })
                        .map(|()| ImportPath::Readback)
                }
            }
            ProducerMode::DrawingSurface {
                surface,
                fallback,
                upload,
            } => {
                self.stats.attempts += 1;
                surface.flush();
                let fresh = match surface.snapshot() {
                    Ok(image) => Some(image),
                    Err(e) => {
                        warn!("snapshot failed, drawing the initial one: {e:#}");
                        None
                    }
                };
                let image = fresh.as_ref().unwrap_or(&*fallback);
                ensure_upload(device, upload, size)
                    .and_then(|upload| {
                        write_upload(device, upload, cache, |target| target.draw_snapshot(image))
                    })
                    .map(|()| ImportPath::Upload)
            }
        };

        match result {
            Ok(path) => {
                match path {
                    ImportPath::SharedHandle => self.stats.shared_imports += 1,
                    ImportPath::Readback => self.stats.readbacks += 1,
                    ImportPath::Upload => self.stats.uploads += 1,
                }
                trace!(?path, generation = cache.generation(), "frame imported");
                ImportOutcome::Imported(path)
            }
            Err(e) => {
                self.stats.failures += 1;
                warn!("canvas import skipped, keeping previous frame: {e:#}");
                ImportOutcome::Failed
            }
        }
    }
}

/// Open a fresh texture and view on the surface's shared handle.
fn import_shared<D: CompositorDevice>(
    device: &D,
    surface: &dyn SharedSurface,
    cache: &mut TextureCache<D>,
) -> Result<()> {
    let handle = surface
        .share_handle()
        .ok_or_else(|| anyhow!("shareable surface has no handle"))?;
    let texture = device
        .open_shared_texture(handle)
        .with_context(|| format!("opening shared handle {:#x}", handle.0))?;
    let view = device
        .create_view(&texture)
        .context("view for shared texture")?;
    cache.replace(texture, view);
    Ok(())
}

/// Retry the upload allocation if it failed at initialization.
fn ensure_upload<'a, D: CompositorDevice>(
    device: &D,
    upload: &'a mut Option<UploadTarget<D>>,
    size: (u32, u32),
) -> Result<&'a UploadTarget<D>> {
    if upload.is_none() {
        *upload = UploadTarget::allocate(device, size);
    }
    upload
        .as_ref()
        .ok_or_else(|| anyhow!("no upload texture"))
}

/// Map the upload texture, let `fill` write it, commit and unmap, then cache
/// it. A failed fill leaves the mapping uncommitted.
fn write_upload<D: CompositorDevice>(
    device: &D,
    upload: &UploadTarget<D>,
    cache: &mut TextureCache<D>,
    fill: impl FnOnce(&mut DrawTarget<'_>) -> Result<()>,
) -> Result<()> {
    {
        let mut mapped = device
            .map_write_discard(&upload.texture)
            .context("mapping upload texture")?;
        let mut target = mapped
            .draw_target(PixelFormat::Rgba8)
            .context("binding draw target to upload texture")?;
        fill(&mut target)?;
        mapped.commit();
    }
    cache.replace(upload.texture.clone(), upload.view.clone());
    Ok(())
}
