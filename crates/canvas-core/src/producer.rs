//! Producer-side interfaces: where canvas pixels come from.
//!
//! A canvas is painted either by an offscreen GPU context, which publishes
//! its frames as [`SharedSurface`]s, or by a CPU [`DrawingSurface`]. The
//! bridge only ever reads from producers; it never owns their memory.

use std::rc::Rc;

use anyhow::Result;

use crate::draw_target::DrawTarget;

/// Read-only CPU snapshot of a drawing surface: straight 8-bit RGBA, top row
/// first.
pub type SnapshotImage = image::RgbaImage;

/// Opaque cross-API handle naming GPU memory owned by a producing context.
///
/// The meaning is backend specific (a DXGI shared handle, a GL texture name
/// in a shared context group, ...). A handle is only valid for the frame it
/// was published with and must never be cached across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShareHandle(pub u64);

/// Storage kind behind a shared surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedSurfaceKind {
    /// GPU memory nameable through a [`ShareHandle`] and importable by the
    /// compositor device without a copy.
    ShareHandle,
    /// Memory the compositor cannot open directly; pixels must be read back.
    Basic,
}

/// One frame published by an offscreen GPU context.
pub trait SharedSurface {
    fn kind(&self) -> SharedSurfaceKind;

    /// Surface dimensions in pixels.
    fn size(&self) -> (u32, u32);

    /// Block until the producer's GPU work on this surface has completed.
    ///
    /// Returns `false` if the wait could not be performed; the surface must
    /// not be consumed in that case.
    fn wait_sync(&self) -> bool;

    /// The cross-API handle, for [`SharedSurfaceKind::ShareHandle`] surfaces.
    fn share_handle(&self) -> Option<ShareHandle>;

    /// Copy the full surface into `target`, top row first.
    fn read_pixels(&self, target: &mut DrawTarget<'_>) -> Result<()>;
}

/// An offscreen GPU rendering context backing a canvas.
pub trait OffscreenContext {
    /// Whether the context renders offscreen. Only offscreen contexts can
    /// back a canvas layer.
    fn is_offscreen(&self) -> bool;

    /// The most recently completed frame, or `None` if the producer has not
    /// rendered anything yet.
    fn front_surface(&self) -> Option<Rc<dyn SharedSurface>>;
}

/// A CPU-side 2D drawing surface.
pub trait DrawingSurface {
    /// Capture the current contents as an immutable image.
    fn snapshot(&self) -> Result<SnapshotImage>;

    /// Complete any pending drawing commands.
    fn flush(&self);
}
