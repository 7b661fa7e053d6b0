//! The host-supplied description of a canvas frame producer.

use std::fmt;
use std::rc::Rc;

use crate::producer::{DrawingSurface, OffscreenContext};

/// Which screen corner the producer's row zero corresponds to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContentOrigin {
    #[default]
    TopLeft,
    BottomLeft,
}

/// Describes where a canvas layer gets its pixels from.
///
/// The three producer slots are independent so a host can describe any
/// combination; exactly one of them must be filled for the layer to accept
/// the descriptor. `T` is the compositor backend's texture type, used when
/// the canvas already renders into a compositor-visible texture.
pub struct CanvasFrameDescriptor<T> {
    /// Logical pixel dimensions of the canvas.
    pub size: (u32, u32),
    /// Offscreen GPU rendering context (WebGL-style producers).
    pub gl_context: Option<Rc<dyn OffscreenContext>>,
    /// CPU-side drawing surface (2D-context producers).
    pub drawing_surface: Option<Rc<dyn DrawingSurface>>,
    /// A texture the producer already renders into.
    pub texture: Option<T>,
    /// Whether color channels are pre-scaled by alpha.
    pub premultiplied: bool,
    /// Whether the alpha channel carries meaningful data.
    pub has_alpha: bool,
    pub origin: ContentOrigin,
}

impl<T> CanvasFrameDescriptor<T> {
    /// An empty descriptor of the given size with premultiplied, alpha-bearing,
    /// top-left content. No producer is set.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            gl_context: None,
            drawing_surface: None,
            texture: None,
            premultiplied: true,
            has_alpha: true,
            origin: ContentOrigin::TopLeft,
        }
    }

    pub fn with_gl_context(mut self, context: Rc<dyn OffscreenContext>) -> Self {
        self.gl_context = Some(context);
        self
    }

    pub fn with_drawing_surface(mut self, surface: Rc<dyn DrawingSurface>) -> Self {
        self.drawing_surface = Some(surface);
        self
    }

    pub fn with_texture(mut self, texture: T) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn premultiplied(mut self, premultiplied: bool) -> Self {
        self.premultiplied = premultiplied;
        self
    }

    pub fn has_alpha(mut self, has_alpha: bool) -> Self {
        self.has_alpha = has_alpha;
        self
    }

    pub fn origin(mut self, origin: ContentOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Number of producer slots that are filled.
    pub fn producer_count(&self) -> usize {
        usize::from(self.gl_context.is_some())
            + usize::from(self.drawing_surface.is_some())
            + usize::from(self.texture.is_some())
    }
}

impl<T> fmt::Debug for CanvasFrameDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasFrameDescriptor")
            .field("size", &self.size)
            .field("gl_context", &self.gl_context.is_some())
            .field("drawing_surface", &self.drawing_surface.is_some())
            .field("texture", &self.texture.is_some())
            .field("premultiplied", &self.premultiplied)
            .field("has_alpha", &self.has_alpha)
            .field("origin", &self.origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_canvas_content() {
        let desc = CanvasFrameDescriptor::<()>::new(4, 2);
        assert_eq!(desc.size, (4, 2));
        assert!(desc.premultiplied);
        assert!(desc.has_alpha);
        assert_eq!(desc.origin, ContentOrigin::TopLeft);
        assert_eq!(desc.producer_count(), 0);
    }

    #[test]
    fn producer_count_tracks_filled_slots() {
        let desc = CanvasFrameDescriptor::new(1, 1).with_texture(7u32);
        assert_eq!(desc.producer_count(), 1);
    }
}
