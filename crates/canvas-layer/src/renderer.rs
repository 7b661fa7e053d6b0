//! Drawing the cached texture as a layer quad.

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use canvas_core::{ContentOrigin, Filter, LayerTransform, ShaderConstantRect, ShaderFlags, Technique};
use gpu_interop::{CompositorDevice, LayerEffect};
use tracing::{error, trace};

use crate::cache::TextureCache;
use crate::source::LayerContent;

/// Vertices in the layer quad's triangle strip.
const QUAD_VERTICES: u32 = 4;

/// Result of one render step, for host diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderOutcome {
    Drawn,
    /// No texture has been imported yet.
    NothingToDraw,
    /// A texture was cached but the draw could not be issued.
    Skipped,
}

/// Flips the effect's texture coordinates for bottom-left content and puts
/// the identity coordinates back when dropped.
pub struct TextureCoordsGuard<'a, D: CompositorDevice, E: LayerEffect<D>> {
    effect: &'a mut E,
    flipped: bool,
    _device: PhantomData<fn() -> D>,
}

impl<'a, D: CompositorDevice, E: LayerEffect<D>> TextureCoordsGuard<'a, D, E> {
    pub fn new(effect: &'a mut E, origin: ContentOrigin) -> Self {
        let flipped = origin == ContentOrigin::BottomLeft;
        if flipped {
            effect.set_texture_coords(ShaderConstantRect::FLIPPED_UV);
        }
        Self {
            effect,
            flipped,
            _device: PhantomData,
        }
    }
}

impl<D: CompositorDevice, E: LayerEffect<D>> Deref for TextureCoordsGuard<'_, D, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.effect
    }
}

impl<D: CompositorDevice, E: LayerEffect<D>> DerefMut for TextureCoordsGuard<'_, D, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.effect
    }
}

impl<D: CompositorDevice, E: LayerEffect<D>> Drop for TextureCoordsGuard<'_, D, E> {
    fn drop(&mut self) {
        if self.flipped {
            self.effect
                .set_texture_coords(ShaderConstantRect::IDENTITY_UV);
        }
    }
}

/// Selects the shader variant and issues the quad draw.
#[derive(Debug, Clone, Copy)]
pub struct CompositeRenderer {
    filter: Filter,
    transform: LayerTransform,
}

impl CompositeRenderer {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            transform: LayerTransform::IDENTITY,
        }
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn transform(&self) -> &LayerTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: LayerTransform) {
        self.transform = transform;
    }

    /// Variant key for the next draw of `content`.
    pub fn shader_flags(&self, content: &LayerContent) -> ShaderFlags {
        ShaderFlags::for_content(content.premultiplied, content.has_alpha, self.filter)
    }

    /// Draw the cached texture, if any.
    pub fn draw<D: CompositorDevice, E: LayerEffect<D>>(
        &self,
        device: &D,
        effect: &mut E,
        cache: &TextureCache<D>,
        content: &LayerContent,
    ) -> RenderOutcome {
        let Some(view) = cache.view() else {
            trace!("no texture cached, nothing to draw");
            return RenderOutcome::NothingToDraw;
        };

        let flags = self.shader_flags(content);
        let Some(technique) = Technique::select(flags) else {
            error!(?flags, "no technique implements shader flags");
            return RenderOutcome::Skipped;
        };

        effect.set_color_source(view);
        effect.set_layer_quad(ShaderConstantRect::from_size(content.size.0, content.size.1));
        effect.set_transform_and_opacity(&self.transform);

        let mut effect = TextureCoordsGuard::new(effect, content.origin);
        if let Err(e) = effect.apply(technique, 0) {
            error!("applying {} failed: {e:#}", technique.name());
            return RenderOutcome::Skipped;
        }
        device.draw(QUAD_VERTICES, 0);
        trace!(technique = technique.name(), "layer drawn");
        RenderOutcome::Drawn
    }
}

impl Default for CompositeRenderer {
    fn default() -> Self {
        Self::new(Filter::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_interop::soft::{SoftDevice, SoftEffect, SoftFaults};

    fn content(origin: ContentOrigin) -> LayerContent {
        LayerContent {
            size: (8, 4),
            premultiplied: true,
            has_alpha: true,
            origin,
        }
    }

    fn cached(device: &SoftDevice) -> TextureCache<SoftDevice> {
        let mut cache = TextureCache::new();
        let texture = device.create_dynamic_texture(8, 4).unwrap();
        let view = device.create_view(&texture).unwrap();
        cache.replace(texture, view);
        cache
    }

    #[test]
    fn guard_restores_identity_coordinates() {
        let device = SoftDevice::new();
        let mut effect = SoftEffect::new(&device);
        {
            let guard = TextureCoordsGuard::<SoftDevice, _>::new(
                &mut effect,
                ContentOrigin::BottomLeft,
            );
            assert_eq!(guard.texture_coords(), ShaderConstantRect::FLIPPED_UV);
        }
        assert_eq!(effect.texture_coords(), ShaderConstantRect::IDENTITY_UV);
    }

    #[test]
    fn guard_leaves_top_left_content_alone() {
        let device = SoftDevice::new();
        let mut effect = SoftEffect::new(&device);
        let custom = ShaderConstantRect::new(0.25, 0.25, 0.5, 0.5);
        effect.set_texture_coords(custom);
        drop(TextureCoordsGuard::<SoftDevice, _>::new(
            &mut effect,
            ContentOrigin::TopLeft,
        ));
        assert_eq!(effect.texture_coords(), custom);
    }

    #[test]
    fn empty_cache_draws_nothing() {
        let device = SoftDevice::new();
        let mut effect = SoftEffect::new(&device);
        let renderer = CompositeRenderer::default();
        let outcome = renderer.draw(
            &device,
            &mut effect,
            &TextureCache::new(),
            &content(ContentOrigin::TopLeft),
        );
        assert_eq!(outcome, RenderOutcome::NothingToDraw);
        assert!(device.draws().is_empty());
    }

    #[test]
    fn draw_binds_quad_and_technique() {
        let device = SoftDevice::new();
        let mut effect = SoftEffect::new(&device);
        let cache = cached(&device);
        let mut renderer = CompositeRenderer::new(Filter::Nearest);
        let mut transform = LayerTransform::IDENTITY;
        transform.opacity = 0.5;
        renderer.set_transform(transform);

        let outcome = renderer.draw(&device, &mut effect, &cache, &content(ContentOrigin::TopLeft));
        assert_eq!(outcome, RenderOutcome::Drawn);

        let draw = device.last_draw().unwrap();
        assert_eq!(draw.technique, Technique::PremulRgbaPoint);
        assert_eq!(draw.layer_quad, ShaderConstantRect::new(0.0, 0.0, 8.0, 4.0));
        assert_eq!(draw.texture_coords, ShaderConstantRect::IDENTITY_UV);
        assert_eq!(draw.transform.opacity, 0.5);
        assert_eq!((draw.vertex_count, draw.start_vertex), (4, 0));
    }

    #[test]
    fn apply_failure_skips_draw_and_restores_coordinates() {
        let device = SoftDevice::new();
        let mut effect = SoftEffect::new(&device);
        let cache = cached(&device);
        device.set_faults(SoftFaults {
            apply: true,
            ..SoftFaults::default()
        });

        let outcome = CompositeRenderer::default().draw(
            &device,
            &mut effect,
            &cache,
            &content(ContentOrigin::BottomLeft),
        );
        assert_eq!(outcome, RenderOutcome::Skipped);
        assert!(device.draws().is_empty());
        assert_eq!(effect.texture_coords(), ShaderConstantRect::IDENTITY_UV);
    }
}
