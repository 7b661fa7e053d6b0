//! The layer's current texture and shader-resource view.

use std::fmt;

use gpu_interop::CompositorDevice;
use tracing::debug;

/// A texture paired with the view the renderer samples it through.
pub struct CachedTexture<D: CompositorDevice> {
    pub texture: D::Texture,
    pub view: D::View,
}

/// Holds at most one {texture, view} pair.
///
/// The pair is only ever replaced whole, so the renderer never sees a texture
/// from one import with a view from another.
pub struct TextureCache<D: CompositorDevice> {
    current: Option<CachedTexture<D>>,
    generation: u64,
}

impl<D: CompositorDevice> TextureCache<D> {
    pub fn new() -> Self {
        Self {
            current: None,
            generation: 0,
        }
    }

    pub fn current(&self) -> Option<&CachedTexture<D>> {
        self.current.as_ref()
    }

    pub fn view(&self) -> Option<&D::View> {
        self.current.as_ref().map(|c| &c.view)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Number of replacements so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Install a new pair, releasing the previous one.
    pub fn replace(&mut self, texture: D::Texture, view: D::View) {
        self.current = Some(CachedTexture { texture, view });
        self.generation += 1;
        debug!(generation = self.generation, "texture cache replaced");
    }

    /// Release the pair.
    pub fn clear(&mut self) {
        if self.current.take().is_some() {
            debug!(generation = self.generation, "texture cache cleared");
        }
    }
}

impl<D: CompositorDevice> Default for TextureCache<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: CompositorDevice> fmt::Debug for TextureCache<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureCache")
            .field("occupied", &self.current.is_some())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_interop::soft::SoftDevice;

    #[test]
    fn replacement_swaps_the_whole_pair() {
        let device = SoftDevice::new();
        let mut cache = TextureCache::<SoftDevice>::new();
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 0);

        let first = device.create_dynamic_texture(2, 2).unwrap();
        let first_view = device.create_view(&first).unwrap();
        cache.replace(first.clone(), first_view.clone());

        let second = device.create_dynamic_texture(2, 2).unwrap();
        let second_view = device.create_view(&second).unwrap();
        cache.replace(second.clone(), second_view.clone());

        let current = cache.current().unwrap();
        assert_eq!(current.texture.id(), second.id());
        assert_eq!(current.view.id(), second_view.id());
        assert_eq!(cache.generation(), 2);
    }

    #[test]
    fn clear_releases_but_keeps_generation() {
        let device = SoftDevice::new();
        let mut cache = TextureCache::<SoftDevice>::new();
        let texture = device.create_dynamic_texture(1, 1).unwrap();
        let view = device.create_view(&texture).unwrap();
        cache.replace(texture, view);

        cache.clear();
        assert!(cache.view().is_none());
        assert_eq!(cache.generation(), 1);
    }
}
