//! Common interface between the canvas layer and a compositor GPU device.

use std::fmt;
use std::ops::DerefMut;

use anyhow::Result;
use canvas_core::{
    DrawTarget, LayerTransform, PixelFormat, ShareHandle, ShaderConstantRect, Technique,
};

/// The compositor device operations a canvas layer needs.
///
/// Implementations exist for Direct3D 11 (Windows), OpenGL via glium
/// (`canvas-glium`) and an in-memory reference device ([`crate::soft`]).
///
/// Texture and view handles are reference counted by the backend; cloning one
/// shares the underlying GPU object.
pub trait CompositorDevice {
    /// A 2D texture object.
    type Texture: Clone;
    /// A shader-resource view onto a texture.
    type View: Clone;

    /// Create a CPU-writable RGBA8 texture for per-frame uploads.
    fn create_dynamic_texture(&self, width: u32, height: u32) -> Result<Self::Texture>;

    /// Create a shader-resource view so `texture` can be sampled.
    fn create_view(&self, texture: &Self::Texture) -> Result<Self::View>;

    /// Open a texture published by another API through a shared handle.
    ///
    /// The returned texture aliases the producer's memory; every call is a new
    /// acquisition.
    fn open_shared_texture(&self, handle: ShareHandle) -> Result<Self::Texture>;

    /// Map a dynamic texture for exclusive writing, discarding its contents.
    ///
    /// The texture is unmapped when the returned guard is dropped.
    fn map_write_discard<'a>(&'a self, texture: &'a Self::Texture) -> Result<MappedTexture<'a>>;

    /// Draw `vertex_count` vertices of the currently applied technique as a
    /// triangle strip.
    fn draw(&self, vertex_count: u32, start_vertex: u32);
}

/// Effect state used to draw a layer quad: the shader constants plus
/// technique application.
///
/// Shader compilation is the backend's business; the layer only selects a
/// [`Technique`] and fills the constants before each draw.
pub trait LayerEffect<D: CompositorDevice> {
    /// Bind the color source (`tRGB`).
    fn set_color_source(&mut self, view: &D::View);

    /// Set the layer quad (`vLayerQuad`) in layer pixels.
    fn set_layer_quad(&mut self, quad: ShaderConstantRect);

    /// Current texture coordinate rectangle (`vTextureCoords`).
    fn texture_coords(&self) -> ShaderConstantRect;

    fn set_texture_coords(&mut self, coords: ShaderConstantRect);

    fn set_transform_and_opacity(&mut self, transform: &LayerTransform);

    /// Push the constants and bind pass `pass` of `technique` on the device.
    fn apply(&mut self, technique: Technique, pass: u32) -> Result<()>;
}

/// Backend memory behind a [`MappedTexture`]. Dropping it releases the map.
pub trait MappedMemory: DerefMut<Target = [u8]> {
    /// The writes are complete and may replace the texture's contents.
    ///
    /// Backends that write through to the texture ignore this; staging
    /// backends publish only committed writes.
    fn commit(&mut self) {}
}

/// Write access to a mapped texture.
///
/// Owns the backend's mapping; dropping it unmaps the texture, so every exit
/// path of an upload releases the map. The mapped bytes start out undefined.
pub struct MappedTexture<'a> {
    memory: Box<dyn MappedMemory + 'a>,
    width: u32,
    height: u32,
    row_pitch: usize,
}

impl<'a> MappedTexture<'a> {
    /// Wrap mapped memory. `memory` releases the map when dropped.
    pub fn new(
        memory: Box<dyn MappedMemory + 'a>,
        width: u32,
        height: u32,
        row_pitch: usize,
    ) -> Self {
        Self {
            memory,
            width,
            height,
            row_pitch,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    pub fn bytes(&self) -> &[u8] {
        &self.memory[..]
    }

    /// Bind a drawing target to the mapped memory.
    pub fn draw_target(&mut self, format: PixelFormat) -> Result<DrawTarget<'_>> {
        DrawTarget::new(
            &mut self.memory[..],
            self.width,
            self.height,
            self.row_pitch,
            format,
        )
    }

    /// Mark the written contents as final.
    pub fn commit(&mut self) {
        self.memory.commit();
    }

    /// Release the mapping.
    pub fn unmap(self) {}
}

impl fmt::Debug for MappedTexture<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedTexture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("row_pitch", &self.row_pitch)
            .finish()
    }
}
