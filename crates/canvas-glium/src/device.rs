//! [`GliumDevice`]: the compositor device on the host's OpenGL context.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use anyhow::{anyhow, bail, Context as _, Result};
use canvas_core::{Filter, LayerTransform, ShareHandle, ShaderConstantRect, Technique};
use glium::backend::Context;
use glium::index::{NoIndices, PrimitiveType};
use glium::texture::{
    Dimensions, MipmapsOption, RawImage2d, Texture2d, UncompressedFloatFormat,
};
use glium::uniforms::{MagnifySamplerFilter, MinifySamplerFilter, SamplerWrapFunction};
use glium::{
    implement_vertex, uniform, Blend, BlendingFunction, DrawParameters,
    Frame, GlObject, LinearBlendingFactor, Program, Rect, Surface, VertexBuffer,
};
use gpu_interop::{CompositorDevice, MappedMemory, MappedTexture};
use tracing::{debug, error, trace, warn};

use crate::gl_backend::RawGlBackend;
use crate::glsl::{best_glsl_version, fragment_source, vertex_source};
use crate::validate_gl;

#[derive(Copy, Clone)]
struct Corner {
    corner: [f32; 2],
}

implement_vertex!(Corner, corner);

/// Unit quad corners in triangle-strip order.
const UNIT_QUAD: [Corner; 4] = [
    Corner { corner: [0.0, 0.0] },
    Corner { corner: [1.0, 0.0] },
    Corner { corner: [0.0, 1.0] },
    Corner { corner: [1.0, 1.0] },
];

/// A GL texture. Clones share the texture object.
#[derive(Clone)]
pub struct GliumTexture {
    texture: Rc<Texture2d>,
}

impl GliumTexture {
    pub fn texture(&self) -> &Texture2d {
        &self.texture
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }
}

impl fmt::Debug for GliumTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GliumTexture")
            .field("id", &self.texture.get_id())
            .field("size", &self.size())
            .finish()
    }
}

/// GL samples textures directly; the view keeps the texture alive while it
/// is bound as the color source.
#[derive(Debug, Clone)]
pub struct GliumView {
    texture: GliumTexture,
}

impl GliumView {
    pub fn texture(&self) -> &GliumTexture {
        &self.texture
    }
}

/// Effect state captured when a technique is applied.
#[derive(Debug, Clone)]
pub(crate) struct GlPipeline {
    pub(crate) technique: Technique,
    pub(crate) source: Option<GliumView>,
    pub(crate) layer_quad: ShaderConstantRect,
    pub(crate) texture_coords: ShaderConstantRect,
    pub(crate) transform: LayerTransform,
}

struct GlState {
    ctx: Rc<Context>,
    backend: Rc<RawGlBackend>,
    /// Indexed by [`Technique::index`].
    programs: Vec<Program>,
    quad: VertexBuffer<Corner>,
    pipeline: RefCell<Option<GlPipeline>>,
    host_fbo: Cell<u32>,
}

/// Compositor device on the host's current OpenGL context. Clones are
/// handles to the same device.
#[derive(Clone)]
pub struct GliumDevice {
    state: Rc<GlState>,
}

impl fmt::Debug for GliumDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GliumDevice")
            .field("size", &self.state.backend.size.get())
            .field("host_fbo", &self.state.host_fbo.get())
            .finish()
    }
}

impl GliumDevice {
    /// Wrap the GL context current on this thread and compile one program per
    /// [`Technique`]. `size` is the compositor's render target size.
    pub fn new(size: (u32, u32)) -> Result<Self> {
        let backend = Rc::new(RawGlBackend::new(size));

        debug!("BACKEND: {backend:?}");

        let ctx = unsafe {
            Context::new(
                backend.clone(),
                false,
                glium::debug::DebugCallbackBehavior::Ignore,
            )
        }
        .context("glium context over the host GL context")?;

        debug!("OPENGL_VERSION {}", ctx.get_opengl_version_string());

        let version = best_glsl_version(&*ctx)
            .ok_or_else(|| anyhow!("host GL context supports neither GLSL 1.40 nor 1.20"))?;
        debug!(?version, "compiling layer programs");

        let vertex = vertex_source(version);
        let mut programs = Vec::with_capacity(Technique::ALL.len());
        for technique in Technique::ALL {
            let fragment = fragment_source(version, technique);
            let program = Program::from_source(&ctx, &vertex, &fragment, None)
                .with_context(|| format!("compiling {}", technique.name()))?;
            programs.push(program);
        }

        let quad = VertexBuffer::immutable(&ctx, &UNIT_QUAD).context("unit quad buffer")?;

        Ok(Self {
            state: Rc::new(GlState {
                ctx,
                backend,
                programs,
                quad,
                pipeline: RefCell::new(None),
                host_fbo: Cell::new(0),
            }),
        })
    }

    /// The glium context, for hosts that render other content with it.
    pub fn context(&self) -> &Rc<Context> {
        &self.state.ctx
    }

    /// Framebuffer rebound after every draw.
    pub fn set_host_framebuffer(&self, fbo: u32) {
        self.state.host_fbo.set(fbo);
    }

    pub fn resize(&self, size: (u32, u32)) {
        glium::backend::Backend::resize(&*self.state.backend, size);
    }

    pub(crate) fn set_pipeline(&self, pipeline: GlPipeline) {
        *self.state.pipeline.borrow_mut() = Some(pipeline);
    }

    fn sync_state(&self) {
        if let Err(e) = unsafe { self.state.ctx.rebuild(self.state.backend.clone()) } {
            warn!("glium context rebuild failed: {e}");
        }
    }

    fn draw_pipeline(&self, pipeline: &GlPipeline, vertex_count: u32, start_vertex: u32) -> Result<()> {
        let state = &self.state;
        let source = pipeline
            .source
            .as_ref()
            .ok_or_else(|| anyhow!("no color source bound"))?;
        let program = &state.programs[pipeline.technique.index()];

        let start = start_vertex as usize;
        let vertices = state
            .quad
            .slice(start..start + vertex_count as usize)
            .ok_or_else(|| anyhow!("vertex range {start}+{vertex_count} outside the layer quad"))?;

        let (magnify, minify) = match pipeline.technique.filter() {
            Filter::Nearest => (MagnifySamplerFilter::Nearest, MinifySamplerFilter::Nearest),
            Filter::Linear => (MagnifySamplerFilter::Linear, MinifySamplerFilter::Linear),
        };
        let sampler = source
            .texture
            .texture()
            .sampled()
            .magnify_filter(magnify)
            .minify_filter(minify)
            .wrap_function(SamplerWrapFunction::Clamp);

        let uniforms = uniform! {
            mLayerTransform: pipeline.transform.matrix,
            vLayerQuad: pipeline.layer_quad.to_array(),
            vTextureCoords: pipeline.texture_coords.to_array(),
            fLayerOpacity: pipeline.transform.opacity,
            tRGB: sampler,
        };

        let premultiplied_over = BlendingFunction::Addition {
            source: LinearBlendingFactor::One,
            destination: LinearBlendingFactor::OneMinusSourceAlpha,
        };
        let params = DrawParameters {
            blend: Blend {
                color: premultiplied_over,
                alpha: premultiplied_over,
                constant_value: (0.0, 0.0, 0.0, 0.0),
            },
            ..Default::default()
        };

        let mut frame = Frame::new(state.ctx.clone(), state.backend.size.get());
        let drawn = frame
            .draw(
                vertices,
                NoIndices(PrimitiveType::TriangleStrip),
                program,
                &uniforms,
                &params,
            )
            .context("layer draw");
        frame.finish().context("finishing layer frame")?;
        drawn
    }
}

/// CPU staging for a mapped texture, uploaded when dropped if committed.
struct GlStaging<'a> {
    texture: &'a Texture2d,
    data: Vec<u8>,
    width: u32,
    height: u32,
    committed: bool,
}

impl Deref for GlStaging<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for GlStaging<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl MappedMemory for GlStaging<'_> {
    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for GlStaging<'_> {
    fn drop(&mut self) {
        if !self.committed {
            trace!(id = self.texture.get_id(), "uncommitted staging dropped");
            return;
        }
        let data = std::mem::take(&mut self.data);
        let rect = Rect {
            left: 0,
            bottom: 0,
            width: self.width,
            height: self.height,
        };
        self.texture
            .write(rect, RawImage2d::from_raw_rgba(data, (self.width, self.height)));
        trace!(id = self.texture.get_id(), "staging uploaded");
    }
}

impl CompositorDevice for GliumDevice {
    type Texture = GliumTexture;
    type View = GliumView;

    fn create_dynamic_texture(&self, width: u32, height: u32) -> Result<GliumTexture> {
        let texture = Texture2d::empty_with_format(
            &self.state.ctx,
            UncompressedFloatFormat::U8U8U8U8,
            MipmapsOption::NoMipmap,
            width,
            height,
        )
        .with_context(|| format!("Texture2d({width}x{height})"))?;
        Ok(GliumTexture {
            texture: Rc::new(texture),
        })
    }

    fn create_view(&self, texture: &GliumTexture) -> Result<GliumView> {
        Ok(GliumView {
            texture: texture.clone(),
        })
    }

    /// Share handles on GL are texture names in the compositor's share group.
    fn open_shared_texture(&self, handle: ShareHandle) -> Result<GliumTexture> {
        let name = u32::try_from(handle.0)
            .map_err(|_| anyhow!("share handle {:#x} is not a GL texture name", handle.0))?;
        let size = unsafe { validate_gl::texture_size(name) };
        self.sync_state();
        let Some((width, height)) = size else {
            bail!("GL texture {name} does not exist or is empty");
        };

        let texture = unsafe {
            Texture2d::from_id(
                &self.state.ctx,
                UncompressedFloatFormat::U8U8U8U8,
                name,
                false,
                MipmapsOption::NoMipmap,
                Dimensions::Texture2d { width, height },
            )
        };
        Ok(GliumTexture {
            texture: Rc::new(texture),
        })
    }

    fn map_write_discard<'a>(&'a self, texture: &'a GliumTexture) -> Result<MappedTexture<'a>> {
        let (width, height) = texture.size();
        let row_pitch = width as usize * 4;
        Ok(MappedTexture::new(
            Box::new(GlStaging {
                texture: texture.texture(),
                data: vec![0; row_pitch * height as usize],
                width,
                height,
                committed: false,
            }),
            width,
            height,
            row_pitch,
        ))
    }

    fn draw(&self, vertex_count: u32, start_vertex: u32) {
        let Some(pipeline) = self.state.pipeline.borrow().clone() else {
            warn!("draw issued without an applied technique");
            return;
        };

        self.sync_state();
        if let Err(err) = self.draw_pipeline(&pipeline, vertex_count, start_vertex) {
            error!("Render ERROR: {err:?}");
        }
        unsafe { validate_gl::restore_host_state(self.state.host_fbo.get()) };
    }
}
