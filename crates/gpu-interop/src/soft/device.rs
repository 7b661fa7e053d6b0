//! [`SoftDevice`]: textures in host memory, draws appended to a bounded log.

use std::cell::{RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};
use canvas_core::{LayerTransform, ShareHandle, ShaderConstantRect, Technique};
use tracing::{debug, trace, warn};

use crate::device::{CompositorDevice, MappedMemory, MappedTexture};

/// Row pitch alignment, matching what GPU drivers commonly hand out.
const ROW_ALIGNMENT: usize = 64;

/// Draws kept in the log; older ones are dropped.
pub const DRAW_LOG_CAPACITY: usize = 256;

/// Fill byte for freshly mapped memory, standing in for discarded contents.
pub const DISCARD_FILL: u8 = 0xCD;

/// Failure switches. A set switch makes every matching call fail until it is
/// cleared again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftFaults {
    pub create_texture: bool,
    pub create_view: bool,
    pub open_shared: bool,
    pub map: bool,
    pub apply: bool,
}

/// Number of successful device operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftCounters {
    pub textures_created: u64,
    pub views_created: u64,
    pub shared_opens: u64,
    pub maps: u64,
    pub draws: u64,
}

/// Effect state captured when a technique is applied, replayed on draw.
#[derive(Debug, Clone)]
pub(crate) struct PipelineState {
    pub(crate) technique: Technique,
    pub(crate) source: Option<SoftView>,
    pub(crate) layer_quad: ShaderConstantRect,
    pub(crate) texture_coords: ShaderConstantRect,
    pub(crate) transform: LayerTransform,
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub technique: Technique,
    /// Texture behind the bound color source, if any.
    pub texture_id: Option<u64>,
    pub view_id: Option<u64>,
    pub layer_quad: ShaderConstantRect,
    pub texture_coords: ShaderConstantRect,
    pub transform: LayerTransform,
    pub vertex_count: u32,
    pub start_vertex: u32,
}

struct TextureStorage {
    id: u64,
    width: u32,
    height: u32,
    row_pitch: usize,
    pixels: RefCell<Vec<u8>>,
}

/// A texture in host memory. Clones share storage.
#[derive(Clone)]
pub struct SoftTexture {
    storage: Rc<TextureStorage>,
}

impl SoftTexture {
    pub fn id(&self) -> u64 {
        self.storage.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.storage.width, self.storage.height)
    }

    /// Live handles to this texture, including views onto it.
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.storage)
    }

    /// Tightly packed RGBA rows, top row first.
    pub fn read_pixels(&self) -> Vec<u8> {
        let storage = &self.storage;
        let row_bytes = storage.width as usize * 4;
        let pixels = storage.pixels.borrow();
        let mut out = Vec::with_capacity(row_bytes * storage.height as usize);
        for row in pixels.chunks(storage.row_pitch).take(storage.height as usize) {
            out.extend_from_slice(&row[..row_bytes]);
        }
        out
    }

    /// Overwrite the texture with tightly packed RGBA rows, the way a
    /// producing context would render into it.
    pub fn write_pixels(&self, rgba: &[u8]) -> Result<()> {
        let storage = &self.storage;
        let row_bytes = storage.width as usize * 4;
        if rgba.len() != row_bytes * storage.height as usize {
            bail!(
                "expected {} bytes for a {}x{} texture, got {}",
                row_bytes * storage.height as usize,
                storage.width,
                storage.height,
                rgba.len()
            );
        }
        let mut pixels = storage
            .pixels
            .try_borrow_mut()
            .map_err(|_| anyhow!("texture {} is mapped", storage.id))?;
        for (dst, src) in pixels
            .chunks_mut(storage.row_pitch)
            .zip(rgba.chunks(row_bytes))
        {
            dst[..row_bytes].copy_from_slice(src);
        }
        Ok(())
    }
}

impl fmt::Debug for SoftTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftTexture")
            .field("id", &self.storage.id)
            .field("size", &self.size())
            .finish()
    }
}

/// A shader-resource view onto a [`SoftTexture`].
#[derive(Debug, Clone)]
pub struct SoftView {
    id: u64,
    texture: SoftTexture,
}

impl SoftView {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn texture(&self) -> &SoftTexture {
        &self.texture
    }
}

#[derive(Default)]
struct SoftState {
    next_id: u64,
    faults: SoftFaults,
    counters: SoftCounters,
    shared: HashMap<ShareHandle, SoftTexture>,
    pipeline: Option<PipelineState>,
    draws: VecDeque<DrawRecord>,
}

impl SoftState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory compositor device. Clones are handles to the same device.
#[derive(Clone, Default)]
pub struct SoftDevice {
    state: Rc<RefCell<SoftState>>,
}

impl SoftDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> SoftFaults {
        self.state.borrow().faults
    }

    pub fn set_faults(&self, faults: SoftFaults) {
        self.state.borrow_mut().faults = faults;
    }

    pub fn counters(&self) -> SoftCounters {
        self.state.borrow().counters
    }

    /// The most recent draws, oldest first. At most [`DRAW_LOG_CAPACITY`]
    /// are kept; `counters().draws` has the total.
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state.borrow().draws.iter().cloned().collect()
    }

    /// Drain the draw log.
    pub fn take_draws(&self) -> Vec<DrawRecord> {
        self.state.borrow_mut().draws.drain(..).collect()
    }

    pub fn last_draw(&self) -> Option<DrawRecord> {
        self.state.borrow().draws.back().cloned()
    }

    /// Create a texture that another API could render into and publish.
    pub fn create_texture(&self, width: u32, height: u32) -> Result<SoftTexture> {
        if width == 0 || height == 0 {
            bail!("cannot create a {width}x{height} texture");
        }
        let mut state = self.state.borrow_mut();
        if state.faults.create_texture {
            bail!("texture creation disabled by fault switch");
        }
        let row_pitch = (width as usize * 4).next_multiple_of(ROW_ALIGNMENT);
        let id = state.allocate_id();
        state.counters.textures_created += 1;
        debug!(id, width, height, row_pitch, "soft texture created");
        Ok(SoftTexture {
            storage: Rc::new(TextureStorage {
                id,
                width,
                height,
                row_pitch,
                pixels: RefCell::new(vec![0; row_pitch * height as usize]),
            }),
        })
    }

    /// Publish `texture` under a fresh shared handle.
    pub fn share_texture(&self, texture: &SoftTexture) -> ShareHandle {
        let mut state = self.state.borrow_mut();
        let handle = ShareHandle(state.allocate_id());
        state.shared.insert(handle, texture.clone());
        handle
    }

    /// Withdraw a shared handle; later opens of it fail.
    pub fn revoke_share(&self, handle: ShareHandle) {
        self.state.borrow_mut().shared.remove(&handle);
    }

    pub(crate) fn set_pipeline(&self, pipeline: PipelineState) {
        self.state.borrow_mut().pipeline = Some(pipeline);
    }

    pub(crate) fn apply_fault(&self) -> bool {
        self.state.borrow().faults.apply
    }
}

impl fmt::Debug for SoftDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SoftDevice")
            .field("faults", &state.faults)
            .field("counters", &state.counters)
            .field("shared", &state.shared.len())
            .finish()
    }
}

/// A mapped soft texture. Writes go to a staging copy that starts out
/// discarded and replaces the texture's pixels only once committed.
struct SoftMapping<'a> {
    id: u64,
    pixels: RefMut<'a, Vec<u8>>,
    staging: Vec<u8>,
    committed: bool,
}

impl Deref for SoftMapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.staging
    }
}

impl DerefMut for SoftMapping<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.staging
    }
}

impl MappedMemory for SoftMapping<'_> {
    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for SoftMapping<'_> {
    fn drop(&mut self) {
        if self.committed {
            self.pixels.copy_from_slice(&self.staging);
        } else {
            trace!(id = self.id, "uncommitted soft mapping dropped");
        }
    }
}

impl CompositorDevice for SoftDevice {
    type Texture = SoftTexture;
    type View = SoftView;

    fn create_dynamic_texture(&self, width: u32, height: u32) -> Result<SoftTexture> {
        self.create_texture(width, height)
    }

    fn create_view(&self, texture: &SoftTexture) -> Result<SoftView> {
        let mut state = self.state.borrow_mut();
        if state.faults.create_view {
            bail!("view creation disabled by fault switch");
        }
        let id = state.allocate_id();
        state.counters.views_created += 1;
        Ok(SoftView {
            id,
            texture: texture.clone(),
        })
    }

    fn open_shared_texture(&self, handle: ShareHandle) -> Result<SoftTexture> {
        let mut state = self.state.borrow_mut();
        if state.faults.open_shared {
            bail!("shared handle {:#x} could not be opened", handle.0);
        }
        let texture = state
            .shared
            .get(&handle)
            .cloned()
            .ok_or_else(|| anyhow!("unknown shared handle {:#x}", handle.0))?;
        state.counters.shared_opens += 1;
        Ok(texture)
    }

    fn map_write_discard<'a>(&'a self, texture: &'a SoftTexture) -> Result<MappedTexture<'a>> {
        if self.state.borrow().faults.map {
            bail!("map disabled by fault switch");
        }
        let storage = &texture.storage;
        let pixels = storage
            .pixels
            .try_borrow_mut()
            .map_err(|_| anyhow!("texture {} is already mapped", storage.id))?;
        let staging = vec![DISCARD_FILL; pixels.len()];
        self.state.borrow_mut().counters.maps += 1;
        trace!(id = storage.id, "soft texture mapped");
        Ok(MappedTexture::new(
            Box::new(SoftMapping {
                id: storage.id,
                pixels,
                staging,
                committed: false,
            }),
            storage.width,
            storage.height,
            storage.row_pitch,
        ))
    }

    fn draw(&self, vertex_count: u32, start_vertex: u32) {
        let mut state = self.state.borrow_mut();
        let Some(pipeline) = state.pipeline.clone() else {
            warn!("draw issued without an applied technique");
            return;
        };
        state.counters.draws += 1;
        if state.draws.len() == DRAW_LOG_CAPACITY {
            state.draws.pop_front();
        }
        state.draws.push_back(DrawRecord {
            technique: pipeline.technique,
            texture_id: pipeline.source.as_ref().map(|v| v.texture().id()),
            view_id: pipeline.source.as_ref().map(SoftView::id),
            layer_quad: pipeline.layer_quad,
            texture_coords: pipeline.texture_coords,
            transform: pipeline.transform,
            vertex_count,
            start_vertex,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soft::SoftEffect;
    use crate::LayerEffect;
    use canvas_core::PixelFormat;

    #[test]
    fn mapped_writes_land_in_texture() {
        let device = SoftDevice::new();
        let texture = device.create_dynamic_texture(3, 2).unwrap();
        {
            let mut mapped = device.map_write_discard(&texture).unwrap();
            assert!(mapped.row_pitch() >= 12);
            mapped
                .draw_target(PixelFormat::Rgba8)
                .unwrap()
                .fill([10, 20, 30, 255]);
            mapped.commit();
        }
        assert_eq!(texture.read_pixels(), [10u8, 20, 30, 255].repeat(6));
        assert_eq!(device.counters().maps, 1);
    }

    #[test]
    fn a_mapped_texture_cannot_be_mapped_again() {
        let device = SoftDevice::new();
        let texture = device.create_dynamic_texture(1, 1).unwrap();
        let first = device.map_write_discard(&texture).unwrap();
        assert!(device.map_write_discard(&texture).is_err());
        first.unmap();
        assert!(device.map_write_discard(&texture).is_ok());
    }

    #[test]
    fn shared_handles_alias_producer_memory() {
        let device = SoftDevice::new();
        let producer = device.create_texture(1, 1).unwrap();
        let handle = device.share_texture(&producer);
        let opened = device.open_shared_texture(handle).unwrap();
        producer.write_pixels(&[1, 2, 3, 4]).unwrap();
        assert_eq!(opened.read_pixels(), vec![1, 2, 3, 4]);

        device.revoke_share(handle);
        assert!(device.open_shared_texture(handle).is_err());
    }

    #[test]
    fn fault_switches_fail_operations() {
        let device = SoftDevice::new();
        let texture = device.create_dynamic_texture(1, 1).unwrap();
        device.set_faults(SoftFaults {
            create_view: true,
            map: true,
            ..SoftFaults::default()
        });
        assert!(device.create_view(&texture).is_err());
        assert!(device.map_write_discard(&texture).is_err());
        assert_eq!(device.counters().views_created, 0);
    }

    #[test]
    fn uncommitted_writes_are_dropped() {
        let device = SoftDevice::new();
        let texture = device.create_dynamic_texture(1, 1).unwrap();
        texture.write_pixels(&[1, 2, 3, 4]).unwrap();
        {
            let mut mapped = device.map_write_discard(&texture).unwrap();
            mapped
                .draw_target(PixelFormat::Rgba8)
                .unwrap()
                .fill([9, 9, 9, 9]);
        }
        assert_eq!(texture.read_pixels(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn mapping_discards_previous_contents() {
        let device = SoftDevice::new();
        let texture = device.create_dynamic_texture(2, 1).unwrap();
        texture.write_pixels(&[7; 8]).unwrap();
        {
            let mut mapped = device.map_write_discard(&texture).unwrap();
            assert!(mapped.bytes().iter().all(|&b| b == DISCARD_FILL));
            mapped.commit();
        }
        assert_eq!(texture.read_pixels(), vec![DISCARD_FILL; 8]);
    }

    #[test]
    fn draw_log_keeps_only_recent_draws() {
        let device = SoftDevice::new();
        let mut effect = SoftEffect::new(&device);
        effect.apply(Technique::PremulRgbaLinear, 0).unwrap();
        for _ in 0..DRAW_LOG_CAPACITY * 4 {
            device.draw(4, 0);
        }
        assert_eq!(device.draws().len(), DRAW_LOG_CAPACITY);
        assert_eq!(device.counters().draws, DRAW_LOG_CAPACITY as u64 * 4);

        assert_eq!(device.take_draws().len(), DRAW_LOG_CAPACITY);
        assert!(device.draws().is_empty());
        assert!(device.last_draw().is_none());
    }

    #[test]
    fn draw_without_technique_is_dropped() {
        let device = SoftDevice::new();
        device.draw(4, 0);
        assert!(device.draws().is_empty());
    }
}
