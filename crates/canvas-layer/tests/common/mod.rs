//! Producer doubles shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};
use canvas_core::{
    DrawTarget, DrawingSurface, LayerConfig, OffscreenContext, ShareHandle, SharedSurface,
    SharedSurfaceKind, SnapshotImage,
};
use canvas_layer::CanvasLayer;
use gpu_interop::soft::{SoftDevice, SoftEffect, SoftTexture};
use image::{Rgba, RgbaImage};

pub type SoftLayer = CanvasLayer<SoftDevice, SoftEffect>;

pub fn init_logging() {
    canvas_core::logging::init_for_tests();
}

pub fn soft_layer(device: &SoftDevice, config: LayerConfig) -> SoftLayer {
    init_logging();
    CanvasLayer::new(device.clone(), SoftEffect::new(device), config)
}

pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(rgba))
}

/// A CPU canvas whose next snapshot can be swapped or made to fail.
pub struct FakeCanvas {
    image: RefCell<Option<RgbaImage>>,
    pub flushes: Cell<u32>,
    pub snapshots: Cell<u32>,
}

impl FakeCanvas {
    pub fn new(image: RgbaImage) -> Rc<Self> {
        Rc::new(Self {
            image: RefCell::new(Some(image)),
            flushes: Cell::new(0),
            snapshots: Cell::new(0),
        })
    }

    pub fn paint(&self, image: RgbaImage) {
        *self.image.borrow_mut() = Some(image);
    }

    /// Make every later snapshot fail.
    pub fn break_snapshots(&self) {
        *self.image.borrow_mut() = None;
    }
}

impl DrawingSurface for FakeCanvas {
    fn snapshot(&self) -> Result<SnapshotImage> {
        self.snapshots.set(self.snapshots.get() + 1);
        self.image
            .borrow()
            .clone()
            .ok_or_else(|| anyhow!("snapshot unavailable"))
    }

    fn flush(&self) {
        self.flushes.set(self.flushes.get() + 1);
    }
}

/// A published frame backed by a soft texture.
pub struct FakeSurface {
    kind: SharedSurfaceKind,
    texture: SoftTexture,
    handle: Option<ShareHandle>,
    synced: bool,
    pub fail_readback: Cell<bool>,
    pub waits: Cell<u32>,
    /// Producer calls in order: `wait`, `share_handle`, `read_pixels`.
    calls: RefCell<Vec<&'static str>>,
}

impl FakeSurface {
    /// A shareable frame filled with `rgba`, published on `device`.
    pub fn shared(device: &SoftDevice, size: (u32, u32), rgba: [u8; 4]) -> Rc<Self> {
        let texture = device.create_texture(size.0, size.1).unwrap();
        texture
            .write_pixels(&rgba.repeat((size.0 * size.1) as usize))
            .unwrap();
        let handle = device.share_texture(&texture);
        Rc::new(Self {
            kind: SharedSurfaceKind::ShareHandle,
            texture,
            handle: Some(handle),
            synced: true,
            fail_readback: Cell::new(false),
            waits: Cell::new(0),
            calls: RefCell::new(Vec::new()),
        })
    }

    /// A frame the compositor cannot open, filled with `rgba`.
    pub fn basic(device: &SoftDevice, size: (u32, u32), rgba: [u8; 4]) -> Rc<Self> {
        let texture = device.create_texture(size.0, size.1).unwrap();
        texture
            .write_pixels(&rgba.repeat((size.0 * size.1) as usize))
            .unwrap();
        Rc::new(Self {
            kind: SharedSurfaceKind::Basic,
            texture,
            handle: None,
            synced: true,
            fail_readback: Cell::new(false),
            waits: Cell::new(0),
            calls: RefCell::new(Vec::new()),
        })
    }

    /// A shareable frame whose sync wait never completes.
    pub fn unsynced(device: &SoftDevice, size: (u32, u32)) -> Rc<Self> {
        let texture = device.create_texture(size.0, size.1).unwrap();
        let handle = device.share_texture(&texture);
        Rc::new(Self {
            kind: SharedSurfaceKind::ShareHandle,
            texture,
            handle: Some(handle),
            synced: false,
            fail_readback: Cell::new(false),
            waits: Cell::new(0),
            calls: RefCell::new(Vec::new()),
        })
    }

    pub fn texture(&self) -> &SoftTexture {
        &self.texture
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }
}

impl SharedSurface for FakeSurface {
    fn kind(&self) -> SharedSurfaceKind {
        self.kind
    }

    fn size(&self) -> (u32, u32) {
        self.texture.size()
    }

    fn wait_sync(&self) -> bool {
        self.waits.set(self.waits.get() + 1);
        self.calls.borrow_mut().push("wait");
        self.synced
    }

    fn share_handle(&self) -> Option<ShareHandle> {
        self.calls.borrow_mut().push("share_handle");
        self.handle
    }

    fn read_pixels(&self, target: &mut DrawTarget<'_>) -> Result<()> {
        self.calls.borrow_mut().push("read_pixels");
        if self.fail_readback.get() {
            bail!("readback failed");
        }
        let (width, height) = self.texture.size();
        target.copy_from_rgba(&self.texture.read_pixels(), width, height, width as usize * 4)
    }
}

/// An offscreen GPU context whose front surface tests swap per frame.
pub struct FakeContext {
    offscreen: bool,
    front: RefCell<Option<Rc<dyn SharedSurface>>>,
}

impl FakeContext {
    pub fn offscreen() -> Rc<Self> {
        Rc::new(Self {
            offscreen: true,
            front: RefCell::new(None),
        })
    }

    pub fn onscreen() -> Rc<Self> {
        Rc::new(Self {
            offscreen: false,
            front: RefCell::new(None),
        })
    }

    pub fn present(&self, surface: Rc<dyn SharedSurface>) {
        *self.front.borrow_mut() = Some(surface);
    }
}

impl OffscreenContext for FakeContext {
    fn is_offscreen(&self) -> bool {
        self.offscreen
    }

    fn front_surface(&self) -> Option<Rc<dyn SharedSurface>> {
        self.front.borrow().clone()
    }
}

/// Records transaction callbacks in order.
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    pub events: Vec<&'static str>,
}

impl canvas_core::TransactionCallbacks for RecordingCallbacks {
    fn will_render(&mut self) {
        self.events.push("will_render");
    }

    fn did_render(&mut self) {
        self.events.push("did_render");
    }
}
