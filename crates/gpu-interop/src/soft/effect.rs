use anyhow::{bail, Result};
use canvas_core::{LayerTransform, ShaderConstantRect, Technique};

use super::device::{PipelineState, SoftDevice, SoftView};
use crate::device::LayerEffect;

/// Layer effect for [`SoftDevice`]. Applying a technique snapshots the
/// constants into the device, which records them on the next draw.
#[derive(Debug)]
pub struct SoftEffect {
    device: SoftDevice,
    source: Option<SoftView>,
    layer_quad: ShaderConstantRect,
    texture_coords: ShaderConstantRect,
    transform: LayerTransform,
}

impl SoftEffect {
    pub fn new(device: &SoftDevice) -> Self {
        Self {
            device: device.clone(),
            source: None,
            layer_quad: ShaderConstantRect::new(0.0, 0.0, 0.0, 0.0),
            texture_coords: ShaderConstantRect::IDENTITY_UV,
            transform: LayerTransform::IDENTITY,
        }
    }
}

impl LayerEffect<SoftDevice> for SoftEffect {
    fn set_color_source(&mut self, view: &SoftView) {
        self.source = Some(view.clone());
    }

    fn set_layer_quad(&mut self, quad: ShaderConstantRect) {
        self.layer_quad = quad;
    }

    fn texture_coords(&self) -> ShaderConstantRect {
        self.texture_coords
    }

    fn set_texture_coords(&mut self, coords: ShaderConstantRect) {
        self.texture_coords = coords;
    }

    fn set_transform_and_opacity(&mut self, transform: &LayerTransform) {
        self.transform = *transform;
    }

    fn apply(&mut self, technique: Technique, pass: u32) -> Result<()> {
        if pass != 0 {
            bail!("technique {} has a single pass, got {pass}", technique.name());
        }
        if self.device.apply_fault() {
            bail!("technique application disabled by fault switch");
        }
        self.device.set_pipeline(PipelineState {
            technique,
            source: self.source.clone(),
            layer_quad: self.layer_quad,
            texture_coords: self.texture_coords,
            transform: self.transform,
        });
        Ok(())
    }
}
