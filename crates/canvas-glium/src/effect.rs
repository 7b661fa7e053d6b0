use anyhow::{bail, Result};
use canvas_core::{LayerTransform, ShaderConstantRect, Technique};
use gpu_interop::LayerEffect;

use crate::device::{GlPipeline, GliumDevice, GliumView};

/// Layer effect for [`GliumDevice`]. Applying a technique hands the current
/// constants to the device, which binds them as uniforms on the next draw.
#[derive(Debug)]
pub struct GliumEffect {
    device: GliumDevice,
    source: Option<GliumView>,
    layer_quad: ShaderConstantRect,
    texture_coords: ShaderConstantRect,
    transform: LayerTransform,
}

impl GliumEffect {
    pub fn new(device: &GliumDevice) -> Self {
        Self {
            device: device.clone(),
            source: None,
            layer_quad: ShaderConstantRect::new(0.0, 0.0, 0.0, 0.0),
            texture_coords: ShaderConstantRect::IDENTITY_UV,
            transform: LayerTransform::IDENTITY,
        }
    }
}

impl LayerEffect<GliumDevice> for GliumEffect {
    fn set_color_source(&mut self, view: &GliumView) {
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
            bail!("program {} has a single pass, got {pass}", technique.name());
        }
        if self.source.is_none() {
            bail!("program {} applied without a color source", technique.name());
        }
        self.device.set_pipeline(GlPipeline {
            technique,
            source: self.source.clone(),
            layer_quad: self.layer_quad,
            texture_coords: self.texture_coords,
            transform: self.transform,
        });
        Ok(())
    }
}
