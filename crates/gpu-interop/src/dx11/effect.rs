//! Layer shaders for the D3D11 compositor device.
//!
//! One vertex shader places a unit quad into `vLayerQuad` and maps its corners
//! to `vTextureCoords`. Three pixel shaders cover the color modes; the
//! sampler picks the filter. Together they realize every [`Technique`].

use std::ffi::c_void;

use anyhow::{anyhow, bail, Context as _, Result};
use canvas_core::{Filter, LayerTransform, ShaderConstantRect, Technique};
use tracing::{debug, error};
use windows::core::PCSTR;
use windows::Win32::Graphics::Direct3D::Fxc::*;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use super::bytes::AsBytes;
use super::device::{create_dynamic_cbuf, Dx11Device};
use crate::device::LayerEffect;

const LAYER_HLSL: &str = r#"
cbuffer LayerConstants : register(b0)
{
    float4x4 mLayerTransform;
    float4 vLayerQuad;
    float4 vTextureCoords;
    float fLayerOpacity;
    float3 pad;
};

Texture2D tRGB : register(t0);
SamplerState sSampler : register(s0);

struct VSOutput
{
    float4 position : SV_Position;
    float2 uv : TEXCOORD0;
};

VSOutput LayerQuadVS(float2 corner : POSITION)
{
    VSOutput output;
    float2 pos = vLayerQuad.xy + corner * vLayerQuad.zw;
    output.position = mul(mLayerTransform, float4(pos, 0.0, 1.0));
    output.uv = vTextureCoords.xy + corner * vTextureCoords.zw;
    return output;
}

float4 RGBAPremulPS(VSOutput input) : SV_Target
{
    return tRGB.Sample(sSampler, input.uv) * fLayerOpacity;
}

float4 RGBPremulPS(VSOutput input) : SV_Target
{
    float4 color = tRGB.Sample(sSampler, input.uv);
    color.a = 1.0;
    return color * fLayerOpacity;
}

float4 RGBANonPremulPS(VSOutput input) : SV_Target
{
    float4 color = tRGB.Sample(sSampler, input.uv);
    color.rgb *= color.a;
    return color * fLayerOpacity;
}
"#;

/// Unit quad corners in triangle-strip order.
const UNIT_QUAD: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

/// Mirrors `LayerConstants` in the HLSL above.
#[repr(C)]
#[derive(Clone, Copy)]
struct LayerConstants {
    layer_transform: [[f32; 4]; 4],
    layer_quad: [f32; 4],
    texture_coords: [f32; 4],
    opacity: f32,
    _pad: [f32; 3],
}

unsafe impl AsBytes for LayerConstants {}

/// Compile one HLSL entry point with the runtime compiler.
fn compile(entry: &str, target: &str) -> Result<Vec<u8>> {
    let entry_c = format!("{entry}\0");
    let target_c = format!("{target}\0");
    let mut code = None;
    let mut errors = None;

    let hr = unsafe {
        D3DCompile(
            LAYER_HLSL.as_ptr() as *const c_void,
            LAYER_HLSL.len(),
            PCSTR(b"canvas_layer.hlsl\0".as_ptr()),
            None,
            None,
            PCSTR(entry_c.as_ptr()),
            PCSTR(target_c.as_ptr()),
            D3DCOMPILE_OPTIMIZATION_LEVEL3,
            0,
            &mut code,
            Some(&mut errors as *mut _),
        )
    };

    if let Err(e) = hr {
        let message = errors
            .map(|blob: ID3DBlob| unsafe {
                let bytes = std::slice::from_raw_parts(
                    blob.GetBufferPointer() as *const u8,
                    blob.GetBufferSize(),
                );
                String::from_utf8_lossy(bytes).into_owned()
            })
            .unwrap_or_default();
        error!("HLSL compile of {entry} failed: {message}");
        bail!("D3DCompile({entry}, {target}) failed: {e}");
    }

    let blob = code.ok_or_else(|| anyhow!("D3DCompile({entry}) returned no bytecode"))?;
    let bytes = unsafe {
        std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize())
    };
    Ok(bytes.to_vec())
}

fn create_sampler(device: &ID3D11Device, filter: D3D11_FILTER) -> Result<ID3D11SamplerState> {
    let desc = D3D11_SAMPLER_DESC {
        Filter: filter,
        AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
        AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
        AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
        MaxAnisotropy: 1,
        ComparisonFunc: D3D11_COMPARISON_NEVER,
        MinLOD: 0.0,
        MaxLOD: f32::MAX,
        ..Default::default()
    };
    let mut sampler = None;
    unsafe { device.CreateSamplerState(&desc, Some(&mut sampler as *mut _)) }
        .context("CreateSamplerState")?;
    sampler.ok_or_else(|| anyhow!("D3D11 CreateSamplerState returned null"))
}

/// Layer effect for [`Dx11Device`].
pub struct Dx11Effect {
    device: Dx11Device,
    vs: ID3D11VertexShader,
    /// Indexed by color mode: premultiplied RGBA, premultiplied RGB,
    /// non-premultiplied RGBA.
    pixel_shaders: [ID3D11PixelShader; 3],
    input_layout: ID3D11InputLayout,
    quad_vb: ID3D11Buffer,
    point_sampler: ID3D11SamplerState,
    linear_sampler: ID3D11SamplerState,
    blend: ID3D11BlendState,
    constants: ID3D11Buffer,
    source: Option<ID3D11ShaderResourceView>,
    layer_quad: ShaderConstantRect,
    texture_coords: ShaderConstantRect,
    transform: LayerTransform,
}

impl Dx11Effect {
    pub fn new(device: &Dx11Device) -> Result<Self> {
        let d3d = device.device();

        let vs_bytecode = compile("LayerQuadVS", "vs_4_0")?;
        let mut vs = None;
        unsafe { d3d.CreateVertexShader(&vs_bytecode, None, Some(&mut vs as *mut _)) }
            .context("CreateVertexShader")?;
        let vs = vs.ok_or_else(|| anyhow!("D3D11 CreateVertexShader returned null"))?;

        let mut pixel_shaders = Vec::with_capacity(3);
        for entry in ["RGBAPremulPS", "RGBPremulPS", "RGBANonPremulPS"] {
            let bytecode = compile(entry, "ps_4_0")?;
            let mut ps = None;
            unsafe { d3d.CreatePixelShader(&bytecode, None, Some(&mut ps as *mut _)) }
                .with_context(|| format!("CreatePixelShader({entry})"))?;
            pixel_shaders.push(ps.ok_or_else(|| anyhow!("D3D11 CreatePixelShader returned null"))?);
        }
        let pixel_shaders: [ID3D11PixelShader; 3] = pixel_shaders
            .try_into()
            .map_err(|_| anyhow!("expected three pixel shaders"))?;

        let input_elements = [D3D11_INPUT_ELEMENT_DESC {
            SemanticName: PCSTR(b"POSITION\0".as_ptr()),
            SemanticIndex: 0,
            Format: DXGI_FORMAT_R32G32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: 0,
            InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        }];
        let mut input_layout = None;
        unsafe {
            d3d.CreateInputLayout(
                &input_elements,
                &vs_bytecode,
                Some(&mut input_layout as *mut _),
            )
        }
        .context("CreateInputLayout")?;
        let input_layout =
            input_layout.ok_or_else(|| anyhow!("D3D11 CreateInputLayout returned null"))?;

        let quad_data = UNIT_QUAD;
        let vb_desc = D3D11_BUFFER_DESC {
            ByteWidth: std::mem::size_of_val(&quad_data) as u32,
            Usage: D3D11_USAGE_IMMUTABLE,
            BindFlags: D3D11_BIND_VERTEX_BUFFER.0 as u32,
            ..Default::default()
        };
        let vb_init = D3D11_SUBRESOURCE_DATA {
            pSysMem: quad_data.as_ptr() as *const _,
            ..Default::default()
        };
        let mut quad_vb = None;
        unsafe { d3d.CreateBuffer(&vb_desc, Some(&vb_init), Some(&mut quad_vb as *mut _)) }
            .context("CreateBuffer(unit quad)")?;
        let quad_vb = quad_vb.ok_or_else(|| anyhow!("D3D11 CreateBuffer(VB) returned null"))?;

        let point_sampler = create_sampler(d3d, D3D11_FILTER_MIN_MAG_MIP_POINT)?;
        let linear_sampler = create_sampler(d3d, D3D11_FILTER_MIN_MAG_MIP_LINEAR)?;

        let mut blend_desc = D3D11_BLEND_DESC::default();
        blend_desc.RenderTarget[0] = D3D11_RENDER_TARGET_BLEND_DESC {
            BlendEnable: true.into(),
            SrcBlend: D3D11_BLEND_ONE,
            DestBlend: D3D11_BLEND_INV_SRC_ALPHA,
            BlendOp: D3D11_BLEND_OP_ADD,
            SrcBlendAlpha: D3D11_BLEND_ONE,
            DestBlendAlpha: D3D11_BLEND_INV_SRC_ALPHA,
            BlendOpAlpha: D3D11_BLEND_OP_ADD,
            RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
        };
        let mut blend = None;
        unsafe { d3d.CreateBlendState(&blend_desc, Some(&mut blend as *mut _)) }
            .context("CreateBlendState")?;
        let blend = blend.ok_or_else(|| anyhow!("D3D11 CreateBlendState returned null"))?;

        let constants = create_dynamic_cbuf(d3d, std::mem::size_of::<LayerConstants>())
            .ok_or_else(|| anyhow!("failed to create layer constant buffer"))?;

        debug!("D3D11 layer effect ready");

        Ok(Self {
            device: device.clone(),
            vs,
            pixel_shaders,
            input_layout,
            quad_vb,
            point_sampler,
            linear_sampler,
            blend,
            constants,
            source: None,
            layer_quad: ShaderConstantRect::new(0.0, 0.0, 0.0, 0.0),
            texture_coords: ShaderConstantRect::IDENTITY_UV,
            transform: LayerTransform::IDENTITY,
        })
    }

    fn pixel_shader(&self, technique: Technique) -> &ID3D11PixelShader {
        match (technique.premultiplied(), technique.samples_alpha()) {
            (true, true) => &self.pixel_shaders[0],
            (true, false) => &self.pixel_shaders[1],
            (false, _) => &self.pixel_shaders[2],
        }
    }

    fn sampler(&self, filter: Filter) -> &ID3D11SamplerState {
        match filter {
            Filter::Nearest => &self.point_sampler,
            Filter::Linear => &self.linear_sampler,
        }
    }
}

impl LayerEffect<Dx11Device> for Dx11Effect {
    fn set_color_source(&mut self, view: &ID3D11ShaderResourceView) {
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

        let constants = LayerConstants {
            layer_transform: self.transform.matrix,
            layer_quad: self.layer_quad.to_array(),
            texture_coords: self.texture_coords.to_array(),
            opacity: self.transform.opacity,
            _pad: [0.0; 3],
        };
        self.device
            .update_dynamic_buffer(&self.constants, constants.as_bytes())?;

        let ctx = self.device.context();
        unsafe {
            ctx.IASetInputLayout(&self.input_layout);
            let stride = std::mem::size_of::<[f32; 2]>() as u32;
            let offset = 0u32;
            ctx.IASetVertexBuffers(
                0,
                1,
                Some(&Some(self.quad_vb.clone())),
                Some(&stride),
                Some(&offset),
            );
            ctx.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP);

            ctx.VSSetShader(&self.vs, None);
            ctx.VSSetConstantBuffers(0, Some(&[Some(self.constants.clone())]));

            ctx.PSSetShader(self.pixel_shader(technique), None);
            ctx.PSSetConstantBuffers(0, Some(&[Some(self.constants.clone())]));
            ctx.PSSetShaderResources(0, Some(&[self.source.clone()]));
            ctx.PSSetSamplers(0, Some(&[Some(self.sampler(technique.filter()).clone())]));

            ctx.OMSetBlendState(&self.blend, None, 0xffff_ffff);
        }
        Ok(())
    }
}
