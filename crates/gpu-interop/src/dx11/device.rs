//! D3D11 compositor device.
//!
//! Holds the D3D11 device and immediate context and implements
//! [`CompositorDevice`] on them. Effect state (shaders, constant buffer,
//! samplers) lives in [`Dx11Effect`](super::Dx11Effect).

use std::ffi::c_void;
use std::ops::{Deref, DerefMut};

use anyhow::{anyhow, Context as _, Result};
use canvas_core::ShareHandle;
use tracing::{debug, error, trace};
use windows::Win32::Foundation::{HANDLE, HMODULE};
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::device::{CompositorDevice, MappedMemory, MappedTexture};

/// A D3D11 device with its immediate context.
#[derive(Clone)]
pub struct Dx11Device {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
}

impl Dx11Device {
    /// Create a new D3D11 device using hardware acceleration, falling back to
    /// WARP if hardware is unavailable (e.g. CI/headless environments).
    ///
    /// Returns `None` if D3D11 is unavailable with any driver type.
    pub fn new() -> Option<Self> {
        let mut device = None;
        let mut context = None;

        let driver_types = [D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_WARP];
        let mut created = false;

        for &driver_type in &driver_types {
            let hr = unsafe {
                D3D11CreateDevice(
                    None,
                    driver_type,
                    HMODULE::default(),
                    D3D11_CREATE_DEVICE_SINGLETHREADED | D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                    Some(&[D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_10_1, D3D_FEATURE_LEVEL_10_0]),
                    D3D11_SDK_VERSION,
                    Some(&mut device as *mut _),
                    None,
                    Some(&mut context as *mut _),
                )
            };
            if hr.is_ok() {
                debug!("D3D11 device created with driver type {:?}", driver_type);
                created = true;
                break;
            }
        }

        if !created {
            error!("Failed to create D3D11 device with any driver type");
            return None;
        }

        Some(Self {
            device: device?,
            context: context?,
        })
    }

    /// Wrap the compositor's existing device and immediate context.
    pub fn from_parts(device: ID3D11Device, context: ID3D11DeviceContext) -> Self {
        Self { device, context }
    }

    /// Borrow the underlying `ID3D11Device`.
    pub fn device(&self) -> &ID3D11Device {
        &self.device
    }

    /// Borrow the immediate device context.
    pub fn context(&self) -> &ID3D11DeviceContext {
        &self.context
    }

    /// Map a dynamic buffer, copy `data` into it, and unmap.
    pub fn update_dynamic_buffer(&self, buffer: &ID3D11Buffer, data: &[u8]) -> Result<()> {
        unsafe {
            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            self.context
                .Map(buffer, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))
                .context("Map(constant buffer)")?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.pData as *mut u8, data.len());
            self.context.Unmap(buffer, 0);
        }
        Ok(())
    }
}

/// Create a dynamic constant buffer of the given size (rounded up to 16-byte
/// alignment).
pub fn create_dynamic_cbuf(device: &ID3D11Device, size: usize) -> Option<ID3D11Buffer> {
    let aligned_size = (size + 15) & !15;
    let desc = D3D11_BUFFER_DESC {
        ByteWidth: aligned_size as u32,
        Usage: D3D11_USAGE_DYNAMIC,
        BindFlags: D3D11_BIND_CONSTANT_BUFFER.0 as u32,
        CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
        ..Default::default()
    };
    let mut buf = None;
    unsafe { device.CreateBuffer(&desc, None, Some(&mut buf as *mut _)) }.ok()?;
    buf
}

/// Mapped subresource 0 of a texture; unmaps on drop.
struct Dx11Mapping<'a> {
    context: &'a ID3D11DeviceContext,
    texture: &'a ID3D11Texture2D,
    data: &'a mut [u8],
}

impl Deref for Dx11Mapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data
    }
}

impl DerefMut for Dx11Mapping<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data
    }
}

impl MappedMemory for Dx11Mapping<'_> {}

impl Drop for Dx11Mapping<'_> {
    fn drop(&mut self) {
        unsafe { self.context.Unmap(self.texture, 0) };
        trace!("D3D11 texture unmapped");
    }
}

impl CompositorDevice for Dx11Device {
    type Texture = ID3D11Texture2D;
    type View = ID3D11ShaderResourceView;

    fn create_dynamic_texture(&self, width: u32, height: u32) -> Result<ID3D11Texture2D> {
        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            MiscFlags: 0,
        };

        let mut texture = None;
        unsafe {
            self.device
                .CreateTexture2D(&desc, None, Some(&mut texture as *mut _))
        }
        .with_context(|| format!("CreateTexture2D({width}x{height}, dynamic)"))?;
        texture.ok_or_else(|| anyhow!("D3D11 CreateTexture2D returned null"))
    }

    fn create_view(&self, texture: &ID3D11Texture2D) -> Result<ID3D11ShaderResourceView> {
        let mut srv = None;
        unsafe {
            self.device
                .CreateShaderResourceView(texture, None, Some(&mut srv as *mut _))
        }
        .context("CreateShaderResourceView")?;
        srv.ok_or_else(|| anyhow!("D3D11 CreateShaderResourceView returned null"))
    }

    fn open_shared_texture(&self, handle: ShareHandle) -> Result<ID3D11Texture2D> {
        let handle = HANDLE(handle.0 as usize as *mut c_void);
        unsafe { self.device.OpenSharedResource::<ID3D11Texture2D>(handle) }
            .with_context(|| format!("OpenSharedResource({:?})", handle.0))
    }

    fn map_write_discard<'a>(
        &'a self,
        texture: &'a ID3D11Texture2D,
    ) -> Result<MappedTexture<'a>> {
        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            self.context
                .Map(texture, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))
        }
        .context("Map(texture, WRITE_DISCARD)")?;

        let row_pitch = mapped.RowPitch as usize;
        let len = row_pitch * desc.Height as usize;
        // SAFETY: the driver guarantees RowPitch * Height writable bytes for
        // subresource 0 until Unmap, which only Dx11Mapping::drop calls.
        let data = unsafe { std::slice::from_raw_parts_mut(mapped.pData as *mut u8, len) };

        Ok(MappedTexture::new(
            Box::new(Dx11Mapping {
                context: &self.context,
                texture,
                data,
            }),
            desc.Width,
            desc.Height,
            row_pitch,
        ))
    }

    fn draw(&self, vertex_count: u32, start_vertex: u32) {
        unsafe { self.context.Draw(vertex_count, start_vertex) };
    }
}
