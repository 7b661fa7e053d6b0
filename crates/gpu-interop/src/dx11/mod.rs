//! Direct3D 11 backend (Windows).
//!
//! Producer frames arrive as DXGI shared handles and are opened with
//! `ID3D11Device::OpenSharedResource`; CPU uploads go through a dynamic
//! texture mapped with `D3D11_MAP_WRITE_DISCARD`.

mod bytes;
pub mod device;
pub mod effect;

pub use bytes::AsBytes;
pub use device::{create_dynamic_cbuf, Dx11Device};
pub use effect::Dx11Effect;
