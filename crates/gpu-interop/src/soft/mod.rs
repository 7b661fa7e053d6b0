//! In-memory compositor device.
//!
//! Textures live in host memory and draws are recorded rather than
//! rasterized. Hosts without a GPU use it to keep the layer pipeline running
//! headless; tests use its fault switches and draw log to observe the
//! pipeline. The draw log is bounded, so long-running hosts do not grow it.

mod device;
mod effect;

pub use device::{
    DrawRecord, SoftCounters, SoftDevice, SoftFaults, SoftTexture, SoftView, DISCARD_FILL,
    DRAW_LOG_CAPACITY,
};
pub use effect::SoftEffect;
