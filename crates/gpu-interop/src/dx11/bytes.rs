//! Byte views of `#[repr(C)]` constant buffer structs.

/// Convert a `#[repr(C)]` struct to a byte slice for constant buffer upload.
///
/// # Safety
///
/// Only implement on `#[repr(C)]` structs whose fields are all plain numeric
/// types (f32, u32, arrays of them) laid out without padding.
pub unsafe trait AsBytes: Sized {
    /// View `self` as `size_of::<Self>()` bytes.
    fn as_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(self as *const Self as *const u8, std::mem::size_of::<Self>())
        }
    }
}
