//! A 4-channel byte drawing target over mapped texture memory.

use anyhow::{bail, Result};

use crate::producer::SnapshotImage;

/// Byte layout of a 4-channel pixel. Every backend's upload texture is
/// RGBA8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
}

impl PixelFormat {
    pub const BYTES_PER_PIXEL: usize = 4;
}

/// Drawing target bound to a mapped texture.
///
/// Rows are `row_pitch` bytes apart; the first `width * 4` bytes of each row
/// are pixels, the rest is padding and left untouched.
pub struct DrawTarget<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    format: PixelFormat,
}

impl<'a> DrawTarget<'a> {
    /// Bind a target to `data`, checking that the memory covers every row.
    pub fn new(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        row_pitch: usize,
        format: PixelFormat,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("draw target has empty size {width}x{height}");
        }
        let row_bytes = width as usize * PixelFormat::BYTES_PER_PIXEL;
        if row_pitch < row_bytes {
            bail!("row pitch {row_pitch} is smaller than a {width}-pixel row");
        }
        let required = row_pitch * (height as usize - 1) + row_bytes;
        if data.len() < required {
            bail!(
                "mapped memory is {} bytes, {width}x{height} at pitch {row_pitch} needs {required}",
                data.len()
            );
        }
        Ok(Self {
            data,
            width,
            height,
            row_pitch,
            format,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Pixel bytes of row `y`, in the target's format.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.row_pitch;
        &self.data[start..start + self.width as usize * PixelFormat::BYTES_PER_PIXEL]
    }

    fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.row_pitch;
        &mut self.data[start..start + self.width as usize * PixelFormat::BYTES_PER_PIXEL]
    }

    /// Overwrite every pixel with `rgba`.
    pub fn fill(&mut self, rgba: [u8; 4]) {
        for y in 0..self.height {
            for chunk in self.row_mut(y).chunks_exact_mut(4) {
                chunk.copy_from_slice(&rgba);
            }
        }
    }

    /// Copy straight RGBA rows into the target at 1:1 scale with a source
    /// (non-blending) composite over the full target rectangle.
    ///
    /// `src` holds `src_height` rows of `src_stride` bytes. Target pixels not
    /// covered by the source become transparent black.
    pub fn copy_from_rgba(
        &mut self,
        src: &[u8],
        src_width: u32,
        src_height: u32,
        src_stride: usize,
    ) -> Result<()> {
        let src_row_bytes = src_width as usize * PixelFormat::BYTES_PER_PIXEL;
        if src_height > 0 && src.len() < src_stride * (src_height as usize - 1) + src_row_bytes
        {
            bail!(
                "source buffer of {} bytes is too small for {src_width}x{src_height}",
                src.len()
            );
        }

        let copy_bytes = self.width.min(src_width) as usize * PixelFormat::BYTES_PER_PIXEL;
        for y in 0..self.height {
            let dst = self.row_mut(y);
            if y >= src_height {
                dst.fill(0);
                continue;
            }
            let src_row = &src[y as usize * src_stride..][..src_row_bytes];
            dst[..copy_bytes].copy_from_slice(&src_row[..copy_bytes]);
            dst[copy_bytes..].fill(0);
        }
        Ok(())
    }

    /// Draw a snapshot at the origin, replacing the target's contents.
    pub fn draw_snapshot(&mut self, image: &SnapshotImage) -> Result<()> {
        let (w, h) = image.dimensions();
        self.copy_from_rgba(image.as_raw(), w, h, w as usize * PixelFormat::BYTES_PER_PIXEL)
    }
}
