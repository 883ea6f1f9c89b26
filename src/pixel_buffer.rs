//! Image decoding and BGRA pixel buffer rendering

use crate::{Dimensions, Error, Result};
use image::{DynamicImage, GenericImageView, ImageReader};
use std::path::Path;

/// Bytes per BGRA-32 pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Default ceiling for a single rendered buffer (512 MiB)
pub const DEFAULT_MAX_BUFFER_BYTES: u64 = 512 * 1024 * 1024;

/// Rendered frame: 32-bit BGRA pixels, rows tightly packed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Wrap already rendered BGRA data
    pub fn from_bgra(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = buffer_len(width, height)?;
        if data.len() as u64 != expected {
            return Err(Error::InvalidConfiguration(format!(
                "BGRA buffer for {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn bytes_per_row(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Decodes source images and renders them into [`FrameBuffer`]s
///
/// One factory lives as long as its [`Exporter`](crate::Exporter) and is reused
/// for every export it runs.
#[derive(Debug, Clone)]
pub struct PixelBufferFactory {
    max_buffer_bytes: u64,
}

impl Default for PixelBufferFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelBufferFactory {
    pub fn new() -> Self {
        Self {
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        }
    }

    /// Limit the size of rendered buffers
    pub fn with_max_buffer_bytes(mut self, max_buffer_bytes: u64) -> Self {
        self.max_buffer_bytes = max_buffer_bytes;
        self
    }

    /// Decode an image from a file path
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<DynamicImage> {
        let path = path.as_ref();
        let image_load = |source| Error::ImageLoad {
            path: path.to_path_buf(),
            source,
        };

        ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| image_load(image::ImageError::IoError(e)))?
            .decode()
            .map_err(image_load)
    }

    /// Render an image at its natural size into a BGRA buffer
    pub fn render(&self, image: &DynamicImage) -> Result<FrameBuffer> {
        let (width, height) = image.dimensions();
        let len = buffer_len(width, height)?;
        if len > self.max_buffer_bytes {
            return Err(Error::BufferAllocation { width, height });
        }

        let mut data: Vec<u8> = Vec::new();
        data.try_reserve_exact(len as usize)
            .map_err(|_| Error::BufferAllocation { width, height })?;

        let rgba = image.to_rgba8();
        for px in rgba.as_raw().chunks_exact(BYTES_PER_PIXEL) {
            data.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }

        Ok(FrameBuffer {
            width,
            height,
            data,
        })
    }
}

fn buffer_len(width: u32, height: u32) -> Result<u64> {
    (width as u64)
        .checked_mul(height as u64)
        .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL as u64))
        .filter(|len| usize::try_from(*len).is_ok())
        .ok_or(Error::BufferAllocation { width, height })
}
