// Block layout derived from the header, and the persistent frame buffer.

use super::header::{Header, PixelFormat};
use crate::error::D2mError;

/// Texels per block edge.
pub const BLOCK_DIM: i32 = 4;

/// Largest accepted width or height, in texels.
pub const MAX_DIMENSION: i32 = 16384;

// ---------------------------------------------------------------------------
// FrameLayout
// ---------------------------------------------------------------------------

/// Sizes that govern how frame records map onto the image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes per block: 8 (DXT1) or 16 (DXT5).
    pub block_size: usize,
    /// Compressed size of one full image.
    pub image_buffer_size: usize,
    /// Block records per frame.
    pub block_count: usize,
}

impl FrameLayout {
    /// Derive the layout for `header`.
    ///
    /// Dimensions must be positive multiples of 4 no larger than
    /// [`MAX_DIMENSION`]; anything else is a [`D2mError::Config`].
    pub fn from_header(header: &Header) -> Result<Self, D2mError> {
        let width = checked_dimension("width", header.width)?;
        let height = checked_dimension("height", header.height)?;

        let pixel_format = header.pixel_format();
        let block_size = pixel_format.block_size();
        let texels = width as usize * height as usize;
        let image_buffer_size = match pixel_format {
            PixelFormat::Dxt1 => texels / 2,
            PixelFormat::Dxt5 => texels,
        };

        Ok(Self {
            pixel_format,
            width,
            height,
            block_size,
            image_buffer_size,
            block_count: image_buffer_size / block_size,
        })
    }

    /// Bytes carried by a half-block record.
    #[inline]
    pub fn half_block(&self) -> usize {
        self.block_size / 2
    }

    /// Largest number of stream bytes a single frame can occupy.
    #[inline]
    pub fn max_frame_len(&self) -> usize {
        self.block_count * (1 + self.block_size)
    }
}

fn checked_dimension(name: &str, value: i32) -> Result<u32, D2mError> {
    if value <= 0 {
        return Err(D2mError::Config(format!("{name} must be positive, got {value}")));
    }
    if value % BLOCK_DIM != 0 {
        return Err(D2mError::Config(format!(
            "{name} {value} is not a multiple of the {BLOCK_DIM}-texel block size"
        )));
    }
    if value > MAX_DIMENSION {
        return Err(D2mError::Config(format!(
            "{name} {value} exceeds max {MAX_DIMENSION}"
        )));
    }
    Ok(value as u32)
}

// ---------------------------------------------------------------------------
// FrameStore
// ---------------------------------------------------------------------------

/// Owns the decoded block-compressed image that frames patch in place.
#[derive(Debug, Clone)]
pub struct FrameStore {
    layout: FrameLayout,
    buffer: Vec<u8>,
}

impl FrameStore {
    /// Allocate a zeroed buffer of `layout.image_buffer_size` bytes.
    pub fn new(layout: FrameLayout) -> Self {
        Self {
            buffer: vec![0u8; layout.image_buffer_size],
            layout,
        }
    }

    pub fn from_header(header: &Header) -> Result<Self, D2mError> {
        FrameLayout::from_header(header).map(Self::new)
    }

    #[inline]
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Read-only view of the current image.
    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub(crate) fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Zero the image, as after allocation.
    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
