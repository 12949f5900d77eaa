// D2M file header parsing and emission.
//
// The header is a fixed 20-byte little-endian record at the start of the
// file.  Fields are read one by one from their byte ranges; nothing depends
// on native struct layout.

use std::io::{self, Write};

use crate::error::D2mError;

// ---------------------------------------------------------------------------
// Layout constants
// ---------------------------------------------------------------------------

/// Size of the fixed header; the compressed stream starts here.
pub const HEADER_SIZE: usize = 20;

/// Type byte selecting DXT1. Every other value selects DXT5.
pub const TYPE_DXT1: u8 = 1;

/// Type byte conventionally written for DXT5 streams.
pub const TYPE_DXT5: u8 = 5;

const OFF_TAG: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_FPS: usize = 5;
const OFF_TYPE: usize = 6;
const OFF_RESERVED: usize = 7;
const OFF_WIDTH: usize = 8;
const OFF_HEIGHT: usize = 12;
const OFF_FRAME_COUNT: usize = 16;

// ---------------------------------------------------------------------------
// Pixel format
// ---------------------------------------------------------------------------

/// Block-compressed texture format of the decoded frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// BC1: 8 bytes per 4x4 block.
    Dxt1,
    /// BC3: 16 bytes per 4x4 block.
    Dxt5,
}

impl PixelFormat {
    /// Map a header type byte. Only `1` means DXT1.
    #[inline]
    pub fn from_type_byte(ty: u8) -> Self {
        if ty == TYPE_DXT1 { Self::Dxt1 } else { Self::Dxt5 }
    }

    /// Bytes occupied by one 4x4 block.
    #[inline]
    pub fn block_size(self) -> usize {
        match self {
            Self::Dxt1 => 8,
            Self::Dxt5 => 16,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dxt1 => "DXT1",
            Self::Dxt5 => "DXT5",
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Parsed D2M file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Four-byte format marker. Not validated unless the caller asks for it.
    pub tag: [u8; 4],
    pub version: u8,
    /// Playback rate in frames per second.
    pub fps: u8,
    /// Raw type byte (`1` = DXT1, anything else = DXT5).
    pub ty: u8,
    pub reserved: u8,
    /// Texture width in texels.
    pub width: i32,
    /// Texture height in texels.
    pub height: i32,
    /// Number of frames in the loop.
    pub frame_count: i32,
}

impl Header {
    /// Parse the header from the start of `data`.
    ///
    /// Fails with [`D2mError::Format`] when fewer than [`HEADER_SIZE`] bytes
    /// are available. Field values are not checked here; see
    /// [`FrameLayout::from_header`](super::layout::FrameLayout::from_header).
    pub fn parse(data: &[u8]) -> Result<Self, D2mError> {
        if data.len() < HEADER_SIZE {
            return Err(D2mError::Format(format!(
                "buffer too short for header: {} bytes, need {HEADER_SIZE}",
                data.len()
            )));
        }

        let mut tag = [0u8; 4];
        tag.copy_from_slice(&data[OFF_TAG..OFF_TAG + 4]);

        Ok(Self {
            tag,
            version: data[OFF_VERSION],
            fps: data[OFF_FPS],
            ty: data[OFF_TYPE],
            reserved: data[OFF_RESERVED],
            width: read_i32_le(data, OFF_WIDTH),
            height: read_i32_le(data, OFF_HEIGHT),
            frame_count: read_i32_le(data, OFF_FRAME_COUNT),
        })
    }

    /// Write the 20-byte header.
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    /// Serialize into a fixed array.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[OFF_TAG..OFF_TAG + 4].copy_from_slice(&self.tag);
        out[OFF_VERSION] = self.version;
        out[OFF_FPS] = self.fps;
        out[OFF_TYPE] = self.ty;
        out[OFF_RESERVED] = self.reserved;
        out[OFF_WIDTH..OFF_WIDTH + 4].copy_from_slice(&self.width.to_le_bytes());
        out[OFF_HEIGHT..OFF_HEIGHT + 4].copy_from_slice(&self.height.to_le_bytes());
        out[OFF_FRAME_COUNT..OFF_FRAME_COUNT + 4].copy_from_slice(&self.frame_count.to_le_bytes());
        out
    }

    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::from_type_byte(self.ty)
    }

    /// Seconds between frames. Infinite when fps is zero.
    #[inline]
    pub fn frame_interval(&self) -> f64 {
        1.0 / f64::from(self.fps)
    }

    /// Tag rendered for display, with non-printable bytes escaped.
    pub fn tag_lossy(&self) -> String {
        self.tag.escape_ascii().to_string()
    }
}

#[inline]
fn read_i32_le(data: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
