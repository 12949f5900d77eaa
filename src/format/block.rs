// Block delta decoding: applies one frame of per-block records to the
// frame buffer.
//
// Each frame holds exactly `block_count` records.  A record is one status
// byte followed by 0, half-block or full-block payload bytes, so frame
// boundaries are only found by walking every record.  Output block `i`
// always lands at `i * block_size` whatever its status.
//
// Decoding runs in two passes: the records are measured against the stream
// length first, then copied.  A truncated or rejected frame therefore leaves
// the frame buffer untouched.

use std::ops::Range;

use super::layout::FrameLayout;
use crate::error::D2mError;

// ---------------------------------------------------------------------------
// Status bytes
// ---------------------------------------------------------------------------

pub const STATUS_UNCHANGED: u8 = 0x00;
pub const STATUS_SECOND_HALF: u8 = 0x01;
pub const STATUS_FIRST_HALF: u8 = 0x02;
pub const STATUS_FULL: u8 = 0xFF;

/// Which part of a block a record replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// `0x00`: block kept from the previous frame.
    Unchanged,
    /// `0x01`: upper half of the block bytes replaced.
    SecondHalf,
    /// `0x02`: lower half of the block bytes replaced.
    FirstHalf,
    /// `0xFF`: whole block replaced.
    Full,
    /// Any other byte. Carries no payload.
    Unknown(u8),
}

impl BlockStatus {
    #[inline]
    pub fn from_byte(b: u8) -> Self {
        match b {
            STATUS_UNCHANGED => Self::Unchanged,
            STATUS_SECOND_HALF => Self::SecondHalf,
            STATUS_FIRST_HALF => Self::FirstHalf,
            STATUS_FULL => Self::Full,
            other => Self::Unknown(other),
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Unchanged => STATUS_UNCHANGED,
            Self::SecondHalf => STATUS_SECOND_HALF,
            Self::FirstHalf => STATUS_FIRST_HALF,
            Self::Full => STATUS_FULL,
            Self::Unknown(b) => b,
        }
    }

    /// Payload bytes following the status byte.
    #[inline]
    pub fn payload_len(self, block_size: usize) -> usize {
        match self {
            Self::Unchanged | Self::Unknown(_) => 0,
            Self::SecondHalf | Self::FirstHalf => block_size / 2,
            Self::Full => block_size,
        }
    }

    /// Byte range inside the block overwritten by the payload.
    #[inline]
    pub fn target_range(self, block_size: usize) -> Range<usize> {
        let half = block_size / 2;
        match self {
            Self::Unchanged | Self::Unknown(_) => 0..0,
            Self::SecondHalf => half..block_size,
            Self::FirstHalf => 0..half,
            Self::Full => 0..block_size,
        }
    }
}

/// How to treat status bytes outside `{0x00, 0x01, 0x02, 0xFF}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Skip the record without consuming payload, as existing assets expect.
    /// A corrupt byte desynchronizes the rest of the stream.
    #[default]
    Ignore,
    /// Fail with [`D2mError::UnknownStatus`].
    Reject,
}

// ---------------------------------------------------------------------------
// Frame statistics
// ---------------------------------------------------------------------------

/// Record counts for one decoded frame (or a sum over several).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub unchanged: u64,
    pub second_half: u64,
    pub first_half: u64,
    pub full: u64,
    pub unknown: u64,
    /// Stream bytes consumed, status bytes included.
    pub bytes_consumed: u64,
}

impl FrameStats {
    #[inline]
    fn record(&mut self, status: BlockStatus) {
        match status {
            BlockStatus::Unchanged => self.unchanged += 1,
            BlockStatus::SecondHalf => self.second_half += 1,
            BlockStatus::FirstHalf => self.first_half += 1,
            BlockStatus::Full => self.full += 1,
            BlockStatus::Unknown(_) => self.unknown += 1,
        }
    }

    /// Blocks whose bytes were written.
    pub fn changed_blocks(&self) -> u64 {
        self.second_half + self.first_half + self.full
    }

    pub fn total_blocks(&self) -> u64 {
        self.unchanged + self.changed_blocks() + self.unknown
    }

    /// Accumulate another frame's counts.
    pub fn merge(&mut self, other: &FrameStats) {
        self.unchanged += other.unchanged;
        self.second_half += other.second_half;
        self.first_half += other.first_half;
        self.full += other.full;
        self.unknown += other.unknown;
        self.bytes_consumed += other.bytes_consumed;
    }
}

/// Result of decoding (or measuring) one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDecode {
    /// Absolute stream offset of the next frame's first record.
    pub next_offset: usize,
    pub stats: FrameStats,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Walk one frame's records starting at `offset` without touching any
/// buffer.
///
/// `stream` is the whole file and `offset` is absolute, so errors report
/// file offsets. `frame` is only used in error reports.
pub fn measure_frame(
    stream: &[u8],
    offset: usize,
    layout: &FrameLayout,
    frame: u32,
    policy: StatusPolicy,
) -> Result<FrameDecode, D2mError> {
    let block_size = layout.block_size;
    let mut pos = offset;
    let mut stats = FrameStats::default();

    for block in 0..layout.block_count {
        let Some(&byte) = stream.get(pos) else {
            return Err(D2mError::Bounds {
                frame,
                offset: pos,
                needed: 1,
                available: 0,
            });
        };
        let status = BlockStatus::from_byte(byte);

        if let BlockStatus::Unknown(status) = status
            && policy == StatusPolicy::Reject
        {
            return Err(D2mError::UnknownStatus {
                status,
                frame,
                block,
                offset: pos,
            });
        }
        pos += 1;

        let n = status.payload_len(block_size);
        let available = stream.len() - pos;
        if n > available {
            return Err(D2mError::Bounds {
                frame,
                offset: pos,
                needed: n,
                available,
            });
        }
        pos += n;
        stats.record(status);
    }

    stats.bytes_consumed = (pos - offset) as u64;
    Ok(FrameDecode {
        next_offset: pos,
        stats,
    })
}

/// Decode one frame from `stream[offset..]` into `buffer`.
///
/// `buffer` must be exactly `layout.image_buffer_size` bytes. Blocks whose
/// status is unchanged (or unknown, under [`StatusPolicy::Ignore`]) keep
/// their previous bytes. On error `buffer` is left as it was.
pub fn decode_frame(
    stream: &[u8],
    offset: usize,
    layout: &FrameLayout,
    buffer: &mut [u8],
    frame: u32,
    policy: StatusPolicy,
) -> Result<FrameDecode, D2mError> {
    check_layout(layout)?;
    if buffer.len() != layout.image_buffer_size {
        return Err(D2mError::Config(format!(
            "frame buffer is {} bytes, layout needs {}",
            buffer.len(),
            layout.image_buffer_size
        )));
    }

    let decoded = measure_frame(stream, offset, layout, frame, policy)?;
    apply_frame(stream, offset, layout.block_size, buffer);
    if decoded.stats.unknown > 0 {
        log::warn!(
            "frame {frame}: {} unknown block status bytes skipped",
            decoded.stats.unknown
        );
    }
    Ok(decoded)
}

/// Reject hand-built layouts whose block count disagrees with the buffer.
fn check_layout(layout: &FrameLayout) -> Result<(), D2mError> {
    let bs = layout.block_size;
    if bs != layout.pixel_format.block_size()
        || layout.block_count.checked_mul(bs) != Some(layout.image_buffer_size)
    {
        return Err(D2mError::Config(format!(
            "inconsistent layout: {} blocks of {bs} bytes ({}) for a {}-byte image",
            layout.block_count, layout.pixel_format, layout.image_buffer_size
        )));
    }
    Ok(())
}

/// Copy payloads into `buffer`. Records must already be measured.
fn apply_frame(stream: &[u8], offset: usize, block_size: usize, buffer: &mut [u8]) {
    let mut pos = offset;
    for block in buffer.chunks_exact_mut(block_size) {
        let status = BlockStatus::from_byte(stream[pos]);
        pos += 1;

        let n = status.payload_len(block_size);
        if n > 0 {
            block[status.target_range(block_size)].copy_from_slice(&stream[pos..pos + n]);
            pos += n;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
