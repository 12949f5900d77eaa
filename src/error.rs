// Error type shared by the D2M header parser, frame store, block decoder
// and playback driver.

use thiserror::Error;

/// Errors produced while loading or decoding a D2M stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum D2mError {
    /// The input is not a usable D2M container (too short, wrong tag).
    #[error("format error: {0}")]
    Format(String),

    /// A block record runs past the end of the compressed stream.
    #[error(
        "stream exhausted in frame {frame} at offset {offset}: \
         needed {needed} bytes, {available} available"
    )]
    Bounds {
        frame: u32,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Header values that cannot drive playback (fps, frame count, layout).
    #[error("config error: {0}")]
    Config(String),

    /// A status byte outside the known set, under `StatusPolicy::Reject`.
    #[error("unknown block status {status:#04X} in frame {frame}, block {block} (offset {offset})")]
    UnknownStatus {
        status: u8,
        frame: u32,
        block: usize,
        offset: usize,
    },
}

impl D2mError {
    /// True for errors raised while decoding frame records, as opposed to
    /// errors in the header or layout.
    pub fn is_stream_error(&self) -> bool {
        matches!(self, Self::Bounds { .. } | Self::UnknownStatus { .. })
    }
}
