// Sequential read position within the compressed stream.

use crate::format::header::HEADER_SIZE;

/// Where the next frame starts, and which frame that is.
///
/// Frames have variable length, so the offset is only known by decoding
/// every frame before it. Once `frame_index` reaches the frame count the
/// cursor wraps back to the first record after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeCursor {
    pub stream_offset: usize,
    pub frame_index: u32,
}

impl DecodeCursor {
    pub const START: Self = Self {
        stream_offset: HEADER_SIZE,
        frame_index: 0,
    };

    /// Move past a frame that ended at `next_offset`. Returns `true` when
    /// the loop wrapped to the start.
    pub fn advance(&mut self, next_offset: usize, frame_count: u32) -> bool {
        self.frame_index += 1;
        if self.frame_index >= frame_count {
            *self = Self::START;
            true
        } else {
            self.stream_offset = next_offset;
            false
        }
    }

    #[inline]
    pub fn is_at_start(&self) -> bool {
        *self == Self::START
    }
}

impl Default for DecodeCursor {
    fn default() -> Self {
        Self::START
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_then_wraps() {
        let mut c = DecodeCursor::default();
        assert!(!c.advance(120, 3));
        assert_eq!(c, DecodeCursor { stream_offset: 120, frame_index: 1 });
        assert!(!c.advance(300, 3));
        assert_eq!(c.frame_index, 2);
        assert!(c.advance(410, 3));
        assert!(c.is_at_start());
    }

    #[test]
    fn single_frame_loop_always_wraps() {
        let mut c = DecodeCursor::START;
        assert!(c.advance(64, 1));
        assert_eq!(c.stream_offset, HEADER_SIZE);
    }
}
