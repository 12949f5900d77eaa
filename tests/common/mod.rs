// Helpers for assembling D2M streams record by record.

#![allow(dead_code)]

use d2m::format::block::BlockStatus;
use d2m::format::header::Header;

pub fn header(ty: u8, width: i32, height: i32, fps: u8, frame_count: i32) -> Header {
    Header {
        tag: *b"D2M ",
        version: 1,
        fps,
        ty,
        reserved: 0,
        width,
        height,
        frame_count,
    }
}

/// Appends block records after a header.
pub struct StreamBuilder {
    block_size: usize,
    data: Vec<u8>,
}

impl StreamBuilder {
    pub fn new(header: Header) -> Self {
        Self {
            block_size: header.pixel_format().block_size(),
            data: header.to_bytes().to_vec(),
        }
    }

    /// One record. `payload` must match the status's payload length.
    pub fn record(&mut self, status: BlockStatus, payload: &[u8]) -> &mut Self {
        assert_eq!(payload.len(), status.payload_len(self.block_size));
        self.data.push(status.to_byte());
        self.data.extend_from_slice(payload);
        self
    }

    /// A frame of `blocks` unchanged records.
    pub fn unchanged_frame(&mut self, blocks: usize) -> &mut Self {
        self.data.extend(std::iter::repeat_n(0u8, blocks));
        self
    }

    /// A frame of full records carrying `image` (a whole frame buffer).
    pub fn full_frame(&mut self, image: &[u8]) -> &mut Self {
        assert_eq!(image.len() % self.block_size, 0);
        for block in image.chunks_exact(self.block_size) {
            self.data.push(0xFF);
            self.data.extend_from_slice(block);
        }
        self
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// Deterministic filler bytes.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}
