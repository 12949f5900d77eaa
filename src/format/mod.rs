// D2M container format.
//
// # Modules
//
// - `header`: Fixed 20-byte file header and pixel format mapping
// - `layout`: Block layout derived from the header, and the frame buffer
// - `block`:  Per-block delta records and single-frame decoding

pub mod block;
pub mod header;
pub mod layout;

// Re-export key types for convenience.
pub use block::{BlockStatus, FrameDecode, FrameStats, StatusPolicy, decode_frame, measure_frame};
pub use header::{HEADER_SIZE, Header, PixelFormat};
pub use layout::{FrameLayout, FrameStore};
