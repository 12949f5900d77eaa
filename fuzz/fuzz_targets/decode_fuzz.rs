#![no_main]
use d2m::format::block::{self, StatusPolicy};
use d2m::format::header::{HEADER_SIZE, Header, TYPE_DXT5};
use d2m::format::layout::FrameLayout;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary record bytes behind a fixed 32x32 DXT5 header.
    let header = Header {
        tag: *b"D2M ",
        version: 1,
        fps: 30,
        ty: TYPE_DXT5,
        reserved: 0,
        width: 32,
        height: 32,
        frame_count: 1,
    };
    let Ok(layout) = FrameLayout::from_header(&header) else {
        return;
    };
    let mut stream = header.to_bytes().to_vec();
    stream.extend_from_slice(data);

    // Never panic; leave the buffer untouched on error.
    for policy in [StatusPolicy::Ignore, StatusPolicy::Reject] {
        let mut buf = vec![0x5Au8; layout.image_buffer_size];
        if block::decode_frame(&stream, HEADER_SIZE, &layout, &mut buf, 0, policy).is_err() {
            assert!(buf.iter().all(|&b| b == 0x5A));
        }
    }
});
