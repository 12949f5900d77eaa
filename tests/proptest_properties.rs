mod common;

use common::{StreamBuilder, header};
use d2m::format::block::{self, BlockStatus, StatusPolicy};
use d2m::format::header::{HEADER_SIZE, TYPE_DXT1, TYPE_DXT5};
use d2m::format::layout::FrameLayout;
use d2m::playback::{Playback, PlaybackOptions};
use proptest::prelude::*;

/// One record: (status selector, payload seed).
fn record_strategy() -> impl Strategy<Value = (u8, u8)> {
    (0u8..4, any::<u8>())
}

fn status_for(sel: u8) -> BlockStatus {
    match sel {
        0 => BlockStatus::Unchanged,
        1 => BlockStatus::SecondHalf,
        2 => BlockStatus::FirstHalf,
        _ => BlockStatus::Full,
    }
}

/// Reference model: apply records to a plain image.
fn apply_model(image: &mut [u8], block_size: usize, records: &[(u8, u8)]) {
    for (i, &(sel, seed)) in records.iter().enumerate() {
        let status = status_for(sel);
        let range = status.target_range(block_size);
        let start = i * block_size;
        for b in &mut image[start + range.start..start + range.end] {
            *b = seed;
        }
    }
}

fn push_frame(builder: &mut StreamBuilder, block_size: usize, records: &[(u8, u8)]) {
    for &(sel, seed) in records {
        let status = status_for(sel);
        let payload = vec![seed; status.payload_len(block_size)];
        builder.record(status, &payload);
    }
}

proptest! {
    #[test]
    fn prop_frames_match_reference_model(
        dxt1 in any::<bool>(),
        frames in proptest::collection::vec(
            proptest::collection::vec(record_strategy(), 8),
            1..6
        )
    ) {
        // 16x8 texels -> 8 blocks for either format.
        let ty = if dxt1 { TYPE_DXT1 } else { TYPE_DXT5 };
        let hdr = header(ty, 16, 8, 30, frames.len() as i32);
        let block_size = hdr.pixel_format().block_size();

        let mut builder = StreamBuilder::new(hdr);
        for f in &frames {
            push_frame(&mut builder, block_size, f);
        }
        let mut p = Playback::load(builder.build(), PlaybackOptions::strict()).unwrap();

        let mut model = vec![0u8; 8 * block_size];
        apply_model(&mut model, block_size, &frames[0]);
        prop_assert_eq!(p.current_frame_buffer(), model.as_slice());

        for f in &frames[1..] {
            p.advance().unwrap();
            apply_model(&mut model, block_size, f);
            prop_assert_eq!(p.current_frame_buffer(), model.as_slice());
        }
        prop_assert!(p.cursor().is_at_start());
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(
        records in proptest::collection::vec(any::<u8>(), 0..600)
    ) {
        let layout = FrameLayout::from_header(&header(TYPE_DXT1, 16, 16, 10, 1)).unwrap();
        let mut stream = vec![0u8; HEADER_SIZE];
        stream.extend_from_slice(&records);
        let before = vec![0u8; layout.image_buffer_size];

        for policy in [StatusPolicy::Ignore, StatusPolicy::Reject] {
            let mut buf = before.clone();
            match block::decode_frame(&stream, HEADER_SIZE, &layout, &mut buf, 0, policy) {
                Ok(d) => prop_assert!(d.next_offset <= stream.len()),
                Err(e) => {
                    prop_assert!(e.is_stream_error());
                    prop_assert_eq!(&buf, &before);
                }
            }
        }
    }

    #[test]
    fn prop_load_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = Playback::load(data, PlaybackOptions::default());
    }
}
