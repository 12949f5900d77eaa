#![no_main]
use d2m::playback::{Playback, PlaybackOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut playback) = Playback::load(data.to_vec(), PlaybackOptions::default()) else {
        return;
    };
    // Two loops at most, capped for huge frame counts.
    let ticks = u64::from(playback.frame_count()).min(64) * 2;
    for _ in 0..ticks {
        if playback.tick(playback.frame_interval()).is_err() {
            break;
        }
    }
});
