// Time-driven playback over a loaded D2M stream.
//
// - `cursor`: (stream offset, frame index) pair with loop wrap-around
// - `player`: Playback session, Player state machine, tick pacing

pub mod cursor;
pub mod player;

pub use cursor::DecodeCursor;
pub use player::{FrameReport, Playback, PlaybackOptions, Player, PlayerState, TickOutcome};
