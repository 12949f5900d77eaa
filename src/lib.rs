//! D2M: block-delta video decoding into DXT1/DXT5 texture payloads.
//!
//! A D2M file is a 20-byte header followed by a loop of frames.  Each frame
//! patches the previous image block by block, so the decoded buffer can be
//! uploaded to the GPU as-is.
//!
//! The crate provides:
//! - Header parsing, block layout and single-frame decoding (`format`)
//! - Time-paced looping playback (`playback`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use d2m::playback::{Player, TickOutcome};
//!
//! let bytes = std::fs::read("intro.d2m").unwrap();
//! let mut player = Player::new();
//! player.load(bytes).unwrap();
//!
//! // Called once per rendered frame with the elapsed time.
//! if let TickOutcome::Decoded(_) = player.tick(1.0 / 60.0).unwrap() {
//!     let dxt = player.current_frame_buffer().unwrap();
//!     // upload `dxt` as a player.width() x player.height() texture
//!     let _ = dxt;
//! }
//! ```

pub mod error;
pub mod format;
pub mod io;
pub mod playback;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::D2mError;
