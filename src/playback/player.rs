// Playback driver: paces frame decodes by elapsed time and loops the stream.
//
// `Playback` is one loaded stream with its own header, frame buffer and
// cursor.  `Player` wraps an optional `Playback` to model the Idle/Playing
// states.  The host calls `tick` from its own frame loop; there is no
// internal timer.

use std::time::Duration;

use super::cursor::DecodeCursor;
use crate::error::D2mError;
use crate::format::block::{self, FrameStats, StatusPolicy};
use crate::format::header::{HEADER_SIZE, Header, PixelFormat};
use crate::format::layout::{FrameLayout, FrameStore};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration applied when a stream is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackOptions {
    /// Handling of unknown block status bytes.
    pub status_policy: StatusPolicy,
    /// Require this header tag. `None` accepts any tag.
    pub expected_tag: Option<[u8; 4]>,
}

impl PlaybackOptions {
    /// Reject unknown status bytes instead of skipping them.
    pub fn strict() -> Self {
        Self {
            status_policy: StatusPolicy::Reject,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What one decode did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Index of the frame just decoded.
    pub frame_index: u32,
    pub stats: FrameStats,
    /// The cursor wrapped to the first frame after this decode.
    pub wrapped: bool,
}

/// Result of a `tick` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No stream loaded.
    Idle,
    /// The frame interval has not elapsed yet.
    Pending,
    /// One frame was decoded.
    Decoded(FrameReport),
}

impl TickOutcome {
    pub fn decoded(&self) -> Option<&FrameReport> {
        match self {
            Self::Decoded(r) => Some(r),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// A loaded D2M stream being played.
#[derive(Debug, Clone)]
pub struct Playback {
    data: Vec<u8>,
    header: Header,
    store: FrameStore,
    cursor: DecodeCursor,
    frame_count: u32,
    /// Seconds per frame (1 / fps).
    interval: f64,
    /// Seconds until the next decode. Goes negative on overshoot.
    countdown: f64,
    options: PlaybackOptions,
    frames_decoded: u64,
    loops_completed: u64,
    last_report: Option<FrameReport>,
}

impl Playback {
    /// Parse `data`, allocate the frame buffer and decode frame 0.
    ///
    /// The countdown to the next frame is armed to one frame interval.
    pub fn load(data: impl Into<Vec<u8>>, options: PlaybackOptions) -> Result<Self, D2mError> {
        let data = data.into();
        let header = Header::parse(&data)?;

        if let Some(expected) = options.expected_tag
            && header.tag != expected
        {
            return Err(D2mError::Format(format!(
                "unexpected tag \"{}\", expected \"{}\"",
                header.tag_lossy(),
                expected.escape_ascii()
            )));
        }
        if header.fps == 0 {
            return Err(D2mError::Config("fps must be positive".into()));
        }
        if header.frame_count <= 0 {
            return Err(D2mError::Config(format!(
                "frame count must be positive, got {}",
                header.frame_count
            )));
        }

        let layout = FrameLayout::from_header(&header)?;
        // Check that frame 0 fits before allocating the frame buffer.
        block::measure_frame(&data, HEADER_SIZE, &layout, 0, options.status_policy)?;
        let store = FrameStore::new(layout);
        let interval = header.frame_interval();

        log::info!(
            "d2m: version {}, {} fps, {}x{} {}, {} frames, {} bytes/image, {} blocks",
            header.version,
            header.fps,
            header.width,
            header.height,
            layout.pixel_format,
            header.frame_count,
            layout.image_buffer_size,
            layout.block_count
        );

        let mut playback = Self {
            data,
            header,
            store,
            cursor: DecodeCursor::START,
            frame_count: header.frame_count as u32,
            interval,
            countdown: interval,
            options,
            frames_decoded: 0,
            loops_completed: 0,
            last_report: None,
        };
        playback.advance()?;
        Ok(playback)
    }

    /// Decode the next frame now, regardless of the countdown.
    ///
    /// On error the cursor and frame buffer are unchanged.
    pub fn advance(&mut self) -> Result<FrameReport, D2mError> {
        let frame_index = self.cursor.frame_index;
        let layout = *self.store.layout();
        let decoded = block::decode_frame(
            &self.data,
            self.cursor.stream_offset,
            &layout,
            self.store.buffer_mut(),
            frame_index,
            self.options.status_policy,
        )?;

        let wrapped = self.cursor.advance(decoded.next_offset, self.frame_count);
        self.frames_decoded += 1;
        if wrapped {
            self.loops_completed += 1;
            log::debug!(
                "d2m: frame {frame_index} ended at offset {}, looping to start",
                decoded.next_offset
            );
        } else {
            log::debug!(
                "d2m: frame {frame_index}: {} changed blocks, {} bytes",
                decoded.stats.changed_blocks(),
                decoded.stats.bytes_consumed
            );
        }

        let report = FrameReport {
            frame_index,
            stats: decoded.stats,
            wrapped,
        };
        self.last_report = Some(report);
        Ok(report)
    }

    /// Account for `delta_seconds` of elapsed time.
    ///
    /// When the countdown reaches zero exactly one frame is decoded and the
    /// countdown is replenished by one interval, keeping any overshoot.
    /// Several elapsed intervals still produce a single decode per call. If
    /// the decode fails the countdown stays expired. Non-finite deltas are
    /// ignored.
    pub fn tick(&mut self, delta_seconds: f64) -> Result<TickOutcome, D2mError> {
        if !delta_seconds.is_finite() {
            log::warn!("d2m: ignoring non-finite tick delta {delta_seconds}");
            return Ok(TickOutcome::Pending);
        }

        self.countdown -= delta_seconds;
        log::trace!("d2m: tick {delta_seconds}s, countdown {}s", self.countdown);
        if self.countdown > 0.0 {
            return Ok(TickOutcome::Pending);
        }

        let report = self.advance()?;
        self.countdown += self.interval;
        Ok(TickOutcome::Decoded(report))
    }

    pub fn tick_duration(&mut self, elapsed: Duration) -> Result<TickOutcome, D2mError> {
        self.tick(elapsed.as_secs_f64())
    }

    /// The decoded image, `image_buffer_size` bytes of DXT blocks.
    #[inline]
    pub fn current_frame_buffer(&self) -> &[u8] {
        self.store.buffer()
    }

    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[inline]
    pub fn layout(&self) -> &FrameLayout {
        self.store.layout()
    }

    #[inline]
    pub fn cursor(&self) -> DecodeCursor {
        self.cursor
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.header.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.header.height
    }

    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        self.store.layout().pixel_format
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Seconds between frames.
    pub fn frame_interval(&self) -> f64 {
        self.interval
    }

    /// Seconds left before the next tick-driven decode.
    pub fn countdown(&self) -> f64 {
        self.countdown
    }

    pub fn options(&self) -> &PlaybackOptions {
        &self.options
    }

    /// Frames decoded since load, the load-time frame included.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Times the cursor wrapped back to the first frame.
    pub fn loops_completed(&self) -> u64 {
        self.loops_completed
    }

    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    /// Size of the loaded file in bytes.
    pub fn stream_len(&self) -> usize {
        self.data.len()
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
}

/// Host-facing driver holding at most one loaded stream.
#[derive(Debug, Clone, Default)]
pub struct Player {
    options: PlaybackOptions,
    playback: Option<Playback>,
}

impl Player {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: PlaybackOptions) -> Self {
        Self {
            options,
            playback: None,
        }
    }

    /// Load a stream, replacing any current one.
    ///
    /// On error the player is left Idle.
    pub fn load(&mut self, data: impl Into<Vec<u8>>) -> Result<(), D2mError> {
        self.playback = None;
        self.playback = Some(Playback::load(data, self.options.clone())?);
        Ok(())
    }

    /// Drop the current stream and return to Idle.
    pub fn unload(&mut self) -> Option<Playback> {
        self.playback.take()
    }

    /// Advance playback by `delta_seconds`. Does nothing while Idle.
    pub fn tick(&mut self, delta_seconds: f64) -> Result<TickOutcome, D2mError> {
        match self.playback.as_mut() {
            Some(p) => p.tick(delta_seconds),
            None => Ok(TickOutcome::Idle),
        }
    }

    pub fn state(&self) -> PlayerState {
        if self.playback.is_some() {
            PlayerState::Playing
        } else {
            PlayerState::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    pub fn playback(&self) -> Option<&Playback> {
        self.playback.as_ref()
    }

    pub fn playback_mut(&mut self) -> Option<&mut Playback> {
        self.playback.as_mut()
    }

    /// The decoded image, or `None` while Idle.
    pub fn current_frame_buffer(&self) -> Option<&[u8]> {
        self.playback.as_ref().map(Playback::current_frame_buffer)
    }

    /// Texture width, 0 while Idle.
    pub fn width(&self) -> i32 {
        self.playback.as_ref().map_or(0, Playback::width)
    }

    /// Texture height, 0 while Idle.
    pub fn height(&self) -> i32 {
        self.playback.as_ref().map_or(0, Playback::height)
    }

    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.playback.as_ref().map(Playback::pixel_format)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
