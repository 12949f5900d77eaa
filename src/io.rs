// File-level helpers for D2M decoding.
//
// Provides `decode_file()` and `verify_file()` style convenience functions
// around `Playback`.  Streams are always read fully into memory before
// decoding.  Decoded frames are written raw and back to back; with the
// `file-io` feature a streaming SHA-256 of the output is computed.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::error::D2mError;
use crate::format::block::FrameStats;
use crate::format::header::{HEADER_SIZE, Header};
use crate::format::layout::FrameLayout;
use crate::playback::player::{Playback, PlaybackOptions};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `decode_file()` and `decode_to()`.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    /// Input file size in bytes.
    pub input_size: u64,
    /// Bytes written (frames * image_buffer_size).
    pub output_size: u64,
    /// Frames written.
    pub frames: u64,
    /// Times playback wrapped to the first frame.
    pub loops: u64,
    /// Record counts summed over all decoded frames.
    pub totals: FrameStats,
    /// SHA-256 of the written output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

/// One full pass over every frame of a stream.
#[derive(Debug, Clone)]
pub struct StreamSummary {
    pub header: Header,
    pub layout: FrameLayout,
    /// Record counts summed over one loop.
    pub totals: FrameStats,
    /// File offset just past the last frame.
    pub stream_end: usize,
    /// Bytes after the last frame, ignored by playback.
    pub trailing_bytes: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Stream decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] D2mError),
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Read a whole D2M file into memory.
pub fn read_stream(path: &Path) -> Result<Vec<u8>, IoError> {
    Ok(std::fs::read(path)?)
}

/// Read `path` and start playback (frame 0 decoded).
pub fn open_file(path: &Path, options: PlaybackOptions) -> Result<Playback, IoError> {
    let data = read_stream(path)?;
    log::debug!("d2m: loaded {} ({} bytes)", path.display(), data.len());
    Ok(Playback::load(data, options)?)
}

// ---------------------------------------------------------------------------
// Decoding to raw frames
// ---------------------------------------------------------------------------

/// Decode `frames` frames from `data` and write each frame buffer to
/// `writer`, back to back.
///
/// `frames` defaults to the header's frame count, i.e. one full loop.
/// Asking for more frames keeps looping.
pub fn decode_to<W: Write>(
    data: Vec<u8>,
    writer: &mut W,
    frames: Option<u64>,
    options: PlaybackOptions,
) -> Result<DecodeStats, IoError> {
    let input_size = data.len() as u64;
    let mut playback = Playback::load(data, options)?;
    let frames = frames.unwrap_or(u64::from(playback.frame_count()));

    let mut totals = FrameStats::default();
    let mut output_size = 0u64;

    for n in 0..frames {
        let report = if n == 0 {
            playback.last_report().copied()
        } else {
            Some(playback.advance()?)
        };
        if let Some(report) = report {
            totals.merge(&report.stats);
        }

        let buf = playback.current_frame_buffer();
        writer.write_all(buf)?;
        output_size += buf.len() as u64;
    }

    Ok(DecodeStats {
        input_size,
        output_size,
        frames,
        loops: playback.loops_completed(),
        totals,
        output_sha256: None,
    })
}

/// Decode a D2M file, writing raw frame buffers to `output_path`.
///
/// When the `file-io` feature is enabled, a SHA-256 checksum of the output
/// is computed incrementally.
pub fn decode_file(
    input_path: &Path,
    output_path: &Path,
    frames: Option<u64>,
    options: PlaybackOptions,
) -> Result<DecodeStats, IoError> {
    let data = read_stream(input_path)?;
    let output_file = File::create(output_path)?;
    let mut output_writer = BufWriter::with_capacity(BUF_SIZE, output_file);

    #[cfg(feature = "file-io")]
    let mut output_hasher = sha2::Sha256::new();

    #[cfg(feature = "file-io")]
    let mut stats = {
        let mut hashing_writer = HashingWriter {
            inner: &mut output_writer,
            hasher: &mut output_hasher,
        };
        decode_to(data, &mut hashing_writer, frames, options)?
    };

    #[cfg(not(feature = "file-io"))]
    let stats = decode_to(data, &mut output_writer, frames, options)?;

    output_writer.flush()?;

    #[cfg(feature = "file-io")]
    {
        stats.output_sha256 = Some(output_hasher.finalize().into());
    }

    Ok(stats)
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Decode every frame once and report where the stream ends.
pub fn verify_stream(data: Vec<u8>, options: PlaybackOptions) -> Result<StreamSummary, D2mError> {
    let data_len = data.len();
    let mut playback = Playback::load(data, options)?;

    let mut totals = FrameStats::default();
    if let Some(report) = playback.last_report() {
        totals.merge(&report.stats);
    }
    for _ in 1..playback.frame_count() {
        let report = playback.advance()?;
        totals.merge(&report.stats);
    }

    let stream_end = HEADER_SIZE + totals.bytes_consumed as usize;
    Ok(StreamSummary {
        header: *playback.header(),
        layout: *playback.layout(),
        totals,
        stream_end,
        trailing_bytes: data_len.saturating_sub(stream_end),
    })
}

/// `verify_stream` for a file on disk.
pub fn verify_file(path: &Path, options: PlaybackOptions) -> Result<StreamSummary, IoError> {
    let data = read_stream(path)?;
    Ok(verify_stream(data, options)?)
}

/// Verify several files. Each file gets its own decoder, so with the
/// `parallel` feature they are checked concurrently.
pub fn verify_files(
    paths: &[PathBuf],
    options: &PlaybackOptions,
) -> Vec<(PathBuf, Result<StreamSummary, IoError>)> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        paths
            .par_iter()
            .map(|p| (p.clone(), verify_file(p, options.clone())))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        paths
            .iter()
            .map(|p| (p.clone(), verify_file(p, options.clone())))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::header::TYPE_DXT5;

    fn write_temp_file(name: &str, data: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join("d2m_io_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    fn cleanup_temp_files(paths: &[&Path]) {
        for p in paths {
            let _ = std::fs::remove_file(p);
        }
    }

    /// 4x8 DXT5 (2 blocks of 16 bytes), two frames.
    fn sample_stream(trailing: &[u8]) -> Vec<u8> {
        let hdr = Header {
            tag: *b"D2M ",
            version: 1,
            fps: 25,
            ty: TYPE_DXT5,
            reserved: 0,
            width: 4,
            height: 8,
            frame_count: 2,
        };
        let mut data = hdr.to_bytes().to_vec();
        // Frame 0: both blocks full.
        data.push(0xFF);
        data.extend_from_slice(&[0x11; 16]);
        data.push(0xFF);
        data.extend_from_slice(&[0x22; 16]);
        // Frame 1: second half of block 0, block 1 unchanged.
        data.push(0x01);
        data.extend_from_slice(&[0x33; 8]);
        data.push(0x00);
        data.extend_from_slice(trailing);
        data
    }

    #[test]
    fn decode_to_writes_each_frame() {
        let mut out = Vec::new();
        let stats = decode_to(sample_stream(&[]), &mut out, None, PlaybackOptions::default()).unwrap();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.output_size, 64);
        assert_eq!(stats.loops, 1);
        assert_eq!(stats.totals.full, 2);
        assert_eq!(stats.totals.second_half, 1);
        assert_eq!(stats.totals.unchanged, 1);

        let mut frame1 = [[0x11u8; 16], [0x22u8; 16]].concat();
        assert_eq!(&out[..32], frame1.as_slice());
        frame1[8..16].fill(0x33);
        assert_eq!(&out[32..], frame1.as_slice());
    }

    #[test]
    fn decode_more_frames_than_loop() {
        let mut out = Vec::new();
        let stats =
            decode_to(sample_stream(&[]), &mut out, Some(4), PlaybackOptions::default()).unwrap();
        assert_eq!(stats.frames, 4);
        assert_eq!(stats.loops, 2);
        assert_eq!(&out[..64], &out[64..]);
    }

    #[test]
    fn verify_reports_stream_end() {
        let summary = verify_stream(sample_stream(&[0xEE; 5]), PlaybackOptions::default()).unwrap();
        assert_eq!(summary.stream_end, HEADER_SIZE + 34 + 10);
        assert_eq!(summary.trailing_bytes, 5);
        assert_eq!(summary.totals.total_blocks(), 4);
    }

    #[test]
    fn decode_file_roundtrip() {
        let input = write_temp_file("sample.d2m", &sample_stream(&[]));
        let output = write_temp_file("sample.raw", b"");

        let stats = decode_file(&input, &output, Some(1), PlaybackOptions::default()).unwrap();
        assert_eq!(stats.output_size, 32);
        let written = std::fs::read(&output).unwrap();
        assert_eq!(written, [[0x11u8; 16], [0x22u8; 16]].concat());

        #[cfg(feature = "file-io")]
        {
            let expected: [u8; 32] = sha2::Sha256::digest(&written).into();
            assert_eq!(stats.output_sha256, Some(expected));
        }

        cleanup_temp_files(&[&input, &output]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let r = open_file(Path::new("/nonexistent/d2m/file.d2m"), PlaybackOptions::default());
        assert!(matches!(r, Err(IoError::Io(_))));
    }

    #[test]
    fn verify_files_keeps_order_and_errors() {
        let good = write_temp_file("verify_good.d2m", &sample_stream(&[]));
        let bad = write_temp_file("verify_bad.d2m", &[0u8; 7]);
        let paths = vec![good.clone(), bad.clone()];

        let results = verify_files(&paths, &PlaybackOptions::default());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, good);
        assert!(results[0].1.is_ok());
        assert!(matches!(
            results[1].1,
            Err(IoError::Decode(D2mError::Format(_)))
        ));

        cleanup_temp_files(&[&good, &bad]);
    }
}
