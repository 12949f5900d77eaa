// Command-line front end for the D2M decoder.
//
// Subcommands inspect headers, dump per-frame record statistics, decode
// frames to raw DXT buffers, and simulate tick-driven playback.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::format::block::StatusPolicy;
use crate::format::header::{HEADER_SIZE, TYPE_DXT1, TYPE_DXT5};
use crate::format::layout::{BLOCK_DIM, MAX_DIMENSION};
use crate::io::{self as d2m_io, IoError, StreamSummary};
use crate::playback::player::{PlaybackOptions, TickOutcome};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default host frame step for `play`: a 60 Hz render loop.
const DEFAULT_STEP: f64 = 1.0 / 60.0;
const DEFAULT_PLAY_SECONDS: f64 = 5.0;

/// Upper bound on simulated host ticks for `play`.
const MAX_PLAY_TICKS: u64 = 10_000_000;

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Tag parsing
// ---------------------------------------------------------------------------

fn parse_tag(s: &str) -> Result<[u8; 4], String> {
    let bytes = s.as_bytes();
    if bytes.len() > 4 {
        return Err(format!("tag '{s}' is longer than 4 bytes"));
    }
    // Short tags are NUL padded, like a C string in a 4-byte field.
    let mut tag = [0u8; 4];
    tag[..bytes.len()].copy_from_slice(bytes);
    Ok(tag)
}

fn parse_seconds(s: &str) -> Result<f64, String> {
    let v: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid duration '{s}': {e}"))?;
    if !v.is_finite() || v <= 0.0 {
        return Err(format!("duration must be positive, got '{s}'"));
    }
    Ok(v)
}

fn play_ticks(seconds: f64, step: f64) -> Result<u64, String> {
    let ticks = (seconds / step).round();
    if !ticks.is_finite() || ticks > MAX_PLAY_TICKS as f64 {
        return Err(format!(
            "{seconds}s at a {step}s step exceeds {MAX_PLAY_TICKS} ticks"
        ));
    }
    Ok(ticks as u64)
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// D2M block-delta video decoder.
#[derive(Parser, Debug)]
#[command(
    name = "d2m",
    version,
    about = "D2M block-delta video decoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,

    /// Reject unknown block status bytes instead of skipping them.
    #[arg(long, global = true)]
    strict: bool,

    /// Require this header tag (up to 4 bytes, NUL padded).
    #[arg(long, global = true, value_parser = parse_tag)]
    tag: Option<[u8; 4]>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print header and block layout.
    Info(InfoArgs),
    /// Print per-frame block record statistics.
    Frames(FileArgs),
    /// Decode frames to raw DXT buffers.
    Decode(DecodeArgs),
    /// Simulate tick-driven playback with a fixed host step.
    Play(PlayArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// D2M input files.
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Decode every frame to check the stream.
    #[arg(long)]
    verify: bool,
}

#[derive(Args, Debug)]
struct FileArgs {
    /// D2M input file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// D2M input file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output file for raw frame buffers (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Number of frames to write (default: one loop).
    #[arg(long, short = 'n')]
    frames: Option<u64>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Check/compute only (do not write output).
    #[arg(long = "check-only")]
    no_output: bool,
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// D2M input file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Simulated wall-clock time in seconds.
    #[arg(long, value_parser = parse_seconds, default_value_t = DEFAULT_PLAY_SECONDS)]
    seconds: f64,

    /// Host frame step in seconds.
    #[arg(long, value_parser = parse_seconds, default_value_t = DEFAULT_STEP)]
    step: f64,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Info,
    Frames,
    Decode,
    Play,
    Config,
}

struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    verify: bool,
    no_output: bool,
    frames: Option<u64>,
    seconds: f64,
    step: f64,
    playback: PlaybackOptions,
    input_files: Vec<PathBuf>,
    output_file: Option<PathBuf>,
}

fn resolve_options(cli: Cli) -> Options {
    let playback = PlaybackOptions {
        status_policy: if cli.strict {
            StatusPolicy::Reject
        } else {
            StatusPolicy::Ignore
        },
        expected_tag: cli.tag,
    };

    let mut opts = Options {
        command: Command::Config,
        use_stdout: false,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        verify: false,
        no_output: false,
        frames: None,
        seconds: DEFAULT_PLAY_SECONDS,
        step: DEFAULT_STEP,
        playback,
        input_files: Vec::new(),
        output_file: None,
    };

    match cli.command {
        Cmd::Info(args) => {
            opts.command = Command::Info;
            opts.verify = args.verify;
            opts.input_files = args.inputs;
        }
        Cmd::Frames(args) => {
            opts.command = Command::Frames;
            opts.input_files = vec![args.input];
        }
        Cmd::Decode(args) => {
            opts.command = Command::Decode;
            opts.use_stdout = args.stdout;
            opts.no_output = args.no_output;
            opts.frames = args.frames;
            opts.input_files = vec![args.input];
            opts.output_file = args.output;
        }
        Cmd::Play(args) => {
            opts.command = Command::Play;
            opts.seconds = args.seconds;
            opts.step = args.step;
            opts.input_files = vec![args.input];
        }
        Cmd::Config => {}
    }

    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("d2m".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => eprintln!("{s}"),
        Err(e) => eprintln!("d2m: json: {e}"),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("d2m version {version} (Rust)");

    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;

    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("HEADER_SIZE={HEADER_SIZE}");
    eprintln!("TYPE_DXT1={TYPE_DXT1}");
    eprintln!("TYPE_DXT5={TYPE_DXT5}");
    eprintln!("BLOCK_DIM={BLOCK_DIM}");
    eprintln!("MAX_DIMENSION={MAX_DIMENSION}");

    0
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn print_summary(path: &Path, s: &StreamSummary, verified: bool) {
    let h = &s.header;
    let l = &s.layout;
    println!("{}:", path.display());
    println!("  tag:               \"{}\"", h.tag_lossy());
    println!("  version:           {}", h.version);
    println!("  fps:               {}", h.fps);
    println!("  type:              {} ({})", h.ty, l.pixel_format);
    println!("  size:              {}x{}", h.width, h.height);
    println!("  frames:            {}", h.frame_count);
    println!("  image buffer size: {}", l.image_buffer_size);
    println!("  block size:        {}", l.block_size);
    println!("  block count:       {}", l.block_count);
    if verified {
        let t = &s.totals;
        println!("  stream end:        {}", s.stream_end);
        println!("  trailing bytes:    {}", s.trailing_bytes);
        println!(
            "  records:           {} unchanged, {} first-half, {} second-half, {} full, {} unknown",
            t.unchanged, t.first_half, t.second_half, t.full, t.unknown
        );
    }
}

fn summary_json(path: &Path, s: &StreamSummary) -> serde_json::Value {
    serde_json::json!({
        "file": path.display().to_string(),
        "version": s.header.version,
        "fps": s.header.fps,
        "format": s.layout.pixel_format.name(),
        "width": s.header.width,
        "height": s.header.height,
        "frames": s.header.frame_count,
        "image_buffer_size": s.layout.image_buffer_size,
        "block_count": s.layout.block_count,
        "stream_end": s.stream_end,
        "trailing_bytes": s.trailing_bytes,
        "changed_blocks": s.totals.changed_blocks(),
        "unknown_status": s.totals.unknown,
    })
}

fn cmd_info(opts: &Options) -> i32 {
    let mut status = 0;

    if opts.verify {
        for (path, result) in d2m_io::verify_files(&opts.input_files, &opts.playback) {
            match result {
                Ok(summary) => {
                    if !opts.quiet {
                        print_summary(&path, &summary, true);
                    }
                    if opts.json_output {
                        print_json(&summary_json(&path, &summary));
                    }
                }
                Err(e) => {
                    eprintln!("d2m: {}: {e}", path.display());
                    status = 1;
                }
            }
        }
        return status;
    }

    for path in &opts.input_files {
        let playback = match d2m_io::open_file(path, opts.playback.clone()) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("d2m: {}: {e}", path.display());
                status = 1;
                continue;
            }
        };
        let summary = StreamSummary {
            header: *playback.header(),
            layout: *playback.layout(),
            totals: playback.last_report().map(|r| r.stats).unwrap_or_default(),
            stream_end: 0,
            trailing_bytes: 0,
        };
        if !opts.quiet {
            print_summary(path, &summary, false);
        }
        if opts.json_output {
            print_json(&summary_json(path, &summary));
        }
    }

    status
}

// ---------------------------------------------------------------------------
// Frames command
// ---------------------------------------------------------------------------

fn cmd_frames(opts: &Options) -> i32 {
    let path = &opts.input_files[0];
    let mut playback = match d2m_io::open_file(path, opts.playback.clone()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("d2m: {}: {e}", path.display());
            return 1;
        }
    };

    println!("frame   offset  unchanged  first  second   full  unknown    bytes");
    let mut offset = HEADER_SIZE;
    let mut rows = Vec::new();
    let mut report = playback.last_report().copied();

    for n in 0..playback.frame_count() {
        if n > 0 {
            match playback.advance() {
                Ok(r) => report = Some(r),
                Err(e) => {
                    eprintln!("d2m: {}: {e}", path.display());
                    return 1;
                }
            }
        }
        let Some(r) = report else { break };
        let s = &r.stats;
        println!(
            "{:>5} {:>8} {:>10} {:>6} {:>7} {:>6} {:>8} {:>8}",
            r.frame_index, offset, s.unchanged, s.first_half, s.second_half, s.full, s.unknown,
            s.bytes_consumed
        );
        if opts.json_output {
            rows.push(serde_json::json!({
                "frame": r.frame_index,
                "offset": offset,
                "unchanged": s.unchanged,
                "first_half": s.first_half,
                "second_half": s.second_half,
                "full": s.full,
                "unknown": s.unknown,
                "bytes": s.bytes_consumed,
            }));
        }
        offset += s.bytes_consumed as usize;
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "frames",
            "frames": rows,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> i32 {
    let path = &opts.input_files[0];

    let result = if opts.no_output {
        d2m_io::read_stream(path).and_then(|data| {
            d2m_io::decode_to(data, &mut io::sink(), opts.frames, opts.playback.clone())
        })
    } else if opts.use_stdout || opts.output_file.is_none() {
        let mut out = BufWriter::with_capacity(BUF_SIZE, io::stdout().lock());
        d2m_io::read_stream(path)
            .and_then(|data| d2m_io::decode_to(data, &mut out, opts.frames, opts.playback.clone()))
            .and_then(|stats| {
                out.flush()?;
                Ok(stats)
            })
    } else {
        let Some(output) = opts.output_file.as_ref() else {
            return 1;
        };
        if output.exists() && !opts.force {
            eprintln!(
                "d2m: output file exists, use -f to overwrite: {}",
                output.display()
            );
            return 1;
        }
        d2m_io::decode_file(path, output, opts.frames, opts.playback.clone())
    };

    let stats = match result {
        Ok(s) => s,
        Err(IoError::Io(e)) => {
            eprintln!("d2m: {}: {e}", path.display());
            return 1;
        }
        Err(e) => {
            eprintln!("d2m: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "d2m: decoder: input size: {}, frames: {}, output size: {}, loops: {}",
            stats.input_size, stats.frames, stats.output_size, stats.loops
        );
        if let Some(sha) = stats.output_sha256 {
            eprintln!("d2m: output sha256: {}", hex(&sha));
        }
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "decode",
            "input_size": stats.input_size,
            "output_size": stats.output_size,
            "frames": stats.frames,
            "loops": stats.loops,
            "changed_blocks": stats.totals.changed_blocks(),
            "sha256": stats.output_sha256.map(|s| hex(&s)),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Play command
// ---------------------------------------------------------------------------

fn cmd_play(opts: &Options) -> i32 {
    let path = &opts.input_files[0];
    let ticks = match play_ticks(opts.seconds, opts.step) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("d2m: {e}");
            return 1;
        }
    };
    let mut playback = match d2m_io::open_file(path, opts.playback.clone()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("d2m: {}: {e}", path.display());
            return 1;
        }
    };

    let mut decoded = 0u64;
    for _ in 0..ticks {
        match playback.tick(opts.step) {
            Ok(TickOutcome::Decoded(r)) => {
                decoded += 1;
                if opts.verbose > 1 && !opts.quiet {
                    eprintln!(
                        "d2m: frame {} ({} changed blocks)",
                        r.frame_index,
                        r.stats.changed_blocks()
                    );
                }
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("d2m: {}: {e}", path.display());
                return 1;
            }
        }
    }

    let cursor = playback.cursor();
    if !opts.quiet {
        println!(
            "{} ticks of {:.4}s: {} frames decoded ({} fps nominal), {} loops, next frame {}",
            ticks,
            opts.step,
            decoded,
            playback.header().fps,
            playback.loops_completed(),
            cursor.frame_index
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "play",
            "ticks": ticks,
            "step": opts.step,
            "decoded": decoded,
            "loops": playback.loops_completed(),
            "frame_index": cursor.frame_index,
            "stream_offset": cursor.stream_offset,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let default_filter = match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Info => cmd_info(&opts),
        Command::Frames => cmd_frames(&opts),
        Command::Decode => cmd_decode(&opts),
        Command::Play => cmd_play(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("d2m".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    #[test]
    fn parse_tag_pads_and_limits() {
        assert_eq!(parse_tag("D2M").unwrap(), *b"D2M\0");
        assert_eq!(parse_tag("ABCD").unwrap(), *b"ABCD");
        assert!(parse_tag("ABCDE").is_err());
    }

    #[test]
    fn parse_seconds_rejects_non_positive() {
        assert_eq!(parse_seconds("0.5").unwrap(), 0.5);
        assert!(parse_seconds("0").is_err());
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("abc").is_err());
    }

    #[test]
    fn decode_subcommand_maps_correctly() {
        let opts = parse_opts(&[
            "--strict",
            "decode",
            "--frames",
            "12",
            "--check-only",
            "in.d2m",
            "out.raw",
        ]);
        assert_eq!(opts.command, Command::Decode);
        assert_eq!(opts.frames, Some(12));
        assert!(opts.no_output);
        assert_eq!(opts.playback.status_policy, StatusPolicy::Reject);
        assert_eq!(opts.input_files, vec![PathBuf::from("in.d2m")]);
        assert_eq!(opts.output_file, Some(PathBuf::from("out.raw")));
    }

    #[test]
    fn info_accepts_many_files() {
        let opts = parse_opts(&["info", "--verify", "a.d2m", "b.d2m"]);
        assert_eq!(opts.command, Command::Info);
        assert!(opts.verify);
        assert_eq!(opts.input_files.len(), 2);
        assert_eq!(opts.playback.status_policy, StatusPolicy::Ignore);
    }

    #[test]
    fn play_defaults() {
        let opts = parse_opts(&["play", "a.d2m"]);
        assert_eq!(opts.command, Command::Play);
        assert_eq!(opts.seconds, DEFAULT_PLAY_SECONDS);
        assert_eq!(opts.step, DEFAULT_STEP);

        let opts = parse_opts(&["play", "--seconds", "2", "--step", "0.01", "a.d2m"]);
        assert_eq!(opts.seconds, 2.0);
        assert_eq!(opts.step, 0.01);
    }

    #[test]
    fn global_flags() {
        let opts = parse_opts(&["--force", "--tag", "D2M", "--json", "frames", "x.d2m"]);
        assert!(opts.force);
        assert!(opts.json_output);
        assert_eq!(opts.playback.expected_tag, Some(*b"D2M\0"));
        assert_eq!(opts.command, Command::Frames);
    }

    #[test]
    fn verbose_is_capped() {
        let verbose = parse_opts(&["-v", "-v", "-v", "config"]);
        assert_eq!(verbose.verbose, 2);
        assert_eq!(verbose.command, Command::Config);
    }

    #[test]
    fn play_ticks_is_bounded() {
        assert_eq!(play_ticks(1.0, 0.02).unwrap(), 50);
        assert_eq!(play_ticks(5.0, DEFAULT_STEP).unwrap(), 300);
        assert!(play_ticks(1e12, 1e-9).is_err());
        assert!(play_ticks(f64::MAX, f64::MIN_POSITIVE).is_err());
    }

    #[test]
    fn hex_is_lowercase() {
        assert_eq!(hex(&[0x00, 0xAB, 0x0F]), "00ab0f");
    }
}
