use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use framecut::{
    CancellationToken, ComputeDispatcher, Draft, ErrorPolicy, FfmpegSink, FfmpegSinkOpts,
    FrameIndex, FrameSink, ImageSequenceFormat, ImageSequenceSink, MediaDecoder,
    RenderOpts, RenderSession,
};

#[derive(Parser, Debug)]
#[command(name = "framecut", version)]
struct Cli {
    /// Log at debug level.
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a 16-bit RGBA PNG.
    Frame(FrameArgs),
    /// Render a frame range to a video (requires `ffmpeg` on PATH) or a PNG sequence.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Draft JSON.
    #[arg(long)]
    draft: PathBuf,

    /// Directory relative clip paths are resolved against. Defaults to the draft's directory.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputMode {
    /// Video through `ffmpeg`.
    Video,
    /// 16-bit RGB PNG sequence.
    Png16,
    /// 8-bit RGB PNG sequence.
    Png8,
    /// 16-bit RGBA PNG sequence.
    Png16Alpha,
    /// 8-bit RGBA PNG sequence.
    Png8Alpha,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Draft JSON.
    #[arg(long)]
    draft: PathBuf,

    /// Directory relative clip paths are resolved against. Defaults to the draft's directory.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Output video path, or output directory for PNG modes.
    #[arg(long)]
    out: PathBuf,

    /// Frames to render, e.g. `0-299` (inclusive). Must be contiguous. Defaults to the draft.
    #[arg(long)]
    range: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputMode::Video)]
    mode: OutputMode,

    /// `ffmpeg` video encoder.
    #[arg(long, default_value = "libx264")]
    encoder: String,

    /// `ffmpeg` output pixel format.
    #[arg(long, default_value = "yuv420p")]
    pix_fmt: String,

    /// Clamp flattened color channels to this value (0 = unbounded).
    #[arg(long, default_value_t = 0)]
    upper_bound: u16,

    /// Worker count. Defaults to 1.75 per core.
    #[arg(long)]
    threads: Option<usize>,

    /// Fail after the run when any frame failed.
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Stop at the first failed frame.
    #[arg(long, default_value_t = false)]
    stop_on_error: bool,

    /// Print `frame_done:{index}` per written frame on stdout.
    #[arg(long, default_value_t = false)]
    progress: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn load_draft(path: &Path, assets: Option<&Path>) -> anyhow::Result<(Draft, MediaDecoder)> {
    let draft =
        Draft::from_path(path).with_context(|| format!("load draft '{}'", path.display()))?;
    let assets_root = assets
        .or_else(|| path.parent())
        .unwrap_or_else(|| Path::new("."));
    let decoder = MediaDecoder::open(&draft, assets_root).context("open clip sources")?;
    Ok((draft, decoder))
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let (draft, decoder) = load_draft(&args.draft, args.assets.as_deref())?;
    let sess = RenderSession::new(
        &draft,
        Arc::new(decoder),
        ComputeDispatcher::cpu(),
        RenderOpts::default(),
    )?;
    let pic = sess.render_frame(FrameIndex(args.frame))?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let buf = image::ImageBuffer::<image::Rgba<u16>, _>::from_raw(
        pic.width(),
        pic.height(),
        pic.to_rgba16(),
    )
    .context("frame buffer does not match its dimensions")?;
    buf.save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let (draft, decoder) = load_draft(&args.draft, args.assets.as_deref())?;
    let range = match args.range.as_deref() {
        Some(text) => framecut::parse_frame_range(text)?,
        None => draft.range(),
    };

    let error_policy = if args.stop_on_error {
        ErrorPolicy::Immediate
    } else if args.strict {
        ErrorPolicy::Strict
    } else {
        ErrorPolicy::Deferred
    };
    let (progress_tx, progress_rx) = if args.progress {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };
    let mut opts = RenderOpts {
        error_policy,
        progress: progress_tx,
        ..RenderOpts::default()
    };
    if let Some(n) = args.threads {
        opts.max_threads = n;
    }
    opts.blend.upper_bound = args.upper_bound;

    let mut sink: Box<dyn FrameSink> = match args.mode {
        OutputMode::Video => Box::new(FfmpegSink::new(FfmpegSinkOpts {
            encoder: args.encoder.clone(),
            pix_fmt: args.pix_fmt.clone(),
            upper_bound: args.upper_bound,
            ..FfmpegSinkOpts::new(&args.out)
        })),
        OutputMode::Png16 => png_sink(&args, ImageSequenceFormat::Png16),
        OutputMode::Png8 => png_sink(&args, ImageSequenceFormat::Png8),
        OutputMode::Png16Alpha => png_sink(&args, ImageSequenceFormat::Png16Alpha),
        OutputMode::Png8Alpha => png_sink(&args, ImageSequenceFormat::Png8Alpha),
    };

    let sess = RenderSession::new(&draft, Arc::new(decoder), ComputeDispatcher::cpu(), opts)?;
    let cancel = CancellationToken::new();

    let stats = std::thread::scope(|scope| {
        let printer = progress_rx.map(|rx| {
            scope.spawn(move || {
                for event in rx.iter() {
                    println!("frame_done:{}", event.frame);
                }
            })
        });
        let res = sess.render_range(range, sink.as_mut(), &cancel);
        drop(sess);
        if let Some(printer) = printer {
            let _ = printer.join();
        }
        res
    })?;

    eprintln!(
        "wrote {} ({} frames, {} failed)",
        args.out.display(),
        stats.frames_total,
        stats.frames_failed
    );
    Ok(())
}

fn png_sink(args: &RenderArgs, format: ImageSequenceFormat) -> Box<dyn FrameSink> {
    Box::new(ImageSequenceSink::new(&args.out, format).with_upper_bound(args.upper_bound))
}
