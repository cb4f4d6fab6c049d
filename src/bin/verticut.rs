use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use verticut::{ClipboardReporter, FailureReporter, NoopReporter};

#[derive(Parser, Debug)]
#[command(name = "verticut", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Do not copy the error message to the clipboard on failure.
    #[arg(long, global = true)]
    no_clipboard: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reframe a landscape video into a 9:16 MP4 with the source audio (requires `ffmpeg`).
    Convert(ConvertArgs),
    /// Composite a single still image and write it as a PNG.
    Frame(FrameArgs),
    /// Print what `ffprobe` reports about a source video.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Source video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path. Defaults to `output_9_16_short.mp4`.
    #[arg(long)]
    out: Option<PathBuf>,

    /// JSON run configuration; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Silent intermediate video path.
    #[arg(long)]
    temp_video: Option<PathBuf>,

    /// Extracted audio path.
    #[arg(long)]
    temp_audio: Option<PathBuf>,

    /// Directory for generated temp files.
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// `ffmpeg` program to run.
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// `ffprobe` program to run.
    #[arg(long)]
    ffprobe: Option<PathBuf>,

    /// Time limit for each audio extract / merge step.
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// Log progress every N frames (0 disables).
    #[arg(long)]
    progress_every: Option<u64>,

    /// Fail instead of replacing an existing output file.
    #[arg(long)]
    no_overwrite: bool,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input image (any format the `image` crate decodes).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// JSON run configuration; only its geometry is used.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Source video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// `ffprobe` program to run.
    #[arg(long, default_value = "ffprobe")]
    ffprobe: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let reporter: Box<dyn FailureReporter> = if cli.no_clipboard {
        Box::new(NoopReporter)
    } else {
        Box::new(ClipboardReporter::default())
    };
    reported(dispatch(cli.cmd), reporter.as_ref())
}

fn dispatch(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Convert(args) => cmd_convert(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

/// Hand any fatal error to the reporter before it reaches `main`'s exit path.
fn reported(result: anyhow::Result<()>, reporter: &dyn FailureReporter) -> anyhow::Result<()> {
    if let Err(err) = &result {
        reporter.report(&format!("{err:#}"));
    }
    result
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "info,verticut=debug",
        _ => "debug,verticut=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<verticut::PipelineConfig> {
    Ok(match path {
        Some(p) => verticut::PipelineConfig::load_json(p)?,
        None => verticut::PipelineConfig::default(),
    })
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(args.config.as_deref())?;
    cfg.source = args.in_path;
    if let Some(out) = args.out {
        cfg.output = out;
    }
    if args.temp_video.is_some() {
        cfg.temp_video = args.temp_video;
    }
    if args.temp_audio.is_some() {
        cfg.temp_audio = args.temp_audio;
    }
    if args.temp_dir.is_some() {
        cfg.temp_dir = args.temp_dir;
    }
    if let Some(ffmpeg) = args.ffmpeg {
        cfg.tools.ffmpeg = ffmpeg;
    }
    if let Some(ffprobe) = args.ffprobe {
        cfg.tools.ffprobe = ffprobe;
    }
    if args.timeout_secs.is_some() {
        cfg.collaborator_timeout_secs = args.timeout_secs;
    }
    if let Some(n) = args.progress_every {
        cfg.progress_interval = n;
    }
    if args.no_overwrite {
        cfg.overwrite = false;
    }

    let mut pipeline = verticut::Pipeline::with_ffmpeg(cfg)?;
    let summary = pipeline.run()?;
    for w in &summary.warnings {
        eprintln!("warning: {w}");
    }
    eprintln!(
        "wrote {} ({} frames)",
        summary.output.display(),
        summary.frames_written
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    cfg.geometry.validate()?;

    let img = image::open(&args.in_path)
        .with_context(|| format!("open image '{}'", args.in_path.display()))?
        .to_rgb8();
    let frame = verticut::Frame::from_image(img);
    let out = verticut::composite_frame(&frame, &cfg.geometry)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &out.data,
        out.width,
        out.height,
        image::ColorType::Rgb8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let info = verticut::probe_source(&args.ffprobe, &args.in_path)?;
    println!("path:        {}", info.path.display());
    println!("dimensions:  {}x{}", info.width, info.height);
    println!("fps:         {} ({:.3})", info.fps, info.fps.as_f64());
    match info.frame_count {
        Some(n) => println!("frames:      {n}"),
        None => println!("frames:      unknown"),
    }
    if let Some(d) = info.duration_sec {
        println!("duration:    {d:.3}s");
    }
    println!("audio:       {}", if info.has_audio { "yes" } else { "no" });
    Ok(())
}
