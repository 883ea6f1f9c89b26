use clap::Parser;
use photovid::{Configuration, Container, Dimensions, Exporter, FfmpegBackend};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

/// Turn a still image into an H.264 video
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Source image (any format the image crate decodes)
    image: PathBuf,

    /// Video length in seconds; partial frames are dropped
    #[arg(short, long)]
    duration: f64,

    /// Output file; an existing file is replaced
    #[arg(short, long)]
    output: PathBuf,

    /// Frames per second
    #[arg(long, default_value_t = photovid::DEFAULT_FRAME_RATE)]
    fps: u32,

    /// Container format: mp4, mov or m4v
    #[arg(short, long, default_value = "mp4")]
    container: Container,

    /// ffmpeg executable with libx264 (searched on PATH by default)
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut backend = FfmpegBackend::new();
    if let Some(ffmpeg) = &args.ffmpeg {
        backend = backend.with_ffmpeg_path(ffmpeg);
    }

    // Dimensions are taken from the image when exporting
    let configuration = Configuration::new(&args.output, args.container, Dimensions::new(1, 1))
        .with_frame_rate(args.fps);

    let mut exporter = Exporter::with_backend(Box::new(backend));
    let result = exporter
        .configure(configuration)
        .and_then(|_| exporter.export_blocking(&args.image, args.duration));

    match result {
        Ok(path) => {
            info!(output = %path.display(), "Video written");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(%error, "Export failed");
            ExitCode::FAILURE
        }
    }
}
