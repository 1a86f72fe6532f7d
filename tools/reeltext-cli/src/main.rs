//! reeltext CLI: command-line interface for timed text overlays on video.
//!
//! Usage:
//!   reeltext check                       Check ffmpeg and font availability
//!   reeltext probe <VIDEO>               Print probed video metadata
//!   reeltext layout --container --video Compute the letterboxed draw rectangle
//!   reeltext frame <VIDEO> --at <SECS>   Render one composited frame
//!   reeltext export <VIDEO>              Record the composited video in real time

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "reeltext",
    about = "Timed, animated text overlays on top of a video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a JSON config file (defaults to the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check system capabilities
    Check,

    /// Print probed metadata of a video as JSON
    Probe {
        /// Path to the video file
        video: PathBuf,
    },

    /// Print the draw rectangle for a video inside a container
    Layout {
        /// Container size, e.g. 1280x720
        #[arg(long)]
        container: String,

        /// Intrinsic video size, e.g. 1920x1080
        #[arg(long)]
        video: String,
    },

    /// Render a single composited frame
    Frame {
        /// Path to the video file
        video: PathBuf,

        /// JSON edit command stream applied before rendering
        #[arg(long)]
        edits: Option<PathBuf>,

        /// Playback time in seconds
        #[arg(long, default_value = "0")]
        at: f64,

        /// Surface size (defaults to the video size)
        #[arg(long)]
        size: Option<String>,

        /// Write a PNG to this path
        #[arg(short, long, conflicts_with = "display_list")]
        out: Option<PathBuf>,

        /// Print the draw commands as JSON instead of rasterizing
        #[arg(long)]
        display_list: bool,
    },

    /// Export the composited video in real time
    Export {
        /// Path to the video file
        video: PathBuf,

        /// JSON edit command stream applied before exporting
        #[arg(long)]
        edits: Option<PathBuf>,

        /// Surface size (defaults to the video size)
        #[arg(long)]
        size: Option<String>,

        /// Title used for the output file name
        #[arg(long)]
        title: Option<String>,

        /// Output directory (defaults to export.output_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    reeltext_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Check => commands::check::run(&config),
        Commands::Probe { video } => commands::probe::run(video),
        Commands::Layout { container, video } => commands::layout::run(&container, &video),
        Commands::Frame {
            video,
            edits,
            at,
            size,
            out,
            display_list,
        } => commands::frame::run(&config, video, edits, at, size, out, display_list),
        Commands::Export {
            video,
            edits,
            size,
            title,
            out,
        } => commands::export::run(config, video, edits, size, title, out).await,
    }
}
