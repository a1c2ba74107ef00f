//! # Timelapser - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Creazione della configurazione (file JSON + override da CLI)
//! - Avvio di una singola elaborazione (`create`) o del server HTTP (`serve`)
//!
//! ## Flusso di esecuzione (`create`):
//! 1. Espande file e directory in una lista ordinata di immagini
//! 2. Carica le immagini in memoria come `ImageInput`
//! 3. Costruisce il timelapse con `TimelapseBuilder`
//! 4. Scrive il video su disco e stampa le statistiche
//!
//! ## Esempio di utilizzo:
//! ```bash
//! timelapser create ./shots -o sunset.mp4 --quality 90 --workers 8
//! timelapser serve --port 8000 --cors-origin http://localhost:5173
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use timelapser::{
    file_manager::FileManager,
    json_output::JsonMessage,
    server,
    video_processor::{check_dependencies, probe_video},
    Config, ServerConfig, TimelapseBuilder,
};

#[derive(Parser)]
#[command(name = "timelapser", version)]
#[command(about = "Turn an ordered set of images into an H.264 timelapse video")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a timelapse from image files and/or directories
    Create(CreateArgs),
    /// Serve the timelapse HTTP API
    Serve(ServeArgs),
    /// Write the default pipeline configuration to a JSON file
    InitConfig {
        /// Destination of the configuration file
        #[arg(default_value = "timelapser.json")]
        path: PathBuf,
    },
}

/// Pipeline overrides shared by `create` and `serve`
#[derive(Args)]
struct PipelineArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// JPEG quality of the normalized frames (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Longest edge of the output video, derived from the first image
    #[arg(short, long)]
    max_edge: Option<u32>,

    /// Frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Number of parallel normalization workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Video CRF value (0-51, lower = better quality)
    #[arg(short, long)]
    crf: Option<u8>,

    /// x264 preset (ultrafast ... veryslow)
    #[arg(long)]
    preset: Option<String>,

    /// Skip the lossless jpegtran pass on frames
    #[arg(long)]
    no_optimize: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl PipelineArgs {
    async fn load_config(&self) -> Result<Config> {
        let mut config = match self.config {
            Some(ref path) => {
                if !path.exists() {
                    return Err(anyhow::anyhow!("Config file does not exist: {}", path.display()));
                }
                Config::from_file(path).await?
            }
            None => Config::default(),
        };

        if let Some(quality) = self.quality {
            config.jpeg_quality = quality;
        }
        if let Some(max_edge) = self.max_edge {
            config.max_edge = max_edge;
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(crf) = self.crf {
            config.video_crf = crf;
        }
        if let Some(ref preset) = self.preset {
            config.video_preset = preset.clone();
        }
        if self.no_optimize {
            config.optimize_frames = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
struct CreateArgs {
    /// Image files or directories, in frame order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output video file
    #[arg(short, long, default_value = "timelapse.mp4")]
    output: PathBuf,

    /// Inspect the written video with ffprobe
    #[arg(long)]
    probe: bool,

    /// Output progress and results as JSON lines
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Allowed browser origin (repeatable)
    #[arg(long = "cors-origin")]
    cors_origins: Vec<String>,

    /// Maximum upload size in MiB
    #[arg(long)]
    max_upload_mb: Option<usize>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create(args) => {
            init_logging(args.pipeline.verbose)?;
            run_create(args).await
        }
        Commands::Serve(args) => {
            init_logging(args.pipeline.verbose)?;
            run_serve(args).await
        }
        Commands::InitConfig { path } => {
            init_logging(false)?;
            Config::default().save_to_file(&path).await?;
            info!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays free for the JSON stream
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run_create(args: CreateArgs) -> Result<()> {
    let start_time = Instant::now();

    let mut config = args.pipeline.load_config().await?;
    config.show_progress = !args.json;
    config.json_output = args.json;

    check_dependencies().await?;

    let paths = FileManager::collect_image_paths(&args.inputs)?;
    info!("Found {} images", paths.len());
    let inputs = FileManager::load_inputs(&paths).await?;

    let builder = TimelapseBuilder::new(config).await?;
    let timelapse = match builder.build(inputs).await {
        Ok(timelapse) => timelapse,
        Err(e) => {
            if args.json {
                JsonMessage::error(e.to_string(), Some(format!("{:?}", e.class()))).emit();
            }
            return Err(e.into());
        }
    };

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(&args.output, &timelapse.bytes)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    let elapsed = start_time.elapsed().as_secs_f64();

    if args.json {
        JsonMessage::complete(
            args.output.clone(),
            timelapse.resolution,
            timelapse.fps,
            &timelapse.stats,
            elapsed,
        )
        .emit();
    } else {
        info!(
            "🎉 Wrote {} ({}, {} frames at {} fps, {:.1}s of video) in {:.1}s",
            args.output.display(),
            timelapse.resolution,
            timelapse.frame_indices.len(),
            timelapse.fps,
            timelapse.duration_seconds(),
            elapsed
        );
        info!("{}", timelapse.stats.format_summary());
        if !timelapse.dropped.is_empty() {
            warn!("Dropped images (by index): {:?}", timelapse.dropped);
        }
    }

    if args.probe {
        match probe_video(&args.output).await {
            Ok(video) => info!(
                "🔎 {}x{} {} | {} frames | {:.2}s",
                video.width, video.height, video.codec, video.frames, video.duration
            ),
            Err(e) => warn!("Could not probe {}: {}", args.output.display(), e),
        }
    }

    Ok(())
}

fn upload_limit_bytes(mb: usize) -> Result<usize> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("Upload limit of {} MiB is too large", mb))
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = args.pipeline.load_config().await?;
    config.show_progress = false;
    config.json_output = false;

    let mut server_config = ServerConfig::default();
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if !args.cors_origins.is_empty() {
        server_config.cors_origins = args.cors_origins;
    }
    if let Some(mb) = args.max_upload_mb {
        server_config.max_upload_bytes = upload_limit_bytes(mb)?;
    }

    info!(
        "Pipeline: max edge {}, JPEG quality {}, {} fps, CRF {}, {} workers",
        config.max_edge, config.jpeg_quality, config.fps, config.video_crf, config.workers
    );

    let builder = TimelapseBuilder::new(config).await?;
    server::serve(server_config, builder).await
}
