//! # Timelapse Builder
//!
//! Orchestratore di una richiesta timelapse: dalla lista di `ImageInput` al
//! video codificato in memoria.
//!
//! ## Flusso:
//! 1. Validazione forma della richiesta (lista vuota, media type)
//! 2. Directory scratch dedicata alla richiesta
//! 3. Risoluzione target dalla prima immagine (solo header)
//! 4. Normalizzazione concorrente (`FrameDispatcher`)
//! 5. Assemblaggio video su thread bloccante (`VideoAssembler`)
//! 6. Lettura del file prodotto e rimozione della scratch directory
//!
//! La scratch directory viene rimossa su ogni percorso di uscita, anche in
//! caso di errore o panic.

use crate::{
    config::{Config, VideoCodec},
    error::{TimelapseError, TimelapseResult},
    image_processor::ImageNormalizer,
    input::{validate_inputs, ImageInput},
    json_output::JsonMessage,
    optimizer::{frame_dispatcher::FrameDispatcher, progress_tracker::ProgressTracker},
    platform::PlatformCommands,
    progress::TimelapseStats,
    resize::{resolve_target_resolution, TargetResolution},
    scratch::ScratchDir,
    video_processor::{EncodeSettings, FfmpegSinkFactory, SinkFactory, VideoAssembler},
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// A finished timelapse, ready to be returned to the caller
#[derive(Debug, Clone)]
pub struct Timelapse {
    pub bytes: Vec<u8>,
    pub resolution: TargetResolution,
    pub fps: u32,
    pub codec: VideoCodec,
    /// Indices that made it into the video, ascending
    pub frame_indices: Vec<usize>,
    /// Indices dropped during normalization or assembly, ascending
    pub dropped: Vec<usize>,
    pub stats: TimelapseStats,
}

impl Timelapse {
    /// Suggested download name, e.g. `timelapse.mp4`
    pub fn file_name(&self) -> String {
        format!("timelapse.{}", self.codec.extension())
    }

    pub fn content_type(&self) -> &'static str {
        self.codec.mime_type()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_indices.len() as f64 / self.fps as f64
    }
}

/// Runs the full pipeline for one batch of images
pub struct TimelapseBuilder {
    config: Config,
    normalizer: Arc<ImageNormalizer>,
    sink_factory: Arc<dyn SinkFactory>,
}

impl TimelapseBuilder {
    /// Builder that encodes through the system ffmpeg
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let platform = PlatformCommands::instance();
        let optimizer = if config.optimize_frames {
            let jpegtran = platform.get_tool_path("jpegtran");
            if jpegtran.is_none() {
                warn!("⚠️  jpegtran not found, frames will be written without Huffman optimization");
            }
            jpegtran
        } else {
            None
        };

        if !platform.is_command_available("ffmpeg").await {
            warn!("⚠️  ffmpeg not found, timelapse requests will fail until it is installed");
        }

        let normalizer = ImageNormalizer::new(&config, optimizer);
        Ok(Self::with_parts(config, normalizer, Arc::new(FfmpegSinkFactory)))
    }

    /// Builder with an explicit encoder backend
    pub fn with_sink_factory(config: Config, sink_factory: Arc<dyn SinkFactory>) -> Result<Self> {
        config.validate()?;
        let normalizer = ImageNormalizer::new(&config, None);
        Ok(Self::with_parts(config, normalizer, sink_factory))
    }

    fn with_parts(config: Config, normalizer: ImageNormalizer, sink_factory: Arc<dyn SinkFactory>) -> Self {
        Self {
            config,
            normalizer: Arc::new(normalizer),
            sink_factory,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Turn an ordered batch of images into one video
    pub async fn build(&self, inputs: Vec<ImageInput>) -> TimelapseResult<Timelapse> {
        validate_inputs(&inputs)?;

        let scratch = ScratchDir::create(self.config.scratch_root.as_deref())?;
        let result = self.build_in(&scratch, inputs).await;

        // Failure here is logged by close() and never fails the request
        let _ = scratch.close();
        result
    }

    async fn build_in(&self, scratch: &ScratchDir, inputs: Vec<ImageInput>) -> TimelapseResult<Timelapse> {
        let mut stats = TimelapseStats::new();
        stats.images_received = inputs.len();
        stats.input_bytes = inputs.iter().map(|i| i.bytes.len() as u64).sum();

        if self.config.json_output {
            JsonMessage::start(inputs.len(), &self.config).emit();
        }
        info!("🚀 Building timelapse from {} images", inputs.len());

        let target = resolve_target_resolution(&inputs[0].bytes, self.config.max_edge)?;
        if self.config.json_output {
            JsonMessage::resolution(target).emit();
        }
        info!("📐 Target resolution: {} (from {})", target, inputs[0].filename);

        let tracker = ProgressTracker::new(
            inputs.len(),
            self.config.show_progress,
            self.config.json_output,
        );
        let dispatcher = FrameDispatcher::new(self.normalizer.clone(), self.config.workers);
        let dispatch = dispatcher
            .normalize_all(inputs, target, scratch, &tracker)
            .await?;

        stats.frames_normalized = dispatch.frames.len();
        stats.normalization_failures = dispatch.failures.len();

        let settings = EncodeSettings::from_config(
            &self.config,
            target,
            scratch.output_path(self.config.codec.extension()),
        );
        let sink_factory = self.sink_factory.clone();
        let frames = dispatch.frames;
        let assembly = tokio::task::spawn_blocking(move || {
            VideoAssembler::new(sink_factory).assemble(&frames, &settings)
        })
        .await??;

        stats.frames_written = assembly.written.len();
        stats.frames_skipped = assembly.skipped.len();

        let bytes = scratch.read_file(&assembly.output_path).await?;
        if bytes.is_empty() {
            return Err(TimelapseError::EmptyOutput);
        }
        stats.output_bytes = bytes.len() as u64;

        let mut dropped = dispatch
            .failures
            .iter()
            .map(|e| e.index)
            .chain(assembly.skipped.iter().copied())
            .collect::<Vec<_>>();
        dropped.sort_unstable();

        info!("✅ Timelapse ready: {}", stats.format_summary());

        Ok(Timelapse {
            bytes,
            resolution: target,
            fps: self.config.fps,
            codec: self.config.codec,
            frame_indices: assembly.written,
            dropped,
            stats,
        })
    }
}
