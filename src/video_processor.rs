//! # Video Processing Module
//!
//! Questo modulo assembla i frame normalizzati in un unico video.
//!
//! ## Responsabilità:
//! - Apertura di un encoder (`FrameSink`) alla risoluzione target, 24 fps, H.264
//! - Scrittura sequenziale dei frame in ordine crescente di indice
//! - Salto (con log) dei frame che non si riescono a ri-decodificare
//! - Finalizzazione dell'encoder e verifica che il file esista
//! - Analisi proprietà video con ffprobe
//!
//! ## Pipeline di encoding (ffmpeg):
//! 1. ffmpeg legge frame raw `rgb24` da stdin
//! 2. Codec video: libx264, `yuv420p`, `+faststart`
//! 3. CRF e preset configurabili (default 23 / medium)
//! 4. Risoluzioni dispari: padding di 1 pixel (requisito yuv420p)
//!
//! ## Errori:
//! - `EncoderInit`: ffmpeg mancante o termina prima del primo frame
//! - `Encoder`: ffmpeg fallisce durante la scrittura o la finalizzazione
//! - `EmptyOutput`: nessun frame scritto o file assente/vuoto
//!
//! ## Dipendenze richieste:
//! - `ffmpeg`: Encoding
//! - `ffprobe`: Analisi (opzionale)
//!
//! ## Esempio:
//! ```rust,ignore
//! let assembler = VideoAssembler::new(Arc::new(FfmpegSinkFactory));
//! let report = assembler.assemble(&frames, &settings)?;
//! let info = probe_video(&report.output_path).await?;
//! ```

use crate::args;
use crate::config::{Config, VideoCodec};
use crate::error::{TimelapseError, TimelapseResult};
use crate::image_processor::NormalizedFrame;
use crate::platform::PlatformCommands;
use crate::resize::TargetResolution;
use image::error::{ParameterError, ParameterErrorKind};
use image::{ImageError, RgbImage};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything an encoder sink needs to know up front
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub resolution: TargetResolution,
    pub fps: u32,
    pub codec: VideoCodec,
    pub crf: u8,
    pub preset: String,
    pub output_path: PathBuf,
}

impl EncodeSettings {
    pub fn from_config(config: &Config, resolution: TargetResolution, output_path: PathBuf) -> Self {
        Self {
            resolution,
            fps: config.fps,
            codec: config.codec,
            crf: config.video_crf,
            preset: config.video_preset.clone(),
            output_path,
        }
    }
}

/// A stateful video encoder that receives frames in order
pub trait FrameSink: Send {
    /// Append one frame. Its dimensions must equal the target resolution.
    fn write_frame(&mut self, frame: &RgbImage) -> TimelapseResult<()>;

    /// Flush and close the output file
    fn finish(self: Box<Self>) -> TimelapseResult<()>;
}

/// Opens encoder sinks. Shared across requests, so it must hold no per-request state.
pub trait SinkFactory: Send + Sync {
    fn open(&self, settings: &EncodeSettings) -> TimelapseResult<Box<dyn FrameSink>>;
}

/// Encodes through the system `ffmpeg` binary
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegSinkFactory;

impl FfmpegSinkFactory {
    fn build_args(settings: &EncodeSettings) -> Vec<String> {
        let size = settings.resolution.to_string();
        let mut args = args![
            "-hide_banner",
            "-loglevel", "error",
            "-y",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-s", size,
            "-r", settings.fps,
            "-i", "pipe:0",
            "-an",
            "-c:v", settings.codec.ffmpeg_encoder(),
            "-preset", settings.preset,
            "-crf", settings.crf,
            "-pix_fmt", "yuv420p",
        ];

        if !settings.resolution.is_even() {
            args.extend(args!["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"]);
        }

        args.extend(args!["-movflags", "+faststart"]);
        args
    }
}

impl SinkFactory for FfmpegSinkFactory {
    fn open(&self, settings: &EncodeSettings) -> TimelapseResult<Box<dyn FrameSink>> {
        let platform = PlatformCommands::instance();
        let ffmpeg_path = platform.get_tool_path("ffmpeg").ok_or_else(|| {
            TimelapseError::EncoderInit("ffmpeg is required for video encoding but was not found".to_string())
        })?;

        let args = Self::build_args(settings);
        debug!("Command: {:?} {:?} {}", ffmpeg_path, args, settings.output_path.display());

        let mut child = Command::new(&ffmpeg_path)
            .args(&args)
            .arg(&settings.output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TimelapseError::EncoderInit(format!("Failed to execute {}: {}", ffmpeg_path.display(), e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TimelapseError::EncoderInit("ffmpeg stdin is not available".to_string()))?;

        Ok(Box::new(FfmpegSink {
            child: Some(child),
            stdin: Some(stdin),
            resolution: settings.resolution,
            frames_written: 0,
        }))
    }
}

struct FfmpegSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    resolution: TargetResolution,
    frames_written: u64,
}

impl FfmpegSink {
    /// Stop ffmpeg and turn its stderr into an error
    fn abort(&mut self, cause: std::io::Error) -> TimelapseError {
        drop(self.stdin.take());

        let stderr = match self.child.take() {
            Some(mut child) => {
                let _ = child.kill();
                child
                    .wait_with_output()
                    .map(|output| String::from_utf8_lossy(&output.stderr).trim().to_string())
                    .unwrap_or_default()
            }
            None => String::new(),
        };

        let message = if stderr.is_empty() {
            cause.to_string()
        } else {
            format!("{} ({})", stderr, cause)
        };

        if self.frames_written == 0 {
            TimelapseError::EncoderInit(message)
        } else {
            TimelapseError::Encoder(message)
        }
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> TimelapseResult<()> {
        if frame.width() != self.resolution.width() || frame.height() != self.resolution.height() {
            return Err(TimelapseError::Encoder(format!(
                "frame size mismatch: got {}x{}, expected {}",
                frame.width(),
                frame.height(),
                self.resolution
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(TimelapseError::Encoder("ffmpeg encoder is already finalized".to_string()));
        };

        if let Err(e) = stdin.write_all(frame.as_raw()) {
            return Err(self.abort(e));
        }

        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> TimelapseResult<()> {
        drop(self.stdin.take());

        let Some(child) = self.child.take() else {
            return Err(TimelapseError::Encoder("ffmpeg process already collected".to_string()));
        };

        let output = child
            .wait_with_output()
            .map_err(|e| TimelapseError::Encoder(format!("Failed to wait for ffmpeg: {}", e)))?;

        if !output.status.success() {
            return Err(TimelapseError::Encoder(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!("ffmpeg finalized after {} frames", self.frames_written);
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Outcome of one assembly run
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    /// Indices written to the video, ascending
    pub written: Vec<usize>,
    /// Indices dropped because their scratch frame could not be read back
    pub skipped: Vec<usize>,
    pub output_path: PathBuf,
    pub output_size: u64,
}

/// Writes normalized frames into one video, strictly in index order
pub struct VideoAssembler {
    sink_factory: Arc<dyn SinkFactory>,
}

impl VideoAssembler {
    pub fn new(sink_factory: Arc<dyn SinkFactory>) -> Self {
        Self { sink_factory }
    }

    /// Encode `frames` into `settings.output_path`, in the order given.
    ///
    /// The dispatch layer hands frames over in ascending index order.
    /// Blocking: run it on a blocking thread.
    pub fn assemble(
        &self,
        frames: &[NormalizedFrame],
        settings: &EncodeSettings,
    ) -> TimelapseResult<AssemblyReport> {
        info!(
            "🎬 Assembling {} frames at {} ({} fps, {})",
            frames.len(),
            settings.resolution,
            settings.fps,
            settings.codec.ffmpeg_encoder()
        );

        let mut sink = self.sink_factory.open(settings)?;
        let mut written = Vec::with_capacity(frames.len());
        let mut skipped = Vec::new();

        for frame in frames {
            match load_frame(&frame.path, settings.resolution) {
                Ok(pixels) => {
                    sink.write_frame(&pixels)?;
                    written.push(frame.index);
                }
                Err(e) => {
                    warn!("Skipping frame #{} ({}): {}", frame.index, frame.path.display(), e);
                    skipped.push(frame.index);
                }
            }
        }

        sink.finish()?;

        if written.is_empty() {
            return Err(TimelapseError::EmptyOutput);
        }

        let output_size = match std::fs::metadata(&settings.output_path) {
            Ok(metadata) if metadata.len() > 0 => metadata.len(),
            _ => return Err(TimelapseError::EmptyOutput),
        };

        info!("✅ Video assembled: {} frames written, {} skipped", written.len(), skipped.len());

        Ok(AssemblyReport {
            written,
            skipped,
            output_path: settings.output_path.clone(),
            output_size,
        })
    }
}

/// Decode a scratch frame back to raw RGB, checking it has the target size
fn load_frame(path: &Path, resolution: TargetResolution) -> Result<RgbImage, ImageError> {
    let pixels = image::open(path)?.to_rgb8();

    if pixels.width() != resolution.width() || pixels.height() != resolution.height() {
        return Err(ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        )));
    }

    Ok(pixels)
}

/// Video file information
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub frames: u64,
    pub codec: String,
}

/// Get video information using ffprobe
pub async fn probe_video(video_path: &Path) -> anyhow::Result<VideoInfo> {
    let platform = PlatformCommands::instance();
    let ffprobe_cmd = platform.command_path("ffprobe");

    let output = tokio::process::Command::new(&ffprobe_cmd)
        .args(args![
            "-v", "error",
            "-count_frames",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,codec_name,nb_read_frames",
            "-show_entries", "format=duration",
            "-of", "json",
        ])
        .arg(video_path)
        .output()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to execute {}: {}", ffprobe_cmd.display(), e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    let info: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    parse_probe_output(&info)
}

fn parse_probe_output(info: &serde_json::Value) -> anyhow::Result<VideoInfo> {
    let stream = info["streams"]
        .as_array()
        .and_then(|streams| streams.first())
        .ok_or_else(|| anyhow::anyhow!("No video stream found"))?;

    let duration = info["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let frames = stream["nb_read_frames"]
        .as_str()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(VideoInfo {
        duration,
        width: stream["width"].as_u64().unwrap_or(0) as u32,
        height: stream["height"].as_u64().unwrap_or(0) as u32,
        frames,
        codec: stream["codec_name"].as_str().unwrap_or("unknown").to_string(),
    })
}

/// Check if ffmpeg can be found
pub async fn check_dependencies() -> anyhow::Result<()> {
    if !PlatformCommands::instance().is_command_available("ffmpeg").await {
        return Err(anyhow::anyhow!("ffmpeg is required for video encoding"));
    }
    Ok(())
}
