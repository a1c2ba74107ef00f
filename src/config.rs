//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione della pipeline e del server.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i preset di normalizzazione ed encoding
//! - Definisce la struct `ServerConfig` per il trasporto HTTP
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `max_edge`: Lato massimo del primo frame (default: 1920)
//! - `jpeg_quality`: Qualità JPEG dei frame normalizzati (1-100, default: 85)
//! - `optimize_frames`: Ottimizzazione lossless dei frame con jpegtran (default: true)
//! - `resize_algorithm`: Filtro di resize (default: Lanczos)
//! - `fps`: Frame rate del video (default: 24)
//! - `codec`: Codec video (default: H.264 in MP4)
//! - `video_crf`: CRF video (0-51, default: 23)
//! - `video_preset`: Preset x264 (default: "medium")
//! - `workers`: Numero di worker paralleli (default: core disponibili)
//! - `scratch_root`: Directory in cui creare le scratch dir (default: temp di sistema)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     jpeg_quality: 90,
//!     workers: 8,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::resize::ResizeAlgorithm;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Longest edge of the first image after scaling
pub const DEFAULT_MAX_EDGE: u32 = 1920;
/// JPEG quality of the intermediate frames
pub const DEFAULT_JPEG_QUALITY: u8 = 85;
/// Output frame rate
pub const DEFAULT_FPS: u32 = 24;

/// Output video codec. Only H.264 in an MP4 container is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
}

impl VideoCodec {
    /// ffmpeg encoder name
    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "mp4",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "video/mp4",
        }
    }
}

/// Configuration for the timelapse pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Longest edge of the target resolution, derived from the first image
    pub max_edge: u32,
    /// JPEG quality of normalized frames (1-100)
    pub jpeg_quality: u8,
    /// Run a lossless jpegtran pass on every normalized frame when available
    pub optimize_frames: bool,
    /// Resampling filter used to reach the target resolution
    pub resize_algorithm: ResizeAlgorithm,
    /// Output frame rate
    pub fps: u32,
    /// Output codec
    pub codec: VideoCodec,
    /// Video CRF value (0-51, lower = better quality)
    pub video_crf: u8,
    /// x264 preset
    pub video_preset: String,
    /// Number of parallel normalization workers
    pub workers: usize,
    /// Parent directory for request scratch directories (None = system temp dir)
    pub scratch_root: Option<PathBuf>,
    /// Show a progress bar while normalizing
    pub show_progress: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_edge: DEFAULT_MAX_EDGE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            optimize_frames: true,
            resize_algorithm: ResizeAlgorithm::default(),
            fps: DEFAULT_FPS,
            codec: VideoCodec::default(),
            video_crf: 23,
            video_preset: "medium".to_string(),
            workers: default_workers(),
            scratch_root: None,
            show_progress: false,
            json_output: false,
        }
    }
}

/// Worker pool size matching the host's concurrency
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

const X264_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_edge == 0 {
            return Err(anyhow::anyhow!("Max edge must be greater than 0"));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(anyhow::anyhow!("JPEG quality must be between 1 and 100"));
        }

        if self.fps == 0 {
            return Err(anyhow::anyhow!("Frame rate must be greater than 0"));
        }

        if self.video_crf > 51 {
            return Err(anyhow::anyhow!("Video CRF must be between 0 and 51"));
        }

        if !X264_PRESETS.contains(&self.video_preset.as_str()) {
            return Err(anyhow::anyhow!(
                "Unknown video preset '{}', expected one of: {}",
                self.video_preset,
                X264_PRESETS.join(", ")
            ));
        }

        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if let Some(ref scratch_root) = self.scratch_root {
            if !scratch_root.is_dir() {
                return Err(anyhow::anyhow!(
                    "Scratch root is not a directory: {}",
                    scratch_root.display()
                ));
            }
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Configuration for the HTTP transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API from a browser
    pub cors_origins: Vec<String>,
    /// Maximum size of one multipart upload
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:5173".to_string()],
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Upload limit must be greater than 0"));
        }
        for origin in &self.cors_origins {
            // Credentials are allowed, which rules out a wildcard origin
            if origin.trim() == "*" {
                return Err(anyhow::anyhow!(
                    "Wildcard CORS origin '*' is not allowed, list explicit origins"
                ));
            }
            origin
                .parse::<axum::http::HeaderValue>()
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
