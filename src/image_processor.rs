//! # Image Processing Module
//!
//! Questo modulo normalizza ogni immagine caricata in un frame JPEG alla
//! risoluzione target del timelapse.
//!
//! ## Pipeline di normalizzazione (per immagine)
//!
//! 1. **Decodifica**: bytes → immagine (JPEG, PNG, WebP, GIF, BMP, TIFF)
//! 2. **Conversione**: RGB 8 bit (l'eventuale canale alpha viene scartato)
//! 3. **Resize**: esattamente alla risoluzione target, filtro Lanczos di default
//! 4. **Encoding**: JPEG a qualità fissa (default 85)
//! 5. **Scrittura**: nel path del frame scelto dal dispatcher (`image_{slot:04}.jpg`)
//! 6. **Ottimizzazione lossless** (opzionale): `jpegtran -optimize` se disponibile
//!
//! ## Gestione errori
//!
//! Un errore su una singola immagine NON interrompe il batch: viene restituito
//! un `NormalizationError` con indice e motivo, loggato e poi filtrato dal
//! livello di dispatch.
//!
//! ## Concorrenza
//!
//! `ImageNormalizer` non ha stato mutabile: la stessa istanza (dietro `Arc`)
//! viene usata da tutti i worker contemporaneamente. Il dispatcher la vede
//! attraverso il trait `FrameNormalizer`.
//!
//! ## Esempio
//! ```rust,ignore
//! let normalizer = ImageNormalizer::new(&config, jpegtran_path);
//! match normalizer.normalize(&input, target, &scratch.frame_path(0)) {
//!     Ok(frame) => println!("frame #{} at {}", frame.index, frame.path.display()),
//!     Err(e) => warn!("{}", e),
//! }
//! ```

use crate::config::Config;
use crate::input::ImageInput;
use crate::resize::{ResizeAlgorithm, TargetResolution};
use crate::utils::to_string_vec;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageError};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// A normalized frame stored in scratch storage at exactly the target resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFrame {
    /// Position of the source image in the submission order
    pub index: usize,
    pub path: PathBuf,
}

/// Why one image could not be normalized
#[derive(thiserror::Error, Debug)]
pub enum NormalizationFailure {
    #[error("decode failed: {0}")]
    Decode(#[source] ImageError),

    #[error("encode failed: {0}")]
    Encode(#[source] ImageError),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// Per-item failure. Recovered locally, never surfaced to the caller on its own.
#[derive(thiserror::Error, Debug)]
#[error("image #{index} ({filename}): {failure}")]
pub struct NormalizationError {
    pub index: usize,
    pub filename: String,
    #[source]
    pub failure: NormalizationFailure,
}

/// Outcome of normalizing one image
pub type FrameOutcome = Result<NormalizedFrame, NormalizationError>;

/// Per-item work run by the dispatch layer on a blocking thread
pub trait FrameNormalizer: Send + Sync {
    /// Normalize `input` to `target` and write the frame to `frame_path`
    fn normalize(&self, input: &ImageInput, target: TargetResolution, frame_path: &Path) -> FrameOutcome;
}

/// Decodes, resizes and re-encodes images. Stateless and shareable across workers.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    jpeg_quality: u8,
    algorithm: ResizeAlgorithm,
    /// jpegtran executable for the lossless pass, resolved once per builder
    optimizer: Option<PathBuf>,
}

impl ImageNormalizer {
    /// Creates a normalizer from the pipeline configuration.
    ///
    /// `optimizer` is the resolved `jpegtran` path; `None` disables the lossless pass.
    pub fn new(config: &Config, optimizer: Option<PathBuf>) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            algorithm: config.resize_algorithm,
            optimizer: if config.optimize_frames { optimizer } else { None },
        }
    }

    pub fn optimizes_frames(&self) -> bool {
        self.optimizer.is_some()
    }
}

impl FrameNormalizer for ImageNormalizer {
    /// CPU bound and blocking: run it on a blocking thread.
    fn normalize(&self, input: &ImageInput, target: TargetResolution, frame_path: &Path) -> FrameOutcome {
        let fail = |failure: NormalizationFailure| NormalizationError {
            index: input.index,
            filename: input.filename.clone(),
            failure,
        };

        let decoded = image::load_from_memory(&input.bytes)
            .map_err(|e| fail(NormalizationFailure::Decode(e)))?;

        debug!(
            "Resizing #{} {}x{} -> {}",
            input.index,
            decoded.width(),
            decoded.height(),
            target
        );

        let resized = image::imageops::resize(
            &decoded.to_rgb8(),
            target.width(),
            target.height(),
            self.algorithm.to_filter_type(),
        );
        drop(decoded);

        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, self.jpeg_quality)
            .encode(resized.as_raw(), resized.width(), resized.height(), ColorType::Rgb8)
            .map_err(|e| fail(NormalizationFailure::Encode(e)))?;

        let path = frame_path.to_path_buf();
        std::fs::write(&path, &encoded).map_err(|e| fail(NormalizationFailure::Io(e)))?;

        if let Some(ref jpegtran) = self.optimizer {
            optimize_in_place(jpegtran, &path);
        }

        Ok(NormalizedFrame {
            index: input.index,
            path,
        })
    }
}

/// Lossless Huffman optimization with jpegtran.
///
/// Any failure keeps the unoptimized frame.
fn optimize_in_place(jpegtran: &Path, frame_path: &Path) {
    let optimized_path = frame_path.with_extension("opt.jpg");

    let status = Command::new(jpegtran)
        .args(to_string_vec(["-optimize", "-copy", "none", "-outfile"]))
        .arg(&optimized_path)
        .arg(frame_path)
        .status();

    match status {
        Ok(status) if status.success() => {
            if let Err(e) = std::fs::rename(&optimized_path, frame_path) {
                warn!("Failed to replace {} with optimized frame: {}", frame_path.display(), e);
                let _ = std::fs::remove_file(&optimized_path);
            }
        }
        Ok(status) => {
            warn!("jpegtran exited with {} for {}, keeping unoptimized frame", status, frame_path.display());
            let _ = std::fs::remove_file(&optimized_path);
        }
        Err(e) => {
            warn!("Failed to execute {}: {}", jpegtran.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::frame_file_name;
    use crate::test_support::{jpeg_bytes, png_rgba_bytes};
    use tempfile::TempDir;

    fn normalizer() -> ImageNormalizer {
        ImageNormalizer::new(&Config::default(), None)
    }

    #[test]
    fn test_normalize_resizes_to_target() {
        let dir = TempDir::new().unwrap();
        let input = ImageInput::new(3, "wide.jpg", "image/jpeg", jpeg_bytes(64, 48, [200, 30, 30]));
        let target = TargetResolution::new(32, 18).unwrap();

        let frame = normalizer()
            .normalize(&input, target, &dir.path().join(frame_file_name(3)))
            .unwrap();
        assert_eq!(frame.index, 3);
        assert!(frame.path.ends_with("image_0003.jpg"));

        let written = image::open(&frame.path).unwrap();
        assert_eq!((written.width(), written.height()), (32, 18));
    }

    #[test]
    fn test_aspect_ratio_is_forced() {
        let dir = TempDir::new().unwrap();
        // Portrait input forced into a landscape target
        let input = ImageInput::new(0, "tall.jpg", "image/jpeg", jpeg_bytes(30, 90, [0, 0, 0]));
        let target = TargetResolution::new(40, 20).unwrap();

        let frame = normalizer()
            .normalize(&input, target, &dir.path().join(frame_file_name(input.index)))
            .unwrap();
        let written = image::open(&frame.path).unwrap();
        assert_eq!((written.width(), written.height()), (40, 20));
    }

    #[test]
    fn test_alpha_images_are_flattened() {
        let dir = TempDir::new().unwrap();
        let input = ImageInput::new(1, "logo.png", "image/png", png_rgba_bytes(16, 16));
        let target = TargetResolution::new(8, 8).unwrap();

        let frame = normalizer()
            .normalize(&input, target, &dir.path().join(frame_file_name(input.index)))
            .unwrap();
        assert!(frame.path.exists());
    }

    #[test]
    fn test_decode_failure_reports_index() {
        let dir = TempDir::new().unwrap();
        let input = ImageInput::new(7, "broken.jpg", "image/jpeg", b"\xff\xd8garbage".to_vec());
        let target = TargetResolution::new(8, 8).unwrap();

        let err = normalizer()
            .normalize(&input, target, &dir.path().join(frame_file_name(7)))
            .unwrap_err();
        assert_eq!(err.index, 7);
        assert_eq!(err.filename, "broken.jpg");
        assert!(matches!(err.failure, NormalizationFailure::Decode(_)));
        assert!(!dir.path().join("image_0007.jpg").exists());
    }

    #[test]
    fn test_missing_scratch_dir_is_io_failure() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("removed");
        let input = ImageInput::new(0, "a.jpg", "image/jpeg", jpeg_bytes(8, 8, [1, 1, 1]));
        let target = TargetResolution::new(8, 8).unwrap();

        let err = normalizer()
            .normalize(&input, target, &gone.join(frame_file_name(0)))
            .unwrap_err();
        assert!(matches!(err.failure, NormalizationFailure::Io(_)));
    }

    #[test]
    fn test_optimizer_disabled_by_config() {
        let config = Config {
            optimize_frames: false,
            ..Default::default()
        };
        let normalizer = ImageNormalizer::new(&config, Some(PathBuf::from("/usr/bin/jpegtran")));
        assert!(!normalizer.optimizes_frames());
    }

    #[test]
    fn test_broken_optimizer_keeps_frame() {
        let dir = TempDir::new().unwrap();
        let normalizer = ImageNormalizer::new(
            &Config::default(),
            Some(PathBuf::from("/no/such/jpegtran")),
        );
        let input = ImageInput::new(0, "a.jpg", "image/jpeg", jpeg_bytes(8, 8, [9, 9, 9]));
        let target = TargetResolution::new(4, 4).unwrap();

        let frame = normalizer
            .normalize(&input, target, &dir.path().join(frame_file_name(0)))
            .unwrap();
        let written = image::open(&frame.path).unwrap();
        assert_eq!((written.width(), written.height()), (4, 4));
    }
}
