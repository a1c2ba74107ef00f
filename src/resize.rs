//! # Image Resize Module
//!
//! Questo modulo decide la risoluzione comune del timelapse e fornisce i
//! filtri di ridimensionamento usati dal normalizzatore.
//!
//! ## Caratteristiche
//! - **Risoluzione unica**: calcolata SOLO dalla prima immagine
//! - **Lato massimo**: il lato più lungo viene portato a `max_edge` (default 1920)
//! - **Anche upscaling**: immagini piccole vengono ingrandite, non solo ridotte
//! - **Aspect ratio forzato**: tutti i frame usano le dimensioni del primo,
//!   indipendentemente dal proprio aspect ratio
//!
//! ## Calcolo
//! ```text
//! ratio  = min(max_edge / width, max_edge / height)
//! target = (round(width * ratio), round(height * ratio))
//! ```
//!
//! ## Esempio
//! ```rust,ignore
//! let target = resolve_target_resolution(&first_image_bytes, 1920)?;
//! assert_eq!((target.width(), target.height()), (1920, 1080));
//! ```

use crate::error::{TimelapseError, TimelapseResult};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;

/// Algoritmi di resize supportati
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeAlgorithm {
    /// Lanczos - Migliore qualità (default)
    #[default]
    Lanczos,
    /// Catmull-Rom, buona qualità generale
    #[serde(rename = "catmullrom")]
    CatmullRom,
    /// Gaussian, risultato morbido
    Gaussian,
    /// Triangle - Veloce, qualità accettabile
    Triangle,
    /// Nearest - Pixel perfetto, nessuna interpolazione
    Nearest,
}

impl ResizeAlgorithm {
    /// Converte l'algoritmo nel filtro del crate `image`
    pub fn to_filter_type(&self) -> FilterType {
        match self {
            ResizeAlgorithm::Lanczos => FilterType::Lanczos3,
            ResizeAlgorithm::CatmullRom => FilterType::CatmullRom,
            ResizeAlgorithm::Gaussian => FilterType::Gaussian,
            ResizeAlgorithm::Triangle => FilterType::Triangle,
            ResizeAlgorithm::Nearest => FilterType::Nearest,
        }
    }
}

/// Width and height shared by every frame of one timelapse. Both are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetResolution {
    width: u32,
    height: u32,
}

impl TargetResolution {
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }

    /// Scale `width`x`height` so that its longer edge becomes `max_edge`
    pub fn fit_to_max_edge(width: u32, height: u32, max_edge: u32) -> Option<Self> {
        if width == 0 || height == 0 || max_edge == 0 {
            return None;
        }

        let max_edge = max_edge as f64;
        let ratio = (max_edge / width as f64).min(max_edge / height as f64);
        let scaled_width = ((width as f64 * ratio).round() as u32).max(1);
        let scaled_height = ((height as f64 * ratio).round() as u32).max(1);

        Self::new(scaled_width, scaled_height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_even(&self) -> bool {
        self.width % 2 == 0 && self.height % 2 == 0
    }
}

impl fmt::Display for TargetResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Derive the target resolution from the first image of a set.
///
/// Only the image header is read. Fails with `Decode` when the bytes are not
/// a recognizable image, which aborts the request before any dispatch.
pub fn resolve_target_resolution(
    first_image: &[u8],
    max_edge: u32,
) -> TimelapseResult<TargetResolution> {
    let reader = image::io::Reader::new(Cursor::new(first_image))
        .with_guessed_format()
        .map_err(|e| TimelapseError::Decode(e.to_string()))?;

    if reader.format().is_none() {
        return Err(TimelapseError::Decode("unrecognized image format".to_string()));
    }

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| TimelapseError::Decode(e.to_string()))?;

    TargetResolution::fit_to_max_edge(width, height, max_edge).ok_or_else(|| {
        TimelapseError::Decode(format!("invalid image dimensions {}x{}", width, height))
    })
}
