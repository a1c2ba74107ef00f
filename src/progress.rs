//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking della normalizzazione e le
//! statistiche di una richiesta timelapse.
//!
//! ## Componenti principali:
//! - `ProgressManager`: progress bar `indicatif` (nascosta in modalità server o JSON)
//! - `TimelapseStats`: contatori della richiesta (immagini, frame, byte)
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:04] [========================================] 120/120 (100%) ✅ #119 IMG_0119.jpg
//! ```

use crate::file_manager::FileManager;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporting for the normalization stage
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a progress bar over `total` images; `visible = false` draws nothing
    pub fn new(total: u64, visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Counters for one timelapse request
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimelapseStats {
    pub images_received: usize,
    pub input_bytes: u64,
    pub frames_normalized: usize,
    pub normalization_failures: usize,
    pub frames_written: usize,
    pub frames_skipped: usize,
    pub output_bytes: u64,
}

impl TimelapseStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Images that did not make it into the video, for any reason
    pub fn dropped(&self) -> usize {
        self.normalization_failures + self.frames_skipped
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Images: {} ({}) | Frames: {} written, {} dropped | Video: {}",
            self.images_received,
            FileManager::format_size(self.input_bytes),
            self.frames_written,
            self.dropped(),
            FileManager::format_size(self.output_bytes)
        )
    }
}
