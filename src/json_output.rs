//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per chi invoca la CLI
//! da un altro processo (script, GUI).
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio richiesta (numero immagini, configurazione)
//! - `resolution`: Risoluzione target calcolata dalla prima immagine
//! - `frame_complete`: Fine normalizzazione di un'immagine (ok o errore)
//! - `progress`: Progresso corrente della normalizzazione
//! - `complete`: Video prodotto, con statistiche finali
//! - `error`: Errore che ha interrotto la richiesta

use crate::config::Config;
use crate::progress::TimelapseStats;
use crate::resize::TargetResolution;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio della richiesta
    Start {
        total_images: usize,
        config: JsonConfig,
    },

    /// Risoluzione comune dei frame
    Resolution { width: u32, height: u32 },

    /// Fine normalizzazione di una singola immagine
    FrameComplete {
        index: usize,
        filename: String,
        error: Option<String>,
    },

    /// Progresso corrente
    Progress {
        current: usize,
        total: usize,
        percentage: f64,
        failures: usize,
    },

    /// Video completato
    Complete {
        output: PathBuf,
        width: u32,
        height: u32,
        fps: u32,
        frames_written: usize,
        frames_dropped: usize,
        output_bytes: u64,
        duration_seconds: f64,
    },

    /// Errore generale
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct JsonConfig {
    pub max_edge: u32,
    pub jpeg_quality: u8,
    pub fps: u32,
    pub video_crf: u8,
    pub workers: usize,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(total_images: usize, config: &Config) -> Self {
        Self::Start {
            total_images,
            config: JsonConfig::from(config),
        }
    }

    pub fn resolution(target: TargetResolution) -> Self {
        Self::Resolution {
            width: target.width(),
            height: target.height(),
        }
    }

    pub fn frame_complete(index: usize, filename: &str, error: Option<String>) -> Self {
        Self::FrameComplete {
            index,
            filename: filename.to_string(),
            error,
        }
    }

    pub fn progress(current: usize, total: usize, failures: usize) -> Self {
        let percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        Self::Progress {
            current,
            total,
            percentage,
            failures,
        }
    }

    pub fn complete(
        output: PathBuf,
        target: TargetResolution,
        fps: u32,
        stats: &TimelapseStats,
        duration_seconds: f64,
    ) -> Self {
        Self::Complete {
            output,
            width: target.width(),
            height: target.height(),
            fps,
            frames_written: stats.frames_written,
            frames_dropped: stats.dropped(),
            output_bytes: stats.output_bytes,
            duration_seconds,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_edge: config.max_edge,
            jpeg_quality: config.jpeg_quality,
            fps: config.fps,
            video_crf: config.video_crf,
            workers: config.workers,
        }
    }
}
