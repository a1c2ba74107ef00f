//! # File Management Module
//!
//! Questo modulo trasforma gli argomenti della CLI in una lista ordinata di
//! `ImageInput`, come farebbe il livello HTTP con un upload multipart.
//!
//! ## Responsabilità:
//! - Espansione di file e directory in una lista ordinata di path
//! - Determinazione del media type dall'estensione (`image/jpeg`, `image/png`, ...)
//! - Lettura asincrona dei file in memoria
//! - Formattazione human-readable delle dimensioni
//!
//! ## Ordinamento:
//! - I path vengono presi nell'ordine della riga di comando
//! - Le directory contribuiscono i propri file immagine ordinati per nome
//! - I file non immagine dentro una directory vengono ignorati; un file non
//!   immagine passato esplicitamente viene dichiarato `application/octet-stream`
//!   e quindi rifiutato dalla validazione, come un upload non valido
//!
//! ## Esempio:
//! ```rust,ignore
//! let paths = FileManager::collect_image_paths(&[PathBuf::from("./shots")])?;
//! let inputs = FileManager::load_inputs(&paths).await?;
//! ```

use crate::input::ImageInput;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Fallback media type for unknown extensions
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Expand files and directories into an ordered list of paths
    pub fn collect_image_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for path in paths {
            if path.is_dir() {
                let mut found: Vec<PathBuf> = WalkDir::new(path)
                    .max_depth(1)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| Self::is_image(p))
                    .collect();
                files.append(&mut found);
            } else if path.is_file() {
                files.push(path.clone());
            } else {
                return Err(anyhow::anyhow!("Input does not exist: {}", path.display()));
            }
        }

        Ok(files)
    }

    /// Read every path into an `ImageInput`, index = position in `paths`
    pub async fn load_inputs(paths: &[PathBuf]) -> Result<Vec<ImageInput>> {
        let mut inputs = Vec::with_capacity(paths.len());

        for (index, path) in paths.iter().enumerate() {
            let bytes = fs::read(path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
            let filename = path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            inputs.push(ImageInput::new(index, filename, Self::media_type(path), bytes));
        }

        Ok(inputs)
    }

    /// Media type guessed from the file extension
    pub fn media_type(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "tif" | "tiff" => "image/tiff",
            _ => UNKNOWN_MEDIA_TYPE,
        }
    }

    /// Check if a file is an image
    pub fn is_image(path: &Path) -> bool {
        Self::media_type(path) != UNKNOWN_MEDIA_TYPE
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}
