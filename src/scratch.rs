//! # Scratch Storage Module
//!
//! Directory temporanea esclusiva di una singola richiesta.
//!
//! ## Responsabilità:
//! - Crea una directory univoca (`timelapse-XXXXXX`) nella temp di sistema o in `scratch_root`
//! - Fornisce i path dei frame normalizzati (`image_0000.jpg`, ...) e del video finale
//! - Lettura del video finale in memoria
//! - Cancellazione ricorsiva garantita su ogni percorso di uscita (Drop di `TempDir`),
//!   anche in caso di errore o panic
//!
//! ## Esempio:
//! ```rust,ignore
//! let scratch = ScratchDir::create(None)?;
//! let frame = scratch.frame_path(3); // .../image_0003.jpg
//! // ...
//! scratch.close()?; // oppure drop implicito
//! ```

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const SCRATCH_PREFIX: &str = "timelapse-";
const OUTPUT_STEM: &str = "timelapse";

/// Scratch file name of the normalized frame at `index`.
///
/// Zero padded so that directory listing order matches upload order.
pub fn frame_file_name(index: usize) -> String {
    format!("image_{:04}.jpg", index)
}

/// Request-scoped scratch directory, removed when dropped
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh directory under `root`, or under the system temp dir
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);

        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        debug!("Created scratch directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.path().join(frame_file_name(index))
    }

    /// Where the encoder writes the finished video
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.dir.path().join(format!("{}.{}", OUTPUT_STEM, extension))
    }

    pub async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    /// Remove the directory now and report failures instead of swallowing them
    pub fn close(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                debug!("Removed scratch directory: {}", path.display());
                Ok(())
            }
            Err(e) => {
                warn!("Failed to remove scratch directory {}: {}", path.display(), e);
                Err(e)
            }
        }
    }
}
