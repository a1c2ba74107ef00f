//! # Progress Tracking Module
//!
//! Unifica progress bar e output JSON in un singolo tracker thread-safe,
//! condiviso da tutti i worker di normalizzazione.

use crate::{
    image_processor::FrameOutcome,
    json_output::JsonMessage,
    progress::ProgressManager,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Tracker per la fase di normalizzazione
#[derive(Clone)]
pub struct ProgressTracker {
    pub total: usize,
    completed: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
    progress_manager: ProgressManager,
    json_output: bool,
}

impl ProgressTracker {
    pub fn new(total: usize, show_progress: bool, json_output: bool) -> Self {
        Self {
            total,
            completed: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(AtomicUsize::new(0)),
            // The JSON stream owns stdout, so no bar alongside it
            progress_manager: ProgressManager::new(total as u64, show_progress && !json_output),
            json_output,
        }
    }

    /// Registra il completamento di un'immagine (in qualunque ordine)
    pub fn record(&self, filename: &str, outcome: &FrameOutcome) {
        let current = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        let (message, error) = match outcome {
            Ok(frame) => {
                debug!("Normalized #{} {} -> {}", frame.index, filename, frame.path.display());
                (format!("✅ #{} {}", frame.index, filename), None)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                warn!("Dropping image: {}", e);
                (format!("❌ #{} {}", e.index, filename), Some(e.failure.to_string()))
            }
        };

        self.progress_manager.update(&message);

        if self.json_output {
            let index = match outcome {
                Ok(frame) => frame.index,
                Err(e) => e.index,
            };
            JsonMessage::frame_complete(index, filename, error).emit();
            JsonMessage::progress(current, self.total, self.failures()).emit();
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Finalizza progress bar
    pub fn finish(&self) {
        self.progress_manager.finish(&format!(
            "Normalized {}/{} images ({} failed)",
            self.completed() - self.failures(),
            self.total,
            self.failures()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processor::{NormalizationError, NormalizationFailure, NormalizedFrame};
    use std::path::PathBuf;

    #[test]
    fn test_counts_successes_and_failures() {
        let tracker = ProgressTracker::new(3, false, false);

        tracker.record("a.jpg", &Ok(NormalizedFrame { index: 0, path: PathBuf::from("image_0000.jpg") }));
        tracker.record(
            "b.jpg",
            &Err(NormalizationError {
                index: 1,
                filename: "b.jpg".to_string(),
                failure: NormalizationFailure::Panicked("boom".to_string()),
            }),
        );

        assert_eq!(tracker.completed(), 2);
        assert_eq!(tracker.failures(), 1);

        let clone = tracker.clone();
        clone.record("c.jpg", &Ok(NormalizedFrame { index: 2, path: PathBuf::from("image_0002.jpg") }));
        assert_eq!(tracker.completed(), 3);
        tracker.finish();
    }
}
