//! # Frame Dispatcher Module
//!
//! Distribuisce la normalizzazione delle immagini su un pool di worker limitato
//! e raccoglie i risultati nell'ordine di upload.
//!
//! ## Gestione concorrenza:
//! - Semaforo per limitare i worker concorrenti (default: core disponibili)
//! - Ogni immagine gira su `spawn_blocking` (decode/resize/encode sono CPU bound)
//! - Nessuna cancellazione anticipata: il batch arriva sempre fino in fondo
//!
//! ## Ordinamento:
//! - I risultati finiscono in uno slot indirizzato per posizione, non in coda
//!   di completamento
//! - Anche il file del frame è scelto dallo slot (`ScratchDir::frame_path`)
//! - Un panic in un worker diventa un `NormalizationError` per quella immagine

use crate::{
    error::{TimelapseError, TimelapseResult},
    image_processor::{
        FrameNormalizer, FrameOutcome, NormalizationError, NormalizationFailure, NormalizedFrame,
    },
    input::ImageInput,
    optimizer::progress_tracker::ProgressTracker,
    resize::TargetResolution,
    scratch::ScratchDir,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Frames that survived normalization and the failures that were dropped
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Successful frames in submission order
    pub frames: Vec<NormalizedFrame>,
    pub failures: Vec<NormalizationError>,
}

impl DispatchReport {
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|e| e.index).collect()
    }
}

/// Bounded fan-out of the image normalizer
pub struct FrameDispatcher {
    normalizer: Arc<dyn FrameNormalizer>,
    workers: usize,
}

impl FrameDispatcher {
    pub fn new(normalizer: Arc<dyn FrameNormalizer>, workers: usize) -> Self {
        Self {
            normalizer,
            workers: workers.max(1),
        }
    }

    /// Normalize every input against `target`, writing frames into `scratch`.
    ///
    /// Fails with `NoProcessableImages` when every image failed.
    pub async fn normalize_all(
        &self,
        inputs: Vec<ImageInput>,
        target: TargetResolution,
        scratch: &ScratchDir,
        tracker: &ProgressTracker,
    ) -> TimelapseResult<DispatchReport> {
        let total = inputs.len();
        info!("Normalizing {} images to {} with {} workers", total, target, self.workers);

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (slot, input) in inputs.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| TimelapseError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

            let normalizer = self.normalizer.clone();
            let frame_path = scratch.frame_path(slot);
            let tracker = tracker.clone();

            tasks.spawn(async move {
                let _permit = permit; // Keep permit alive
                let index = input.index;
                let filename = input.filename.clone();

                let outcome = tokio::task::spawn_blocking(move || {
                    normalizer.normalize(&input, target, &frame_path)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(NormalizationError {
                        index,
                        filename: filename.clone(),
                        failure: NormalizationFailure::Panicked(e.to_string()),
                    })
                });

                tracker.record(&filename, &outcome);
                (slot, outcome)
            });
        }

        let mut slots: Vec<Option<FrameOutcome>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (slot, outcome) = joined?;
            debug!("Slot {} completed", slot);
            slots[slot] = Some(outcome);
        }

        tracker.finish();

        let mut report = DispatchReport::default();
        for outcome in slots.into_iter().flatten() {
            match outcome {
                Ok(frame) => report.frames.push(frame),
                Err(e) => report.failures.push(e),
            }
        }

        if !report.failures.is_empty() {
            warn!(
                "{} of {} images could not be normalized: {:?}",
                report.failures.len(),
                total,
                report.failed_indices()
            );
        }

        if report.frames.is_empty() {
            return Err(TimelapseError::NoProcessableImages);
        }

        Ok(report)
    }
}
