//! # Optimizer Module
//!
//! Pipeline timelapse separata in sottomoduli:
//! - `timelapse_builder`: Orchestratore di una richiesta
//! - `frame_dispatcher`: Pool di worker per la normalizzazione
//! - `progress_tracker`: Gestione progress unificata (barra + JSON)

pub mod frame_dispatcher;
pub mod progress_tracker;
pub mod timelapse_builder;

pub use frame_dispatcher::{DispatchReport, FrameDispatcher};
pub use progress_tracker::ProgressTracker;
pub use timelapse_builder::{Timelapse, TimelapseBuilder};
