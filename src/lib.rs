//! # Timelapser Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per il server HTTP
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom e classificazione
//! - `input`: Immagini in ingresso e validazione della richiesta
//! - `resize`: Calcolo della risoluzione target e filtri di resize
//! - `image_processor`: Normalizzazione di una singola immagine
//! - `video_processor`: Assemblaggio dei frame in video (ffmpeg)
//! - `optimizer`: Orchestratore e pool di worker
//! - `scratch`: Directory temporanea per richiesta
//! - `server`: Endpoint HTTP
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use timelapser::{Config, TimelapseBuilder};
//!
//! let builder = TimelapseBuilder::new(Config::default()).await?;
//! let timelapse = builder.build(inputs).await?;
//! std::fs::write("timelapse.mp4", &timelapse.bytes)?;
//! ```

pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod input;
pub mod json_output;
pub mod optimizer;
pub mod platform;
pub mod progress;
pub mod resize;
pub mod scratch;
pub mod server;
pub mod utils;
pub mod video_processor;

#[cfg(test)]
mod test_support;

pub use config::{Config, ServerConfig};
pub use error::{ErrorClass, TimelapseError, TimelapseResult};
pub use input::ImageInput;
pub use optimizer::{Timelapse, TimelapseBuilder};
pub use resize::TargetResolution;
