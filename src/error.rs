//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della pipeline timelapse.
//!
//! ## Responsabilità:
//! - Definisce `TimelapseError` enum per categorizzare gli errori che abortiscono una richiesta
//! - Classifica ogni errore (`ErrorClass`) per decidere come esporlo al chiamante
//! - Integra con `thiserror` per messaggi e conversioni automatiche
//!
//! ## Categorie di errori:
//! - `FatalInput`: lista vuota, media type non immagine, indici fuori sequenza,
//!   prima immagine non decodificabile
//! - `BatchExhaustion`: nessuna immagine è sopravvissuta alla normalizzazione
//! - `Encoder`: encoder non avviabile o nessun file video prodotto
//! - `Unexpected`: I/O, task falliti, tutto ciò che non è classificato
//!
//! Gli errori per singola immagine NON stanno qui: sono `NormalizationError`
//! (vedi `image_processor`) e vengono filtrati, mai propagati.
//!
//! ## Esempio:
//! ```rust,ignore
//! if inputs.is_empty() {
//!     return Err(TimelapseError::EmptyInput);
//! }
//! ```

/// Errors that abort a whole timelapse request
#[derive(thiserror::Error, Debug)]
pub enum TimelapseError {
    #[error("Image list cannot be empty")]
    EmptyInput,

    #[error("Invalid file type: {filename} - {media_type}")]
    InvalidMediaType { filename: String, media_type: String },

    #[error("Image {filename} has index {index} but is at position {position}")]
    IndexMismatch {
        filename: String,
        index: usize,
        position: usize,
    },

    #[error("First image could not be decoded: {0}")]
    Decode(String),

    #[error("No processable images found")]
    NoProcessableImages,

    #[error("Video writer could not be started: {0}")]
    EncoderInit(String),

    #[error("Video encoding failed: {0}")]
    Encoder(String),

    #[error("Video file could not be created")]
    EmptyOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// How an error is surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad request shape, rejected before any work is dispatched
    FatalInput,
    /// Every image failed normalization
    BatchExhaustion,
    /// Host/environment failure of the video encoder
    Encoder,
    /// Anything else
    Unexpected,
}

impl TimelapseError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TimelapseError::EmptyInput
            | TimelapseError::InvalidMediaType { .. }
            | TimelapseError::IndexMismatch { .. }
            | TimelapseError::Decode(_) => ErrorClass::FatalInput,
            TimelapseError::NoProcessableImages => ErrorClass::BatchExhaustion,
            TimelapseError::EncoderInit(_)
            | TimelapseError::Encoder(_)
            | TimelapseError::EmptyOutput => ErrorClass::Encoder,
            TimelapseError::Io(_) | TimelapseError::Task(_) => ErrorClass::Unexpected,
        }
    }

    /// True when the caller sent something we cannot work with
    pub fn is_client_error(&self) -> bool {
        matches!(self.class(), ErrorClass::FatalInput | ErrorClass::BatchExhaustion)
    }
}

pub type TimelapseResult<T> = Result<T, TimelapseError>;
