//! # Image Input Module
//!
//! Tipo `ImageInput` consegnato dal livello di trasporto (CLI o HTTP) e
//! validazione della forma della richiesta prima di qualsiasi elaborazione.
//!
//! ## Regole:
//! - La lista non può essere vuota (`EmptyInput`)
//! - Ogni media type dichiarato deve iniziare con `image/` (`InvalidMediaType`)
//! - L'indice (0-based) definisce l'ordine dei frame nel video e deve coincidere
//!   con la posizione nella lista (`IndexMismatch`): niente duplicati o buchi

use crate::error::{TimelapseError, TimelapseResult};

/// One uploaded image, owned by the pipeline for the duration of a request
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Position in the submission order
    pub index: usize,
    /// Original file name, used for error messages and logs
    pub filename: String,
    /// Declared media type
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(
        index: usize,
        filename: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            index,
            filename: filename.into(),
            media_type: media_type.into(),
            bytes,
        }
    }
}

pub fn is_image_media_type(media_type: &str) -> bool {
    media_type.starts_with("image/")
}

/// Reject a declared media type before its body is read
pub fn check_media_type(filename: &str, media_type: &str) -> TimelapseResult<()> {
    if is_image_media_type(media_type) {
        Ok(())
    } else {
        Err(TimelapseError::InvalidMediaType {
            filename: filename.to_string(),
            media_type: media_type.to_string(),
        })
    }
}

/// Validate the shape of a request. Content is not inspected here.
pub fn validate_inputs(inputs: &[ImageInput]) -> TimelapseResult<()> {
    if inputs.is_empty() {
        return Err(TimelapseError::EmptyInput);
    }

    for (position, input) in inputs.iter().enumerate() {
        check_media_type(&input.filename, &input.media_type)?;
        if input.index != position {
            return Err(TimelapseError::IndexMismatch {
                filename: input.filename.clone(),
                index: input.index,
                position,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            validate_inputs(&[]),
            Err(TimelapseError::EmptyInput)
        ));
    }

    #[test]
    fn test_non_image_rejected_with_name() {
        let inputs = vec![
            ImageInput::new(0, "a.jpg", "image/jpeg", vec![1, 2, 3]),
            ImageInput::new(1, "clip.mp4", "video/mp4", vec![4, 5, 6]),
            ImageInput::new(2, "c.png", "image/png", vec![7]),
        ];

        match validate_inputs(&inputs) {
            Err(TimelapseError::InvalidMediaType { filename, media_type }) => {
                assert_eq!(filename, "clip.mp4");
                assert_eq!(media_type, "video/mp4");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_content_not_inspected() {
        // Garbage bytes pass shape validation, they fail later per item
        let inputs = vec![ImageInput::new(0, "x.jpg", "image/jpeg", b"not an image".to_vec())];
        assert!(validate_inputs(&inputs).is_ok());
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let inputs = vec![
            ImageInput::new(0, "red.jpg", "image/jpeg", vec![1]),
            ImageInput::new(0, "blue.jpg", "image/jpeg", vec![2]),
        ];

        match validate_inputs(&inputs) {
            Err(TimelapseError::IndexMismatch { filename, index, position }) => {
                assert_eq!(filename, "blue.jpg");
                assert_eq!((index, position), (0, 1));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_out_of_order_index_rejected() {
        let inputs = vec![
            ImageInput::new(1, "b.jpg", "image/jpeg", vec![1]),
            ImageInput::new(0, "a.jpg", "image/jpeg", vec![2]),
        ];

        let err = validate_inputs(&inputs).unwrap_err();
        assert!(matches!(err, TimelapseError::IndexMismatch { index: 1, position: 0, .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_media_type_prefix() {
        assert!(is_image_media_type("image/webp"));
        assert!(!is_image_media_type("application/octet-stream"));
        assert!(!is_image_media_type("IMAGE/jpeg"));
    }
}
