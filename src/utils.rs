//! # Utility Functions Module
//!
//! Helpers for building argument vectors of external commands (ffmpeg,
//! ffprobe, jpegtran) without a `.to_string()` on every element.

/// Converts an iterable of string-like items to `Vec<String>`.
///
/// # Example
/// ```rust,ignore
/// let fps = 24;
/// let args = to_string_vec(["-r", &fps.to_string(), "-an"]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Build an argument vector from heterogeneous displayable values.
///
/// # Example
/// ```rust,ignore
/// let crf = 23;
/// let args = args!["-c:v", "libx264", "-crf", crf];
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$($item.to_string()),*]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_string_vec() {
        let result = to_string_vec(["-f", "rawvideo"]);
        assert_eq!(result, vec!["-f".to_string(), "rawvideo".to_string()]);
    }

    #[test]
    fn test_to_string_vec_empty() {
        let result: Vec<String> = to_string_vec(Vec::<&str>::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_args_macro_mixed_types() {
        let fps: u32 = 24;
        let size = format!("{}x{}", 1920, 1080);
        let result = args!["-r", fps, "-s", size, "-an"];
        assert_eq!(result, vec!["-r", "24", "-s", "1920x1080", "-an"]);
    }
}
