//! Error types for the nm-inpainter crate.

/// Errors that can occur while preparing an inpainting seed image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two images taking part in one pixel operation have different dimensions.
    #[error("image size mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    SizeMismatch {
        /// Dimensions of the reference image `(width, height)`.
        expected: (u32, u32),
        /// Dimensions of the offending image `(width, height)`.
        actual: (u32, u32),
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The diagnostics configuration or a JSON dump could not be (de)serialized.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
