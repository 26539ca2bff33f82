//! Typed error kinds for the decode/upscale pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the lumiscale core.
///
/// Every failure is recoverable at the caller's discretion; a failed ML
/// upscale can always be retried or replaced with a plain resize.
#[derive(Error, Debug)]
pub enum UpscaleError {
    /// The encoded byte stream could not be decoded into a raster image.
    #[error("failed to decode image bytes: {source}")]
    Decode {
        #[source]
        source: image::ImageError,
    },

    /// Colorspace conversion or alpha flattening failed before encoding.
    #[error("color normalization failed: {reason}")]
    ColorNormalization { reason: String },

    /// Inference session construction failed; carries the backend message.
    #[error("failed to build inference session for {}: {source}", model.display())]
    SessionInit {
        model: PathBuf,
        #[source]
        source: ort::Error,
    },

    /// A bound value was not a tensor of the expected shape or type.
    #[error("tensor mismatch: expected {expected}, got {actual}")]
    Tensor { expected: String, actual: String },

    /// Backend execution failed; carries the backend message.
    #[error("inference run failed: {source}")]
    Run {
        #[source]
        source: ort::Error,
    },

    /// A thumbnail/crop resize pass failed.
    #[error("resize failed: {reason}")]
    Resize { reason: String },

    /// Configuration could not be read, parsed, or written.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for lumiscale core operations.
pub type Result<T> = std::result::Result<T, UpscaleError>;
