//! Custom error types for inpainter.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the inpainter library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Input image or stroke layer cannot enter the pipeline.
    #[error("degenerate input {width}x{height}: {reason}")]
    DegenerateInput {
        width: u32,
        height: u32,
        reason: String,
    },

    /// A model file is missing from the model directory.
    #[error("model {name} not found at {path}")]
    ModelNotFound { name: String, path: PathBuf },

    /// Failed to load an ONNX model.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// Model inference failed.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// A stage was handed inputs that do not satisfy its declared names.
    #[error("stage {stage} is missing input {name}")]
    MissingInput { stage: String, name: String },

    /// A stage rejected its inputs or produced nothing usable.
    #[error("stage {stage} failed: {reason}")]
    StageFailed { stage: String, reason: String },

    /// Failed to create the model directory.
    #[error("failed to create model directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The inference worker thread died before reporting a result.
    #[error("inference worker failed: {0}")]
    Worker(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

/// Result type alias for inpainter operations.
pub type Result<T> = std::result::Result<T, Error>;
