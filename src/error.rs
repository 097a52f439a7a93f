use thiserror::Error;

/// Anything the compressor can fail with. Callers only care that it failed.
#[derive(Debug, Error)]
pub enum CompressError {
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// Reported by a compressor running outside this process, e.g. in a Worker.
    #[error("compressor reported: {0}")]
    External(String),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("not an image file (declared type {media_type:?})")]
    InvalidInputType { media_type: String },

    #[error("compression failed: {0}")]
    CompressionFailure(#[from] CompressError),
}
