use thiserror::Error;

/// Errors raised by the cropping, encoding and classification core.
#[derive(Debug, Error)]
pub enum FaceGenderError {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("bounding box has no area: {width}x{height}")]
    EmptyBoundingBox { width: i32, height: i32 },

    #[error("encoder configuration error: {0}")]
    Config(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, FaceGenderError>;
