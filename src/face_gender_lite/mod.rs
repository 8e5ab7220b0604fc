pub mod types;
pub mod error;
pub mod transform;
pub mod encoder;
pub mod classify;
pub mod face_gender;
pub mod render;
pub mod utils;
#[cfg(feature = "tflite")]
pub mod gender_model;

pub use classify::{classify, AnnotationColor};
pub use encoder::{decode_tensor, encode, encode_batch, EncoderConfig, EncoderOptions, TensorBuffer};
pub use error::FaceGenderError;
pub use face_gender::{
    process_image, FaceClassification, FaceDetector, FaceReport, FaceResult, FailurePolicy, InferenceEngine,
    PipelineOptions,
};
pub use transform::{compute_crop_region, crop_and_scale};
pub use types::{BoundingBox, ClassificationResult, CropRegion};
