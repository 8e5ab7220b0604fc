use crate::face_gender_lite::classify::{classify, AnnotationColor};
use crate::face_gender_lite::encoder::{encode, EncoderConfig, TensorBuffer};
use crate::face_gender_lite::error::{FaceGenderError, Result};
use crate::face_gender_lite::transform::{compute_crop_region, crop_and_scale, image_size, scale_to_input};
use crate::face_gender_lite::types::{BoundingBox, ClassificationResult, CropRegion};
use image::RgbaImage;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Source of face rectangles for an image.
pub trait FaceDetector {
    /// Detect faces in an upright image. Errors are treated as "no face found".
    fn detect(&self, image: &RgbaImage) -> anyhow::Result<Vec<BoundingBox>>;
}

/// Gender network taking an encoded tensor and returning the `[male, female]` scores.
pub trait InferenceEngine {
    fn run(&self, tensor: &TensorBuffer, config: &EncoderConfig) -> Result<ClassificationResult>;
}

impl<F> FaceDetector for F
where
    F: Fn(&RgbaImage) -> anyhow::Result<Vec<BoundingBox>>,
{
    fn detect(&self, image: &RgbaImage) -> anyhow::Result<Vec<BoundingBox>> {
        self(image)
    }
}

/// What to do with the remaining faces once one of them fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going; every face carries its own outcome.
    #[default]
    Isolate,
    /// Stop at the first failing face.
    AbortOnFirst,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub failure_policy: FailurePolicy,
    /// Scale the whole image to the network input when no face is detected.
    /// Off by default: the full-size image is handed to the encoder as is.
    pub resize_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceClassification {
    pub classification: ClassificationResult,
    pub color: AnnotationColor,
}

/// Result for one detected face, or for the whole image when nothing was detected.
#[derive(Debug)]
pub struct FaceResult {
    /// Detector box; `None` for the whole-image fallback.
    pub bbox: Option<BoundingBox>,
    pub crop_region: CropRegion,
    pub outcome: Result<FaceClassification>,
}

impl FaceResult {
    pub fn is_fallback(&self) -> bool {
        self.bbox.is_none()
    }

    /// Host facing summary, `None` when the face failed.
    pub fn report(&self) -> Option<FaceReport> {
        let classified = self.outcome.as_ref().ok()?;
        let (width, height) = match &self.bbox {
            Some(bbox) => (bbox.width(), bbox.height()),
            None => (self.crop_region.width, self.crop_region.height),
        };

        Some(FaceReport {
            x: self.crop_region.x,
            y: self.crop_region.y,
            width,
            height,
            gender: classified.classification,
        })
    }
}

/// Face entry of the host result: crop origin with the detected face size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceReport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub gender: ClassificationResult,
}

/// Detect, crop, encode and classify every face of `image`.
///
/// * Args:
///     - image (`RgbaImage`): Upright source image.
///     - config (`EncoderConfig`): Tensor layout of the gender network.
///     - options (`PipelineOptions`): Failure and fallback policy.
///     - detector (`FaceDetector`): Face rectangles source; a failing detector counts as zero faces.
///     - engine (`InferenceEngine`): The gender network.
///
/// * Returns:
///     - `Vec<FaceResult>`: One entry per face in detection order, or a single
///       whole-image entry when no face was found. With
///       `FailurePolicy::AbortOnFirst` the list ends at the first failure.
pub fn process_image<D, E>(
    image: &RgbaImage, config: &EncoderConfig, options: &PipelineOptions, detector: &D, engine: &E,
) -> Result<Vec<FaceResult>>
where
    D: FaceDetector + ?Sized,
    E: InferenceEngine + ?Sized,
{
    let image_size = image_size(image)?;

    let faces = match detector.detect(image) {
        Ok(faces) => faces,
        Err(e) => {
            warn!("face detection failed, classifying the whole image: {:#}", e);
            Vec::new()
        }
    };

    if faces.is_empty() {
        let crop_region = CropRegion::full_image(image_size);
        let outcome = classify_whole_image(image, config, options, engine);
        if let Err(e) = &outcome {
            warn!("whole image classification failed: {}", e);
        }
        return Ok(vec![FaceResult {
            bbox: None,
            crop_region,
            outcome,
        }]);
    }

    let mut results = Vec::with_capacity(faces.len());
    for (index, bbox) in faces.into_iter().enumerate() {
        let (crop_region, outcome) = match compute_crop_region(image_size.0, image_size.1, &bbox) {
            Ok(region) => (region, classify_face(image, &region, config, engine)),
            Err(e) => (CropRegion::new(0, 0, 0, 0), Err(e)),
        };

        let failed = outcome.is_err();
        match &outcome {
            Ok(face) => debug!(
                "face {} at {:?}: male {:.3} female {:.3} -> {:?}",
                index, crop_region, face.classification.male_score, face.classification.female_score, face.color
            ),
            Err(e) => warn!("face {} at {:?} failed: {}", index, bbox, e),
        }

        results.push(FaceResult {
            bbox: Some(bbox),
            crop_region,
            outcome,
        });

        if failed && options.failure_policy == FailurePolicy::AbortOnFirst {
            break;
        }
    }

    Ok(results)
}

/// Crop, encode and run one face. The crop and the tensor are dropped on return.
fn classify_face<E>(
    image: &RgbaImage, region: &CropRegion, config: &EncoderConfig, engine: &E,
) -> Result<FaceClassification>
where
    E: InferenceEngine + ?Sized,
{
    let face = crop_and_scale(image, region, config.input_size())?;
    let tensor = encode(&face, config)?;
    drop(face);
    infer(&tensor, config, engine)
}

fn classify_whole_image<E>(
    image: &RgbaImage, config: &EncoderConfig, options: &PipelineOptions, engine: &E,
) -> Result<FaceClassification>
where
    E: InferenceEngine + ?Sized,
{
    let tensor = if options.resize_fallback {
        encode(&scale_to_input(image, config.input_size())?, config)?
    } else {
        encode(image, config)?
    };
    infer(&tensor, config, engine)
}

fn infer<E>(tensor: &TensorBuffer, config: &EncoderConfig, engine: &E) -> Result<FaceClassification>
where
    E: InferenceEngine + ?Sized,
{
    let classification = engine.run(tensor, config)?;
    // NaN would otherwise fall through both thresholds and read as indeterminate.
    if !classification.male_score.is_finite() || !classification.female_score.is_finite() {
        return Err(FaceGenderError::Inference(format!(
            "non finite scores {:?}",
            classification
        )));
    }

    Ok(FaceClassification {
        classification,
        color: classify(&classification),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_gender_lite::encoder::{decode_tensor, EncoderOptions};
    use image::Rgba;
    use std::cell::RefCell;

    /// Scores the mean red value of the tensor as "male" and green as "female".
    struct ChannelMeanEngine {
        calls: RefCell<usize>,
    }

    impl ChannelMeanEngine {
        fn new() -> Self {
            Self { calls: RefCell::new(0) }
        }
    }

    impl InferenceEngine for ChannelMeanEngine {
        fn run(&self, tensor: &TensorBuffer, config: &EncoderConfig) -> Result<ClassificationResult> {
            *self.calls.borrow_mut() += 1;
            let values = decode_tensor(tensor, config)?;
            let count = (values.len() / 3) as f32;
            let red: f32 = values.iter().step_by(3).sum();
            let green: f32 = values.iter().skip(1).step_by(3).sum();
            Ok(ClassificationResult::new(red / count, green / count))
        }
    }

    struct StaticDetector(Vec<BoundingBox>);

    impl FaceDetector for StaticDetector {
        fn detect(&self, _image: &RgbaImage) -> anyhow::Result<Vec<BoundingBox>> {
            Ok(self.0.clone())
        }
    }

    struct FailingEngine;

    impl InferenceEngine for FailingEngine {
        fn run(&self, _tensor: &TensorBuffer, _config: &EncoderConfig) -> Result<ClassificationResult> {
            Err(FaceGenderError::Inference("engine offline".to_string()))
        }
    }

    fn unit_config(input_size: u32) -> EncoderConfig {
        EncoderOptions {
            input_size,
            image_mean: [0.0; 3],
            image_std: [Some(255.0); 3],
            ..Default::default()
        }
        .build()
        .unwrap()
    }

    /// Left half "male" (low red), right half "female" (high red, low green).
    fn two_face_image() -> RgbaImage {
        RgbaImage::from_fn(200, 100, |x, _| {
            if x < 100 {
                Rgba([0, 255, 0, 255])
            } else {
                Rgba([255, 0, 0, 255])
            }
        })
    }

    #[test]
    fn test_faces_in_detection_order() {
        let image = two_face_image();
        let detector = StaticDetector(vec![
            BoundingBox::new(130, 30, 170, 70),
            BoundingBox::new(30, 30, 70, 70),
        ]);
        let engine = ChannelMeanEngine::new();

        let results =
            process_image(&image, &unit_config(16), &PipelineOptions::default(), &detector, &engine).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].crop_region, CropRegion::new(130, 30, 40, 40));
        assert_eq!(results[0].outcome.as_ref().unwrap().color, AnnotationColor::Female);
        assert_eq!(results[1].crop_region, CropRegion::new(30, 30, 40, 40));
        assert_eq!(results[1].outcome.as_ref().unwrap().color, AnnotationColor::Male);
        assert_eq!(*engine.calls.borrow(), 2);
    }

    #[test]
    fn test_failed_face_is_isolated() {
        let image = two_face_image();
        let detector = StaticDetector(vec![
            BoundingBox::new(10, 10, 10, 10),
            BoundingBox::new(30, 30, 70, 70),
        ]);
        let engine = ChannelMeanEngine::new();

        let results =
            process_image(&image, &unit_config(16), &PipelineOptions::default(), &detector, &engine).unwrap();

        assert_eq!(results.len(), 2);
        assert!(matches!(results[0].outcome, Err(FaceGenderError::EmptyBoundingBox { .. })));
        assert!(results[0].report().is_none());
        assert!(results[1].outcome.is_ok());
    }

    #[test]
    fn test_detector_garbage_box_is_isolated() {
        let image = two_face_image();
        let detector = StaticDetector(vec![
            BoundingBox::new(i32::MAX, 0, i32::MIN, 0),
            BoundingBox::new(i32::MIN + 1, 0, i32::MAX, 10),
            BoundingBox::new(30, 30, 70, 70),
        ]);
        let engine = ChannelMeanEngine::new();

        let results =
            process_image(&image, &unit_config(16), &PipelineOptions::default(), &detector, &engine).unwrap();

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0].outcome, Err(FaceGenderError::EmptyBoundingBox { .. })));
        assert_eq!(results[1].crop_region, CropRegion::new(0, 0, 200, 100));
        assert!(results[1].outcome.is_ok());
        assert_eq!(results[1].report().unwrap().width, i32::MAX);
        assert_eq!(results[2].outcome.as_ref().unwrap().color, AnnotationColor::Male);
    }

    #[test]
    fn test_abort_on_first_failure() {
        let image = two_face_image();
        let detector = StaticDetector(vec![
            BoundingBox::new(30, 30, 70, 70),
            BoundingBox::new(130, 30, 130, 30),
            BoundingBox::new(130, 30, 170, 70),
        ]);
        let options = PipelineOptions {
            failure_policy: FailurePolicy::AbortOnFirst,
            ..Default::default()
        };
        let engine = ChannelMeanEngine::new();

        let results = process_image(&image, &unit_config(16), &options, &detector, &engine).unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].outcome.is_ok());
        assert!(results[1].outcome.is_err());
        assert_eq!(*engine.calls.borrow(), 1);
    }

    #[test]
    fn test_inference_error_surfaces_per_face() {
        let image = two_face_image();
        let detector = StaticDetector(vec![BoundingBox::new(30, 30, 70, 70)]);

        let results =
            process_image(&image, &unit_config(16), &PipelineOptions::default(), &detector, &FailingEngine).unwrap();

        assert!(matches!(results[0].outcome, Err(FaceGenderError::Inference(_))));
    }

    #[test]
    fn test_fallback_without_resize_needs_input_sized_image() {
        let detector = StaticDetector(Vec::new());
        let engine = ChannelMeanEngine::new();

        let image = RgbaImage::from_pixel(16, 16, Rgba([255, 0, 0, 255]));
        let results =
            process_image(&image, &unit_config(16), &PipelineOptions::default(), &detector, &engine).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_fallback());
        assert_eq!(results[0].crop_region, CropRegion::new(0, 0, 16, 16));
        assert_eq!(results[0].outcome.as_ref().unwrap().color, AnnotationColor::Female);

        let image = two_face_image();
        let results =
            process_image(&image, &unit_config(16), &PipelineOptions::default(), &detector, &engine).unwrap();
        assert!(matches!(results[0].outcome, Err(FaceGenderError::Config(_))));
        assert_eq!(results[0].crop_region, CropRegion::new(0, 0, 200, 100));
    }

    #[test]
    fn test_fallback_with_resize() {
        let detector = StaticDetector(Vec::new());
        let options = PipelineOptions {
            resize_fallback: true,
            ..Default::default()
        };
        let image = RgbaImage::from_pixel(90, 70, Rgba([0, 0, 255, 255]));

        let results = process_image(&image, &unit_config(16), &options, &detector, &ChannelMeanEngine::new()).unwrap();

        assert_eq!(results[0].outcome.as_ref().unwrap().color, AnnotationColor::Male);
    }

    #[test]
    fn test_detector_failure_counts_as_no_face() {
        let detector = |_: &RgbaImage| -> anyhow::Result<Vec<BoundingBox>> { Err(anyhow::anyhow!("vision service down")) };
        let image = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255]));

        let results = process_image(
            &image,
            &unit_config(16),
            &PipelineOptions::default(),
            &detector,
            &ChannelMeanEngine::new(),
        )
        .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].is_fallback());
    }

    #[test]
    fn test_empty_image_rejected() {
        let detector = StaticDetector(Vec::new());
        let result = process_image(
            &RgbaImage::new(0, 0),
            &unit_config(16),
            &PipelineOptions::default(),
            &detector,
            &ChannelMeanEngine::new(),
        );

        assert!(matches!(result, Err(FaceGenderError::InvalidImage(_))));
    }

    #[test]
    fn test_report_uses_crop_origin_and_face_size() {
        let image = two_face_image();
        let detector = StaticDetector(vec![BoundingBox::new(-10, 20, 30, 50)]);

        let results = process_image(
            &image,
            &unit_config(16),
            &PipelineOptions::default(),
            &detector,
            &ChannelMeanEngine::new(),
        )
        .unwrap();
        let report = results[0].report().unwrap();

        assert_eq!((report.x, report.y), (0, 15));
        assert_eq!((report.width, report.height), (40, 30));
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["gender"]["male"], serde_json::json!(0.0));
    }
}
