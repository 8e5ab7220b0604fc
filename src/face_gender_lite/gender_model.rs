use crate::face_gender_lite::encoder::{EncoderConfig, TensorBuffer};
use crate::face_gender_lite::error::{FaceGenderError, Result};
use crate::face_gender_lite::face_gender::InferenceEngine;
use crate::face_gender_lite::types::ClassificationResult;
use log::{debug, info};
use std::path::PathBuf;
use tflite::ops::builtin::BuiltinOpResolver;
use tflite::{FlatBufferModel, InterpreterBuilder};

const MODEL_NAME: &str = "model.tflite";

/// Number of scores in the network output row: `[male, female]`.
const NUM_CLASSES: usize = 2;

/// Gender classification network loaded from a `.tflite` file.
///
/// An interpreter is built per call, so one model can serve several threads
/// as long as each call owns its tensors.
pub struct GenderModel {
    model: FlatBufferModel,
}

impl GenderModel {
    /// Load the model from `model_path`, or `./models/model.tflite` when `None`.
    pub fn new(model_path: Option<String>) -> anyhow::Result<GenderModel> {
        let model_path_buf = match model_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("./models").join(MODEL_NAME),
        };

        let model = FlatBufferModel::build_from_file(model_path_buf.clone())
            .map_err(|e| anyhow::Error::msg(format!("failed to load {}: {:?}", model_path_buf.display(), e)))?;
        info!("loaded gender model from {}", model_path_buf.display());

        Ok(GenderModel { model })
    }
}

fn inference_error<E: std::fmt::Debug>(context: &str) -> impl FnOnce(E) -> FaceGenderError + '_ {
    move |e| FaceGenderError::Inference(format!("{}: {:?}", context, e))
}

impl InferenceEngine for GenderModel {
    fn run(&self, tensor: &TensorBuffer, config: &EncoderConfig) -> Result<ClassificationResult> {
        let resolver = BuiltinOpResolver::default();
        let builder =
            InterpreterBuilder::new(&self.model, &resolver).map_err(inference_error("failed to create interpreter"))?;
        let mut interpreter = builder.build().map_err(inference_error("failed to build interpreter"))?;
        interpreter
            .allocate_tensors()
            .map_err(inference_error("failed to allocate tensors"))?;

        let input_index = *interpreter
            .inputs()
            .first()
            .ok_or_else(|| FaceGenderError::Inference("model has no input tensor".to_string()))?;

        if config.use_float_encoding() {
            let input: Vec<f32> = bytemuck::pod_collect_to_vec(tensor.as_bytes());
            let data = interpreter
                .tensor_data_mut::<f32>(input_index)
                .map_err(inference_error("model input is not a float tensor"))?;
            copy_input(data, &input)?;
        } else {
            let data = interpreter
                .tensor_data_mut::<u8>(input_index)
                .map_err(inference_error("model input is not a quantized tensor"))?;
            copy_input(data, tensor.as_bytes())?;
        }

        interpreter.invoke().map_err(inference_error("invoke failed"))?;

        let output_index = *interpreter
            .outputs()
            .first()
            .ok_or_else(|| FaceGenderError::Inference("model has no output tensor".to_string()))?;
        let scores: &[f32] = interpreter
            .tensor_data(output_index)
            .map_err(inference_error("model output is not a float tensor"))?;
        debug!("raw gender scores {:?}", scores);

        if scores.len() < NUM_CLASSES {
            return Err(FaceGenderError::Inference(format!(
                "expected {} output scores, got {}",
                NUM_CLASSES,
                scores.len()
            )));
        }
        ClassificationResult::from_scores(scores)
            .ok_or_else(|| FaceGenderError::Inference("missing output scores".to_string()))
    }
}

fn copy_input<T: Copy>(dst: &mut [T], src: &[T]) -> Result<()> {
    if dst.len() != src.len() {
        return Err(FaceGenderError::Config(format!(
            "model expects {} input values, the tensor buffer holds {}",
            dst.len(),
            src.len()
        )));
    }
    dst.copy_from_slice(src);
    Ok(())
}
