use crate::face_gender_lite::error::{FaceGenderError, Result};
use anyhow::Context;
use image::{Rgba, RgbaImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Number of color channels written per pixel.
const CHANNELS: usize = 3;

const FLOAT_BYTES: usize = std::mem::size_of::<f32>();

/// Largest accepted network input side, in pixels.
pub const MAX_INPUT_SIZE: u32 = 4096;

/// Encoder options as supplied by the host when the gender model is initialized.
///
/// Every field is optional on the wire; missing ones fall back to the defaults of the
/// bundled gender model (64x64 RGB float input normalized to `[-1, 1]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncoderOptions {
    pub batch_size: usize,
    pub pixel_size: usize,
    pub input_size: u32,
    pub input_as_rgb: bool,
    pub float_net: bool,
    /// Explicit bytes per channel. Derived from `float_net` when absent.
    pub bytes_per_channel: Option<usize>,
    pub image_mean: [f32; 3],
    pub image_std: [Option<f32>; 3],
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            pixel_size: 3,
            input_size: 64,
            input_as_rgb: true,
            float_net: true,
            bytes_per_channel: None,
            image_mean: [127.5; 3],
            image_std: [Some(127.5); 3],
        }
    }
}

impl EncoderOptions {
    /// Parse options from the host's JSON payload.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("failed to parse encoder options")
    }

    /// Load options from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("invalid encoder options in {}", path.display()))
    }

    /// Validate the options and freeze them into an [`EncoderConfig`].
    pub fn build(&self) -> Result<EncoderConfig> {
        if self.batch_size == 0 {
            return Err(FaceGenderError::Config("batch size must be positive".to_string()));
        }
        if self.input_size == 0 {
            return Err(FaceGenderError::Config("input size must be positive".to_string()));
        }
        if self.input_size > MAX_INPUT_SIZE {
            return Err(FaceGenderError::Config(format!(
                "input size {} exceeds the maximum of {}",
                self.input_size, MAX_INPUT_SIZE
            )));
        }
        if self.pixel_size != CHANNELS {
            return Err(FaceGenderError::Config(format!(
                "pixel size must be {}, got {}",
                CHANNELS, self.pixel_size
            )));
        }
        if self.image_std.iter().flatten().any(|std| *std == 0.0) {
            return Err(FaceGenderError::Config("image std must not contain zero".to_string()));
        }

        let derived = if self.float_net { FLOAT_BYTES } else { 1 };
        if let Some(bytes) = self.bytes_per_channel {
            if bytes != derived {
                return Err(FaceGenderError::Config(format!(
                    "{} bytes per channel contradicts a {} network ({} expected)",
                    bytes,
                    if self.float_net { "float" } else { "quantized" },
                    derived
                )));
            }
        }

        let side = self.input_size as usize;
        let buffer_len = [side, side, self.pixel_size, self.batch_size]
            .iter()
            .try_fold(derived, |len, n| len.checked_mul(*n));
        if buffer_len.is_none() {
            return Err(FaceGenderError::Config(format!(
                "tensor length overflows for a batch of {} images of {}x{}",
                self.batch_size, self.input_size, self.input_size
            )));
        }

        Ok(EncoderConfig {
            batch_size: self.batch_size,
            pixel_channels: self.pixel_size,
            input_size: self.input_size,
            channel_order_is_rgb: self.input_as_rgb,
            use_float_encoding: self.float_net,
            mean: self.image_mean,
            std: self.image_std,
        })
    }
}

/// Immutable tensor layout of one inference session.
///
/// Only built through [`EncoderOptions::build`], so its buffer length always fits in `usize`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    batch_size: usize,
    pixel_channels: usize,
    input_size: u32,
    channel_order_is_rgb: bool,
    use_float_encoding: bool,
    mean: [f32; 3],
    std: [Option<f32>; 3],
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            batch_size: 1,
            pixel_channels: CHANNELS,
            input_size: 64,
            channel_order_is_rgb: true,
            use_float_encoding: true,
            mean: [127.5; 3],
            std: [Some(127.5); 3],
        }
    }
}

impl EncoderConfig {
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn pixel_channels(&self) -> usize {
        self.pixel_channels
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn channel_order_is_rgb(&self) -> bool {
        self.channel_order_is_rgb
    }

    pub fn use_float_encoding(&self) -> bool {
        self.use_float_encoding
    }

    pub fn mean(&self) -> [f32; 3] {
        self.mean
    }

    pub fn std(&self) -> [Option<f32>; 3] {
        self.std
    }

    /// 4 for float networks, 1 for quantized ones.
    pub fn bytes_per_channel(&self) -> usize {
        if self.use_float_encoding {
            FLOAT_BYTES
        } else {
            1
        }
    }

    /// Bytes needed to encode a single image.
    pub fn image_len(&self) -> usize {
        let side = self.input_size as usize;
        self.bytes_per_channel() * side * side * self.pixel_channels
    }

    /// Total length of a tensor buffer for this configuration.
    pub fn buffer_len(&self) -> usize {
        self.image_len() * self.batch_size
    }
}

/// Flat input tensor, laid out exactly as the inference engine reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorBuffer {
    data: Vec<u8>,
}

impl TensorBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Encode one `input_size x input_size` image into a tensor buffer.
///
/// Only valid for configurations with a batch size of one; use [`encode_batch`] otherwise.
pub fn encode(image: &RgbaImage, config: &EncoderConfig) -> Result<TensorBuffer> {
    encode_batch(std::slice::from_ref(image), config)
}

/// Encode exactly `batch_size` images back to back into one tensor buffer.
///
/// Pixels are written row by row. Each pixel contributes three channels ordered
/// RGB or BGR, either as normalized native-endian `f32` or as raw `u8`.
pub fn encode_batch(images: &[RgbaImage], config: &EncoderConfig) -> Result<TensorBuffer> {
    if images.len() != config.batch_size {
        return Err(FaceGenderError::Config(format!(
            "expected a batch of {} images, got {}",
            config.batch_size,
            images.len()
        )));
    }

    let side = config.input_size;
    if let Some(image) = images.iter().find(|image| image.dimensions() != (side, side)) {
        return Err(FaceGenderError::Config(format!(
            "image is {}x{}, the network expects {}x{}",
            image.width(),
            image.height(),
            side,
            side
        )));
    }

    let mut data = Vec::with_capacity(config.buffer_len());
    for image in images {
        for pixel in image.pixels() {
            let values = ordered_channels(pixel, config.channel_order_is_rgb);
            if config.use_float_encoding {
                for (c, value) in values.iter().enumerate() {
                    let normalized = normalize(*value, config.mean[c], config.std[c]);
                    data.extend_from_slice(bytemuck::bytes_of(&normalized));
                }
            } else {
                data.extend_from_slice(&values);
            }
        }
    }

    assert_eq!(data.len(), config.buffer_len(), "tensor buffer must be filled exactly");

    Ok(TensorBuffer { data })
}

/// Read a tensor buffer back into a `(batch, height, width, channel)` array.
///
/// Float buffers decode to the stored normalized values, quantized ones to the raw
/// channel values. Useful to inspect what the network actually receives.
pub fn decode_tensor(buffer: &TensorBuffer, config: &EncoderConfig) -> Result<Array4<f32>> {
    if buffer.len() != config.buffer_len() {
        return Err(FaceGenderError::Config(format!(
            "buffer holds {} bytes, the configuration describes {}",
            buffer.len(),
            config.buffer_len()
        )));
    }

    let values: Vec<f32> = if config.use_float_encoding {
        bytemuck::pod_collect_to_vec::<u8, f32>(buffer.as_bytes())
    } else {
        buffer.as_bytes().iter().map(|v| *v as f32).collect()
    };

    let side = config.input_size as usize;
    Array4::from_shape_vec((config.batch_size, side, side, config.pixel_channels), values)
        .map_err(|e| FaceGenderError::Config(format!("unexpected tensor shape: {}", e)))
}

/// Channel values of a pixel in network order: red or blue first, green always second.
fn ordered_channels(pixel: &Rgba<u8>, rgb: bool) -> [u8; 3] {
    let [r, g, b, _] = pixel.0;
    if rgb {
        [r, g, b]
    } else {
        [b, g, r]
    }
}

fn normalize(value: u8, mean: f32, std: Option<f32>) -> f32 {
    let centered = value as f32 - mean;
    match std {
        Some(std) => centered / std,
        None => centered,
    }
}
