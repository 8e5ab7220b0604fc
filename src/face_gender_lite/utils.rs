use crate::face_gender_lite::transform::rotate;
use anyhow::{Context, Error};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbaImage};
use log::{debug, LevelFilter};
use std::io::Cursor;

const EXIF_ORIENTATION_ROTATE_180: u16 = 3;
const EXIF_ORIENTATION_ROTATE_90: u16 = 6;
const EXIF_ORIENTATION_ROTATE_270: u16 = 8;

/// Decode encoded image bytes and turn the result upright.
///
/// The EXIF orientation is honored for the pure rotations only; mirrored
/// orientations are decoded as stored.
pub fn decode_image(im_bytes: &[u8]) -> Result<RgbaImage, Error> {
    let reader = ImageReader::new(Cursor::new(im_bytes))
        .with_guessed_format()
        .context("failed to guess image format")?;
    let mut decoder = reader.into_decoder().context("unsupported image format")?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let image = DynamicImage::from_decoder(decoder).context("failed to decode image")?;

    let rotation = orientation_degrees(orientation);
    debug!(
        "decoded {}x{} image, rotating by {} degrees",
        image.width(),
        image.height(),
        rotation
    );

    Ok(rotate(&image.to_rgba8(), rotation)?)
}

/// Clockwise rotation for a raw EXIF orientation tag.
///
/// Only the rotate-90/180/270 tags rotate; every other value, mirrored ones included, maps to 0.
pub fn orientation_to_rotation(orientation: u16) -> u32 {
    match orientation {
        EXIF_ORIENTATION_ROTATE_90 => 90,
        EXIF_ORIENTATION_ROTATE_180 => 180,
        EXIF_ORIENTATION_ROTATE_270 => 270,
        _ => 0,
    }
}

fn orientation_degrees(orientation: Orientation) -> u32 {
    let tag = match orientation {
        Orientation::Rotate90 => EXIF_ORIENTATION_ROTATE_90,
        Orientation::Rotate180 => EXIF_ORIENTATION_ROTATE_180,
        Orientation::Rotate270 => EXIF_ORIENTATION_ROTATE_270,
        _ => 1,
    };
    orientation_to_rotation(tag)
}

/// Initialize logging once, honoring `RUST_LOG` when set.
pub fn init_logging(default_filter: LevelFilter) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter.as_str()));

    // A logger may already be installed by the host; keep it.
    let _ = builder.try_init();
}
