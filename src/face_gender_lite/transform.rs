use crate::face_gender_lite::error::{FaceGenderError, Result};
use crate::face_gender_lite::types::{BoundingBox, CropRegion};
use image::imageops::{self, FilterType};
use image::{GenericImageView, RgbaImage};

/// Filter used when scaling a crop into the network input.
/// Triangle is a bilinear kernel.
const SCALE_FILTER: FilterType = FilterType::Triangle;

/// Compute the square crop around a detected face, clamped to the image.
///
/// The crop side is the longest side of the face box. When the image is smaller
/// than that on one axis, the crop degrades to the full image extent on that axis
/// and is no longer square.
///
/// * Args:
///     - image_width (`i32`), image_height (`i32`): Size of the source image.
///     - bbox (`BoundingBox`): Face rectangle in absolute pixel coordinates. It may
///       reach outside the image.
///
/// * Returns:
///     - `CropRegion`: Region fully inside the image.
pub fn compute_crop_region(image_width: i32, image_height: i32, bbox: &BoundingBox) -> Result<CropRegion> {
    if image_width <= 0 || image_height <= 0 {
        return Err(FaceGenderError::InvalidImage(format!(
            "image dimensions must be positive, got {}x{}",
            image_width, image_height
        )));
    }

    let size = bbox.width().max(bbox.height());
    if size <= 0 {
        return Err(FaceGenderError::EmptyBoundingBox {
            width: bbox.width(),
            height: bbox.height(),
        });
    }

    let crop_width = image_width.min(size);
    let crop_height = image_height.min(size);
    let mid_width = crop_width / 2;
    let mid_height = crop_height / 2;

    // crop_* never exceeds the image, so the upper clamp bound is never negative
    let x = bbox.center_x().saturating_sub(mid_width).clamp(0, image_width - crop_width);
    let y = bbox.center_y().saturating_sub(mid_height).clamp(0, image_height - crop_height);

    Ok(CropRegion::new(x, y, crop_width, crop_height))
}

/// Cut `region` out of `image` and scale it to `input_size x input_size`.
///
/// The region is borrowed as a view, so the crop and the scale factors
/// `input_size / region.width`, `input_size / region.height` are applied in a
/// single resampling pass.
pub fn crop_and_scale(image: &RgbaImage, region: &CropRegion, input_size: u32) -> Result<RgbaImage> {
    if input_size == 0 {
        return Err(FaceGenderError::Config("input size must be positive".to_string()));
    }

    let image_size = image_size(image)?;
    if !region.fits_within(image_size) {
        return Err(FaceGenderError::InvalidImage(format!(
            "crop region {:?} is outside the {}x{} image",
            region, image_size.0, image_size.1
        )));
    }

    let view = image.view(region.x as u32, region.y as u32, region.width as u32, region.height as u32);

    Ok(imageops::resize(&*view, input_size, input_size, SCALE_FILTER))
}

/// Scale a whole image to `input_size x input_size`.
pub fn scale_to_input(image: &RgbaImage, input_size: u32) -> Result<RgbaImage> {
    let region = CropRegion::full_image(image_size(image)?);
    crop_and_scale(image, &region, input_size)
}

/// Rotate an image clockwise by a multiple of 90 degrees, returning a new image.
pub fn rotate(image: &RgbaImage, degrees: u32) -> Result<RgbaImage> {
    match degrees % 360 {
        0 => Ok(image.clone()),
        90 => Ok(imageops::rotate90(image)),
        180 => Ok(imageops::rotate180(image)),
        270 => Ok(imageops::rotate270(image)),
        _ => Err(FaceGenderError::InvalidImage(format!(
            "unsupported rotation of {} degrees",
            degrees
        ))),
    }
}

/// Image dimensions as signed pixel counts, rejecting empty images.
pub fn image_size(image: &RgbaImage) -> Result<(i32, i32)> {
    let (width, height) = image.dimensions();
    let to_i32 = |v: u32| {
        i32::try_from(v).map_err(|_| FaceGenderError::InvalidImage(format!("image dimension {} is too large", v)))
    };
    let size = (to_i32(width)?, to_i32(height)?);

    if size.0 <= 0 || size.1 <= 0 {
        return Err(FaceGenderError::InvalidImage(format!(
            "image dimensions must be positive, got {}x{}",
            width, height
        )));
    }
    Ok(size)
}
