use crate::face_gender_lite::face_gender::FaceResult;
use crate::face_gender_lite::types::BoundingBox;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

/// Thinnest outline drawn, in pixels.
const MIN_LINE_WIDTH: f32 = 3.0;

/// Outline width relative to the shorter image side.
const LINE_WIDTH_RATIO: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: Option<u8>,
}

impl Color {
    /// `#rrggbb`, alpha is not part of the hex form.
    pub fn as_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_rgba(&self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a.unwrap_or(255)])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Colors;

impl Colors {
    pub const MALE: Color = Color {
        r: 0x6b,
        g: 0xce,
        b: 0xf5,
        a: None,
    };
    pub const FEMALE: Color = Color {
        r: 0xf4,
        g: 0x98,
        b: 0x9d,
        a: None,
    };
    pub const INDETERMINATE: Color = Color {
        r: 0xc4,
        g: 0xdb,
        b: 0x66,
        a: None,
    };
}

/// Rectangle outline in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectOutline {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl RectOutline {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn as_tuple(&self) -> (i32, i32, i32, i32) {
        (self.left, self.top, self.right, self.bottom)
    }
}

impl From<&BoundingBox> for RectOutline {
    fn from(bbox: &BoundingBox) -> Self {
        RectOutline::new(bbox.left, bbox.top, bbox.right, bbox.bottom)
    }
}

#[derive(Debug, Clone)]
pub struct Annotation {
    rect: RectOutline,
    thickness: u32,
    color: Color,
}

impl Annotation {
    pub fn new(rect: RectOutline, thickness: u32, color: Color) -> Self {
        Self { rect, thickness, color }
    }

    pub fn rect(&self) -> RectOutline {
        self.rect
    }

    pub fn thickness(&self) -> u32 {
        self.thickness
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

/// Stroke width for face outlines on an image of the given size.
pub fn line_width(image_size: (u32, u32)) -> u32 {
    let short_side = image_size.0.min(image_size.1) as f32;
    MIN_LINE_WIDTH.max(short_side * LINE_WIDTH_RATIO).round() as u32
}

/// Convert classified faces into render annotations.
///
/// Faces that failed, and the whole-image fallback entry, produce no outline.
pub fn faces_to_render_data(results: &[FaceResult], image_size: (u32, u32)) -> Vec<Annotation> {
    let thickness = line_width(image_size);

    results
        .iter()
        .filter_map(|result| {
            let bbox = result.bbox.as_ref()?;
            let classified = result.outcome.as_ref().ok()?;
            Some(Annotation::new(RectOutline::from(bbox), thickness, classified.color.color()))
        })
        .collect()
}

/// Draw the annotations onto a copy of `image`.
///
/// Strokes are centered on the rectangle edges, `right` and `bottom` included,
/// and clipped to the image.
pub fn render_to_image(annotations: &[Annotation], image: &RgbaImage) -> RgbaImage {
    let mut canvas = image.clone();

    for annotation in annotations {
        let (left, top, right, bottom) = annotation.rect.as_tuple();
        let color = annotation.color.to_rgba();
        let thickness = annotation.thickness.max(1) as i32;
        let inset_start = -(thickness / 2);

        for inset in inset_start..inset_start + thickness {
            let width = right - left + 1 - 2 * inset;
            let height = bottom - top + 1 - 2 * inset;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect = Rect::at(left + inset, top + inset).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
    }

    canvas
}

/// Produce the tagged image: every classified face outlined in its annotation color.
pub fn annotate(image: &RgbaImage, results: &[FaceResult]) -> RgbaImage {
    let annotations = faces_to_render_data(results, image.dimensions());
    render_to_image(&annotations, image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_gender_lite::classify::AnnotationColor;
    use crate::face_gender_lite::error::FaceGenderError;
    use crate::face_gender_lite::face_gender::FaceClassification;
    use crate::face_gender_lite::types::{ClassificationResult, CropRegion};

    fn classified(bbox: Option<BoundingBox>, color: AnnotationColor) -> FaceResult {
        FaceResult {
            bbox,
            crop_region: CropRegion::new(0, 0, 10, 10),
            outcome: Ok(FaceClassification {
                classification: ClassificationResult::new(0.0, 0.0),
                color,
            }),
        }
    }

    #[test]
    fn test_line_width() {
        assert_eq!(line_width((100, 200)), 3);
        assert_eq!(line_width((1000, 800)), 8);
    }

    #[test]
    fn test_faces_to_render_data_skips_failures_and_fallback() {
        let results = vec![
            classified(Some(BoundingBox::new(10, 10, 50, 50)), AnnotationColor::Female),
            classified(None, AnnotationColor::Male),
            FaceResult {
                bbox: Some(BoundingBox::new(60, 60, 90, 90)),
                crop_region: CropRegion::new(60, 60, 30, 30),
                outcome: Err(FaceGenderError::Inference("boom".to_string())),
            },
        ];

        let annotations = faces_to_render_data(&results, (100, 100));
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].rect().as_tuple(), (10, 10, 50, 50));
        assert_eq!(annotations[0].color(), Colors::FEMALE);
        assert_eq!(annotations[0].thickness(), 3);
    }

    #[test]
    fn test_annotate_draws_outline_only() {
        let image = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        let results = vec![classified(Some(BoundingBox::new(20, 20, 80, 80)), AnnotationColor::Male)];

        let tagged = annotate(&image, &results);
        let male = Colors::MALE.to_rgba();

        assert_eq!(*tagged.get_pixel(20, 50), male);
        assert_eq!(*tagged.get_pixel(50, 20), male);
        assert_eq!(*tagged.get_pixel(80, 50), male);
        assert_eq!(*tagged.get_pixel(50, 80), male);
        assert_eq!(*tagged.get_pixel(81, 50), male);
        assert_eq!(*tagged.get_pixel(82, 50), Rgba([0, 0, 0, 255]));
        assert_eq!(*tagged.get_pixel(18, 50), Rgba([0, 0, 0, 255]));
        assert_eq!(*tagged.get_pixel(50, 50), Rgba([0, 0, 0, 255]));
        assert_eq!(*tagged.get_pixel(5, 5), Rgba([0, 0, 0, 255]));
        // the source image is left untouched
        assert_eq!(*image.get_pixel(20, 50), Rgba([0, 0, 0, 255]));
    }
}
