use serde::{Deserialize, Serialize};

/// Face rectangle reported by a detector, in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    /// Create a new BoundingBox
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Build a box from its top-left corner and size
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    /// Calculate the width of the bounding box, saturating for boxes wider than `i32::MAX`
    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    /// Calculate the height of the bounding box, saturating like `width`
    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Horizontal center, truncated towards the left like the detector's own rect math
    pub fn center_x(&self) -> i32 {
        midpoint(self.left, self.right)
    }

    /// Vertical center, truncated towards the top
    pub fn center_y(&self) -> i32 {
        midpoint(self.top, self.bottom)
    }

    /// Check if the bounding box is empty (width or height is less than or equal to 0)
    pub fn empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Check whether the whole box lies within an image of the given size
    pub fn inside(&self, image_size: (i32, i32)) -> bool {
        self.left >= 0 && self.top >= 0 && self.right <= image_size.0 && self.bottom <= image_size.1
    }
}

// The mean of two i32 always fits in an i32.
fn midpoint(a: i32, b: i32) -> i32 {
    ((a as i64 + b as i64) >> 1) as i32
}

/// Region of the source image that gets scaled into the network input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl CropRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// The region covering a whole image.
    pub fn full_image(image_size: (i32, i32)) -> Self {
        Self::new(0, 0, image_size.0, image_size.1)
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    /// Check that the region is non-empty and fully inside an image of the given size.
    pub fn fits_within(&self, image_size: (i32, i32)) -> bool {
        self.width > 0
            && self.height > 0
            && self.x >= 0
            && self.y >= 0
            && self.x as i64 + self.width as i64 <= image_size.0 as i64
            && self.y as i64 + self.height as i64 <= image_size.1 as i64
    }
}

/// Two-class output of the gender network.
///
/// The scores are independent probabilities in `[0, 1]` and are not expected to sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(rename = "male")]
    pub male_score: f32,
    #[serde(rename = "female")]
    pub female_score: f32,
}

impl ClassificationResult {
    pub fn new(male_score: f32, female_score: f32) -> Self {
        Self { male_score, female_score }
    }

    /// Build a result from the raw `[male, female]` output row of the network.
    pub fn from_scores(scores: &[f32]) -> Option<Self> {
        match scores {
            [male, female, ..] => Some(Self::new(*male, *female)),
            _ => None,
        }
    }
}
