use crate::face_gender_lite::render::{Color, Colors};
use crate::face_gender_lite::types::ClassificationResult;
use serde::{Deserialize, Serialize};

/// A score below this marks the class as the predicted one.
const DECISION_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationColor {
    Male,
    Female,
    Indeterminate,
}

impl AnnotationColor {
    pub fn color(self) -> Color {
        match self {
            AnnotationColor::Male => Colors::MALE,
            AnnotationColor::Female => Colors::FEMALE,
            AnnotationColor::Indeterminate => Colors::INDETERMINATE,
        }
    }

    pub fn as_hex(self) -> String {
        self.color().as_hex()
    }
}

/// Pick the annotation color for a face.
///
/// The rule is evaluated in order, not as an argmax: the male branch wins
/// whenever its score is below the threshold, whatever the female score is.
pub fn classify(result: &ClassificationResult) -> AnnotationColor {
    if result.male_score < DECISION_THRESHOLD {
        return AnnotationColor::Male;
    }
    if result.female_score < DECISION_THRESHOLD {
        return AnnotationColor::Female;
    }
    AnnotationColor::Indeterminate
}
