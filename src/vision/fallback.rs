//! OCR fallback chaining
//!
//! A primary recognizer is tried first; when its read is missing or below
//! the confidence floor the secondary one gets a turn. Callers only ever see
//! the winning [`TextRead`].

use image::RgbaImage;
use tracing::debug;

use super::{PerceptionError, ReadProfile, TextRead};

/// A text-recognition backend
pub trait TextRecognizer: Send {
    /// Backend name for logs
    fn name(&self) -> &str;

    fn recognize(&mut self, image: &RgbaImage, profile: ReadProfile) -> Result<TextRead, PerceptionError>;
}

/// Primary recognizer with an optional secondary
pub struct FallbackReader {
    primary: Box<dyn TextRecognizer>,
    secondary: Option<Box<dyn TextRecognizer>>,
    floor: f32,
}

impl FallbackReader {
    pub fn new(primary: Box<dyn TextRecognizer>, floor: f32) -> Self {
        Self {
            primary,
            secondary: None,
            floor,
        }
    }

    pub fn with_secondary(mut self, secondary: Box<dyn TextRecognizer>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Read text, falling back when the primary read is weak.
    ///
    /// Returns the more confident of the two reads; an error only when every
    /// backend failed.
    pub fn read(&mut self, image: &RgbaImage, profile: ReadProfile) -> Result<TextRead, PerceptionError> {
        let first = self.primary.recognize(image, profile);
        if let Ok(read) = &first {
            if read.accepted(self.floor).is_some() {
                return first;
            }
        }

        let Some(secondary) = self.secondary.as_mut() else {
            return first;
        };

        debug!(
            "{} read weak or failed for {:?}, trying {}",
            self.primary.name(),
            profile,
            secondary.name()
        );

        let second = secondary.recognize(image, profile);
        match (first, second) {
            (Ok(a), Ok(b)) => Ok(if b.confidence > a.confidence { b } else { a }),
            (Ok(a), Err(_)) => Ok(a),
            (Err(_), Ok(b)) => Ok(b),
            (Err(_), Err(e)) => Err(e),
        }
    }
}
