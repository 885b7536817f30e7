//! Text reads and OCR number cleanup

/// One OCR result as seen by the decision core
#[derive(Debug, Clone, PartialEq)]
pub struct TextRead {
    pub text: String,
    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl TextRead {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// The text, if it clears the confidence floor and is not blank
    pub fn accepted(&self, floor: f32) -> Option<&str> {
        let text = self.text.trim();
        if self.confidence >= floor && !text.is_empty() {
            Some(text)
        } else {
            None
        }
    }
}

/// Characters commonly misread inside digit-only fields
fn digit_for(c: char) -> Option<char> {
    match c {
        '0'..='9' => Some(c),
        'O' | 'o' | 'D' | 'Q' => Some('0'),
        'I' | 'i' | 'l' | '|' | '!' => Some('1'),
        'Z' | 'z' => Some('2'),
        'S' | 's' => Some('5'),
        'B' => Some('8'),
        _ => None,
    }
}

/// Parse an unsigned number from a digit-only OCR field.
///
/// Common letter-for-digit misreads are corrected and other characters
/// dropped; at most four digits are accepted.
pub fn parse_number(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter_map(digit_for).collect();
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    digits.parse().ok()
}

/// Parse a percentage in `0..=100`
pub fn parse_percent(text: &str) -> Option<u8> {
    let trimmed = text.trim().trim_end_matches('%');
    parse_number(trimmed)
        .filter(|value| *value <= 100)
        .and_then(|value| u8::try_from(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_with_misreads() {
        assert_eq!(parse_number("1O2S"), Some(1025));
        assert_eq!(parse_number(" 4l7 "), Some(417));
        assert_eq!(parse_number("B0"), Some(80));
    }

    #[test]
    fn test_parse_number_rejects_noise() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("---"), None);
        assert_eq!(parse_number("123456"), None);
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("12%"), Some(12));
        assert_eq!(parse_percent("0%"), Some(0));
        assert_eq!(parse_percent("130%"), None);
    }

    #[test]
    fn test_accepted_respects_floor() {
        assert_eq!(TextRead::new("GOOD", 0.9).accepted(0.6), Some("GOOD"));
        assert_eq!(TextRead::new("GOOD", 0.3).accepted(0.6), None);
        assert_eq!(TextRead::new("  ", 0.9).accepted(0.6), None);
    }
}
