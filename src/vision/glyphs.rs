//! Template glyph recognizer
//!
//! Reads text drawn in the game's fixed bitmap fonts. Bright pixels are
//! split into column runs and each run is compared with one reference
//! image per character. Glyphs must not contain a fully empty column.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{GrayImage, Luma, RgbaImage};
use std::path::Path;
use tracing::{debug, info};

use super::{PerceptionError, ReadProfile, TextRecognizer, TextRead};

/// Gap, relative to line height, that reads as a space
const SPACE_RATIO: f32 = 0.35;

struct Glyph {
    ch: char,
    /// Binarized and trimmed to its ink
    ink: GrayImage,
}

/// [`TextRecognizer`] over a set of per-character reference images
pub struct GlyphReader {
    name: String,
    glyphs: Vec<Glyph>,
    /// Gray level at or above which a pixel counts as ink
    threshold: u8,
}

impl GlyphReader {
    pub fn new(name: impl Into<String>, threshold: u8) -> Self {
        Self {
            name: name.into(),
            glyphs: Vec::new(),
            threshold,
        }
    }

    /// Load every `<char>.png` in `dir` (`percent.png` and `slash.png` for
    /// the characters file systems dislike)
    pub fn load_dir(name: impl Into<String>, dir: &Path, threshold: u8) -> Result<Self> {
        let mut reader = Self::new(name, threshold);
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list glyphs in {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        paths.sort();

        for path in paths {
            let Some(ch) = path
                .extension()
                .filter(|ext| ext.eq_ignore_ascii_case("png"))
                .and_then(|_| path.file_stem())
                .and_then(|stem| stem.to_str())
                .and_then(glyph_char)
            else {
                continue;
            };
            let image = image::open(&path).with_context(|| format!("Failed to load glyph {}", path.display()))?;
            reader.add_glyph(ch, &image.to_rgba8());
        }

        info!("Loaded {} glyphs for '{}' from {}", reader.glyph_count(), reader.name, dir.display());
        Ok(reader)
    }

    pub fn add_glyph(&mut self, ch: char, image: &RgbaImage) {
        let binary = binarize(image, self.threshold);
        match ink_box(&binary, 0, binary.width()) {
            Some((x, y, w, h)) => {
                let ink = image::imageops::crop_imm(&binary, x, y, w, h).to_image();
                self.glyphs.push(Glyph { ch, ink });
            }
            None => debug!("Glyph '{}' has no ink, skipped", ch),
        }
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Best glyph for one ink crop with its pixel agreement
    fn classify(&self, ink: &GrayImage) -> Option<(char, f32)> {
        self.glyphs
            .iter()
            .map(|glyph| {
                let (w, h) = glyph.ink.dimensions();
                let scaled = image::imageops::resize(ink, w, h, FilterType::Nearest);
                (glyph.ch, agreement(&scaled, &glyph.ink))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl TextRecognizer for GlyphReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&mut self, image: &RgbaImage, profile: ReadProfile) -> Result<TextRead, PerceptionError> {
        let binary = binarize(image, self.threshold);
        let boxes: Vec<_> = column_runs(&binary)
            .into_iter()
            .filter_map(|(start, end)| ink_box(&binary, start, end))
            .collect();
        if boxes.is_empty() || self.glyphs.is_empty() {
            return Ok(TextRead::new("", 0.0));
        }

        let line_height = boxes.iter().map(|b| b.3).max().unwrap_or(0);
        let space = ((line_height as f32 * SPACE_RATIO).ceil() as u32).max(2);

        let mut text = String::new();
        let mut confidence = 1.0f32;
        let mut previous_end: Option<u32> = None;
        for (x, y, w, h) in boxes {
            if profile != ReadProfile::Digits {
                if let Some(end) = previous_end {
                    if x - end >= space {
                        text.push(' ');
                    }
                }
            }
            previous_end = Some(x + w);

            let ink = image::imageops::crop_imm(&binary, x, y, w, h).to_image();
            if let Some((ch, score)) = self.classify(&ink) {
                text.push(ch);
                confidence = confidence.min(score);
            }
        }

        Ok(TextRead::new(text, confidence))
    }
}

/// File stem to character
fn glyph_char(stem: &str) -> Option<char> {
    match stem {
        "percent" => Some('%'),
        "slash" => Some('/'),
        _ => {
            let mut chars = stem.chars();
            let ch = chars.next()?;
            chars.next().is_none().then_some(ch)
        }
    }
}

/// Bright pixels become ink (255), the rest background (0)
fn binarize(image: &RgbaImage, threshold: u8) -> GrayImage {
    let mut gray = image::imageops::grayscale(image);
    for pixel in gray.pixels_mut() {
        *pixel = Luma([if pixel.0[0] >= threshold { 255 } else { 0 }]);
    }
    gray
}

fn column_has_ink(binary: &GrayImage, x: u32) -> bool {
    (0..binary.height()).any(|y| binary.get_pixel(x, y).0[0] > 0)
}

/// Half-open column ranges that contain ink
fn column_runs(binary: &GrayImage) -> Vec<(u32, u32)> {
    let mut runs = Vec::new();
    let mut start = None;
    for x in 0..binary.width() {
        match (column_has_ink(binary, x), start) {
            (true, None) => start = Some(x),
            (false, Some(s)) => {
                runs.push((s, x));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, binary.width()));
    }
    runs
}

/// Tight `(x, y, width, height)` box around the ink between two columns
fn ink_box(binary: &GrayImage, start: u32, end: u32) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for y in 0..binary.height() {
        for x in start..end {
            if binary.get_pixel(x, y).0[0] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }
    bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Share of pixels that agree between two same-sized binary images
fn agreement(a: &GrayImage, b: &GrayImage) -> f32 {
    let total = a.width() * a.height();
    if total == 0 {
        return 0.0;
    }
    let same = a.pixels().zip(b.pixels()).filter(|(p, q)| p.0[0] == q.0[0]).count();
    same as f32 / total as f32
}
