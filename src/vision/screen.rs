//! Perception over captured frames
//!
//! Crops configured regions out of each frame, reads text through a
//! [`FallbackReader`] and finds icons with the [`TemplateMatcher`].

use anyhow::{anyhow, Context, Result};
use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::detection::{MatcherConfig, TemplateMatcher};
use super::{
    FallbackReader, GlyphReader, Perception, PerceptionError, ReadProfile, RegionId, TemplateId,
    TemplateMatch, TextRead,
};
use crate::config::PerceptionConfig;

/// Where frames come from
pub trait FrameSource: Send {
    /// Next frame, or `None` when the source is exhausted
    fn grab(&mut self) -> Result<Option<RgbaImage>, PerceptionError>;
}

/// Screenshots on disk, served in file-name order
pub struct DirectorySource {
    files: Vec<PathBuf>,
    next: usize,
}

impl DirectorySource {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list screenshots in {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("png"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        info!("Found {} screenshots in {}", files.len(), dir.display());
        Ok(Self { files, next: 0 })
    }
}

impl FrameSource for DirectorySource {
    fn grab(&mut self) -> Result<Option<RgbaImage>, PerceptionError> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let frame = image::open(path)
            .map_err(|e| PerceptionError::Unreachable(format!("{}: {}", path.display(), e)))?;
        Ok(Some(frame.to_rgba8()))
    }
}

/// A rectangle in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Region rectangles keyed by [`RegionId::key`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenLayout {
    pub regions: BTreeMap<String, Rect>,
}

impl ScreenLayout {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn insert(&mut self, region: RegionId, rect: Rect) {
        self.regions.insert(region.key(), rect);
    }

    pub fn get(&self, region: RegionId) -> Option<Rect> {
        self.regions.get(&region.key()).copied()
    }
}

/// [`Perception`] built from a frame source, a layout, templates and OCR
pub struct ScreenPerception<S: FrameSource> {
    source: S,
    layout: ScreenLayout,
    matcher: TemplateMatcher,
    reader: FallbackReader,
    frame: Option<RgbaImage>,
}

impl<S: FrameSource> ScreenPerception<S> {
    pub fn new(source: S, layout: ScreenLayout, matcher: TemplateMatcher, reader: FallbackReader) -> Self {
        Self {
            source,
            layout,
            matcher,
            reader,
            frame: None,
        }
    }

    fn frame(&self) -> Result<&RgbaImage, PerceptionError> {
        self.frame.as_ref().ok_or(PerceptionError::NoFrame)
    }

    /// Crop a region, clipped to the frame; empty crops are unavailable
    fn crop(&self, region: RegionId) -> Result<(RgbaImage, (u32, u32)), PerceptionError> {
        let frame = self.frame()?;
        let rect = self
            .layout
            .get(region)
            .ok_or_else(|| PerceptionError::RegionUnavailable(region.key()))?;
        let (fw, fh) = frame.dimensions();
        let x = rect.x.min(fw);
        let y = rect.y.min(fh);
        let width = rect.width.min(fw - x);
        let height = rect.height.min(fh - y);
        if width == 0 || height == 0 {
            return Err(PerceptionError::RegionUnavailable(region.key()));
        }
        let crop = image::imageops::crop_imm(frame, x, y, width, height).to_image();
        Ok((crop, (x, y)))
    }

    fn search_area(&self, region: Option<RegionId>) -> Result<(GrayImage, (u32, u32)), PerceptionError> {
        match region {
            Some(region) => {
                let (crop, offset) = self.crop(region)?;
                Ok((image::imageops::grayscale(&crop), offset))
            }
            None => Ok((image::imageops::grayscale(self.frame()?), (0, 0))),
        }
    }
}

impl ScreenPerception<DirectorySource> {
    /// Perception over a directory of screenshots.
    ///
    /// `templates` holds one `<key>.png` per [`TemplateId`] and a `glyphs/`
    /// directory of character images; a `glyphs_alt/` directory, when
    /// present, backs up weak reads.
    pub fn from_screenshots(
        screenshots: &Path,
        layout: &Path,
        templates: &Path,
        config: &PerceptionConfig,
    ) -> Result<Self> {
        let source = DirectorySource::open(screenshots)?;
        let layout = ScreenLayout::load(layout)?;

        let mut matcher = TemplateMatcher::new(MatcherConfig {
            threshold: config.template_floor,
            ..Default::default()
        });
        if matcher.load_dir(templates, &TemplateId::all())? == 0 {
            return Err(anyhow!("No templates found in {}", templates.display()));
        }

        let primary = GlyphReader::load_dir("glyphs", &templates.join("glyphs"), config.glyph_threshold)?;
        if primary.glyph_count() == 0 {
            return Err(anyhow!("No glyphs found in {}", templates.join("glyphs").display()));
        }
        let mut reader = FallbackReader::new(Box::new(primary), config.confidence_floor);
        let alt_dir = templates.join("glyphs_alt");
        if alt_dir.is_dir() {
            let secondary = GlyphReader::load_dir("glyphs_alt", &alt_dir, config.glyph_threshold)?;
            reader = reader.with_secondary(Box::new(secondary));
        }

        Ok(Self::new(source, layout, matcher, reader))
    }
}

impl<S: FrameSource> Perception for ScreenPerception<S> {
    fn refresh(&mut self) -> Result<(), PerceptionError> {
        match self.source.grab()? {
            Some(frame) => {
                debug!("Captured frame {}x{}", frame.width(), frame.height());
                self.frame = Some(frame);
                Ok(())
            }
            None => {
                self.frame = None;
                Err(PerceptionError::SourceClosed)
            }
        }
    }

    fn capture_region(&mut self, region: RegionId) -> Result<RgbaImage, PerceptionError> {
        self.crop(region).map(|(image, _)| image)
    }

    fn read_text(&mut self, region: RegionId, profile: ReadProfile) -> Result<TextRead, PerceptionError> {
        let (image, _) = self.crop(region)?;
        self.reader.read(&image, profile)
    }

    fn match_template(
        &mut self,
        template: TemplateId,
        region: Option<RegionId>,
    ) -> Result<TemplateMatch, PerceptionError> {
        let (area, offset) = self.search_area(region)?;
        Ok(self.matcher.find_best(&area, template, offset))
    }

    fn find_all(
        &mut self,
        template: TemplateId,
        region: Option<RegionId>,
    ) -> Result<Vec<TemplateMatch>, PerceptionError> {
        let (area, offset) = self.search_area(region)?;
        Ok(self.matcher.find_all(&area, template, offset))
    }
}
