//! Template matching
//!
//! Zero-mean normalized cross-correlation over grayscale frames, with
//! non-maximum suppression so one on-screen icon yields one match.

use anyhow::{Context, Result};
use image::{GrayImage, RgbaImage};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use super::{TemplateId, TemplateMatch};

/// A reference image for one [`TemplateId`]
#[derive(Debug, Clone)]
pub struct Template {
    pub key: String,
    grayscale: GrayImage,
    /// Optional mask (white = compare, black = ignore)
    mask: Option<GrayImage>,
}

impl Template {
    pub fn from_rgba(id: TemplateId, image: &RgbaImage) -> Self {
        Self {
            key: id.key(),
            grayscale: image::imageops::grayscale(image),
            mask: None,
        }
    }

    /// Load a template image from disk
    pub fn from_file(id: TemplateId, path: &Path) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("Failed to load template image: {:?}", path))?;
        Ok(Self {
            key: id.key(),
            grayscale: img.to_luma8(),
            mask: None,
        })
    }

    pub fn with_mask(mut self, mask: GrayImage) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.grayscale.dimensions()
    }
}

/// Matching thresholds
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Minimum correlation for a match (0.0 - 1.0)
    pub threshold: f32,
    /// Maximum matches returned per lookup
    pub max_matches: usize,
    /// Matches closer than this are treated as the same occurrence
    pub min_match_distance: u32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            max_matches: 10,
            min_match_distance: 10,
        }
    }
}

/// Template store and matcher
#[derive(Debug, Default)]
pub struct TemplateMatcher {
    templates: HashMap<String, Template>,
    config: MatcherConfig,
}

impl TemplateMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            templates: HashMap::new(),
            config,
        }
    }

    pub fn add_template(&mut self, template: Template) {
        let (w, h) = template.dimensions();
        info!("Added template '{}' ({}x{})", template.key, w, h);
        self.templates.insert(template.key.clone(), template);
    }

    /// Load `<key>.png` for every id that has a file in `dir`, with
    /// `<key>.mask.png` as its mask when present
    pub fn load_dir(&mut self, dir: &Path, ids: &[TemplateId]) -> Result<usize> {
        let mut loaded = 0;
        for id in ids {
            let path = dir.join(format!("{}.png", id.key()));
            if !path.exists() {
                continue;
            }
            let mut template = Template::from_file(*id, &path)?;
            let mask_path = dir.join(format!("{}.mask.png", id.key()));
            if mask_path.exists() {
                let mask = image::open(&mask_path)
                    .with_context(|| format!("Failed to load template mask: {:?}", mask_path))?;
                template = template.with_mask(mask.to_luma8());
            }
            self.add_template(template);
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    /// All separate occurrences of `id` in `image`, best first.
    ///
    /// `offset` is added to reported locations so callers can search a
    /// cropped region and still get frame coordinates.
    pub fn find_all(&self, image: &GrayImage, id: TemplateId, offset: (u32, u32)) -> Vec<TemplateMatch> {
        let Some(template) = self.templates.get(&id.key()) else {
            debug!("No template loaded for '{}'", id.key());
            return Vec::new();
        };

        let (img_w, img_h) = image.dimensions();
        let (tmpl_w, tmpl_h) = template.dimensions();
        if tmpl_w == 0 || tmpl_h == 0 || tmpl_w > img_w || tmpl_h > img_h {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for y in 0..=(img_h - tmpl_h) {
            for x in 0..=(img_w - tmpl_w) {
                let score = normalized_cross_correlation(image, &template.grayscale, x, y, template.mask.as_ref());
                if score >= self.config.threshold {
                    hits.push(((x, y), score));
                }
            }
        }

        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        let mut kept: Vec<((u32, u32), f32)> = Vec::new();
        for (position, score) in hits {
            if kept.iter().any(|(p, _)| distance(*p, position) < self.config.min_match_distance) {
                continue;
            }
            kept.push((position, score));
            if kept.len() >= self.config.max_matches {
                break;
            }
        }

        kept.into_iter()
            .map(|((x, y), score)| TemplateMatch::at((x + offset.0, y + offset.1), score))
            .collect()
    }

    /// Best occurrence, or a not-found match
    pub fn find_best(&self, image: &GrayImage, id: TemplateId, offset: (u32, u32)) -> TemplateMatch {
        self.find_all(image, id, offset)
            .into_iter()
            .next()
            .unwrap_or_else(TemplateMatch::missing)
    }
}

/// Zero-mean normalized cross-correlation of `template` placed at (x, y)
fn normalized_cross_correlation(
    image: &GrayImage,
    template: &GrayImage,
    x: u32,
    y: u32,
    mask: Option<&GrayImage>,
) -> f32 {
    let (tmpl_w, tmpl_h) = template.dimensions();

    let mut sum_it = 0.0f64;
    let mut sum_i2 = 0.0f64;
    let mut sum_t2 = 0.0f64;
    let mut sum_i = 0.0f64;
    let mut sum_t = 0.0f64;
    let mut count = 0.0f64;

    for ty in 0..tmpl_h {
        for tx in 0..tmpl_w {
            if let Some(m) = mask {
                if m.get_pixel(tx, ty).0[0] < 128 {
                    continue;
                }
            }

            let img_val = f64::from(image.get_pixel(x + tx, y + ty).0[0]);
            let tmpl_val = f64::from(template.get_pixel(tx, ty).0[0]);

            sum_it += img_val * tmpl_val;
            sum_i2 += img_val * img_val;
            sum_t2 += tmpl_val * tmpl_val;
            sum_i += img_val;
            sum_t += tmpl_val;
            count += 1.0;
        }
    }

    if count == 0.0 {
        return 0.0;
    }

    let mean_i = sum_i / count;
    let mean_t = sum_t / count;

    let numerator = sum_it - count * mean_i * mean_t;
    let denom_i = (sum_i2 - count * mean_i * mean_i).max(0.0).sqrt();
    let denom_t = (sum_t2 - count * mean_t * mean_t).max(0.0).sqrt();
    let denominator = denom_i * denom_t;

    if denominator < 1e-10 {
        return 0.0;
    }

    (numerator / denominator).clamp(0.0, 1.0) as f32
}

fn distance(a: (u32, u32), b: (u32, u32)) -> u32 {
    let dx = f64::from(a.0.abs_diff(b.0));
    let dy = f64::from(a.1.abs_diff(b.1));
    (dx * dx + dy * dy).sqrt() as u32
}
