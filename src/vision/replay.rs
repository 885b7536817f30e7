//! Scripted perception
//!
//! Drives the bot from a recorded session instead of a live screen. A
//! script is a JSON list of frames; every `refresh` advances one frame and
//! the frame answers all queries until the next refresh.
//!
//! Text regions may hold a list of reads, served in order within a frame,
//! which is how a misread followed by a correct re-read is recorded.

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

use super::pixels::EMPTY_BAR_GRAY;
use super::{
    Perception, PerceptionError, ReadProfile, RegionId, SupportIcon, TemplateId, TemplateMatch,
    TextRead,
};
use crate::career::{ScreenContext, StatTable};

const MATCH_CONFIDENCE: f32 = 0.95;

/// One recorded read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptedText {
    /// Text read with full confidence
    Plain(String),
    Scored { text: String, confidence: f32 },
}

impl ScriptedText {
    fn to_read(&self) -> TextRead {
        match self {
            ScriptedText::Plain(text) => TextRead::new(text.clone(), 1.0),
            ScriptedText::Scored { text, confidence } => TextRead::new(text.clone(), *confidence),
        }
    }
}

/// A single read or a sequence of successive reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptedValue {
    One(ScriptedText),
    Many(Vec<ScriptedText>),
}

impl ScriptedValue {
    /// The `index`-th read; the last one repeats
    fn nth(&self, index: usize) -> Option<TextRead> {
        match self {
            ScriptedValue::One(text) => Some(text.to_read()),
            ScriptedValue::Many(texts) => texts.get(index).or_else(|| texts.last()).map(ScriptedText::to_read),
        }
    }
}

/// Everything visible on one recorded frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedFrame {
    /// Screen whose marker is visible, if any
    pub screen: Option<ScreenContext>,
    /// Text reads keyed by [`RegionId::key`]
    pub texts: BTreeMap<String, ScriptedValue>,
    /// Fill of the energy bar; `None` leaves the bar uncapturable
    pub energy_percent: Option<u8>,
    pub infirmary: bool,
    pub race_day: bool,
    /// Icons on each training's support panel
    pub support: StatTable<Vec<SupportIcon>>,
    /// Simulates the adapter dropping out on this frame
    pub unreachable: bool,
}

/// A recorded session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub frames: Vec<ScriptedFrame>,
}

/// [`Perception`] that replays a [`Script`]
#[derive(Debug)]
pub struct ScriptedPerception {
    frames: Vec<ScriptedFrame>,
    cursor: Option<usize>,
    reads: HashMap<String, usize>,
}

impl ScriptedPerception {
    pub fn new(script: Script) -> Self {
        Self {
            frames: script.frames,
            cursor: None,
            reads: HashMap::new(),
        }
    }

    /// Load a script from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay {}", path.display()))?;
        let script: Script = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse replay {}", path.display()))?;
        debug!("Loaded replay with {} frames", script.frames.len());
        Ok(Self::new(script))
    }

    /// Frames not yet served
    pub fn remaining(&self) -> usize {
        match self.cursor {
            Some(at) => self.frames.len().saturating_sub(at + 1),
            None => self.frames.len(),
        }
    }

    fn frame(&self) -> Result<&ScriptedFrame, PerceptionError> {
        let at = self.cursor.ok_or(PerceptionError::NoFrame)?;
        let frame = self.frames.get(at).ok_or(PerceptionError::SourceClosed)?;
        if frame.unreachable {
            return Err(PerceptionError::Unreachable("scripted outage".to_string()));
        }
        Ok(frame)
    }

    fn render_energy_bar(percent: u8) -> RgbaImage {
        let filled = u32::from(percent.min(100));
        RgbaImage::from_fn(100, 3, |x, _| {
            if x < filled {
                Rgba([96, 204, 132, 255])
            } else {
                Rgba([EMPTY_BAR_GRAY[0], EMPTY_BAR_GRAY[1], EMPTY_BAR_GRAY[2], 255])
            }
        })
    }
}

impl Perception for ScriptedPerception {
    fn refresh(&mut self) -> Result<(), PerceptionError> {
        let next = self.cursor.map(|at| at + 1).unwrap_or(0);
        self.cursor = Some(next.min(self.frames.len()));
        self.reads.clear();
        self.frame().map(|_| ())
    }

    fn capture_region(&mut self, region: RegionId) -> Result<RgbaImage, PerceptionError> {
        let frame = self.frame()?;
        match region {
            RegionId::EnergyBar => frame
                .energy_percent
                .map(Self::render_energy_bar)
                .ok_or_else(|| PerceptionError::RegionUnavailable(region.key())),
            RegionId::InfirmaryButton => {
                let level = if frame.infirmary { 220 } else { 60 };
                Ok(RgbaImage::from_pixel(8, 8, Rgba([level, level, level, 255])))
            }
            _ => Err(PerceptionError::RegionUnavailable(region.key())),
        }
    }

    fn read_text(&mut self, region: RegionId, _profile: ReadProfile) -> Result<TextRead, PerceptionError> {
        let key = region.key();
        let value = self
            .frame()?
            .texts
            .get(&key)
            .cloned()
            .ok_or_else(|| PerceptionError::RegionUnavailable(key.clone()))?;
        let count = self.reads.entry(key.clone()).or_insert(0);
        let read = value.nth(*count);
        *count += 1;
        read.ok_or(PerceptionError::RegionUnavailable(key))
    }

    fn match_template(
        &mut self,
        template: TemplateId,
        region: Option<RegionId>,
    ) -> Result<TemplateMatch, PerceptionError> {
        let frame = self.frame()?;
        let visible = match template {
            TemplateId::Screen(screen) => frame.screen == Some(screen),
            TemplateId::RaceDay => frame.race_day,
            TemplateId::Support(icon) => {
                let first = support_matches(frame, icon, region).into_iter().next();
                return Ok(first.unwrap_or_else(TemplateMatch::missing));
            }
        };
        Ok(if visible { TemplateMatch::at((0, 0), MATCH_CONFIDENCE) } else { TemplateMatch::missing() })
    }

    fn find_all(
        &mut self,
        template: TemplateId,
        region: Option<RegionId>,
    ) -> Result<Vec<TemplateMatch>, PerceptionError> {
        if let TemplateId::Support(icon) = template {
            return Ok(support_matches(self.frame()?, icon, region));
        }
        let best = self.match_template(template, region)?;
        Ok(if best.found { vec![best] } else { Vec::new() })
    }
}

/// One match per recorded icon slot; icons only exist on support panels
fn support_matches(frame: &ScriptedFrame, icon: SupportIcon, region: Option<RegionId>) -> Vec<TemplateMatch> {
    let Some(RegionId::SupportPanel(kind)) = region else {
        return Vec::new();
    };
    frame.support[kind]
        .iter()
        .enumerate()
        .filter(|(_, seen)| **seen == icon)
        .map(|(slot, _)| TemplateMatch::at((0, slot as u32 * 100), MATCH_CONFIDENCE))
        .collect()
}
