//! Perception Layer
//!
//! Typed queries against the game screen. The decision core only talks to
//! the [`Perception`] trait; which capture, OCR or matching backend serves
//! a query stays behind it.
//!
//! Adapters:
//! - [`screen::ScreenPerception`] over screenshots with template matching
//!   and a fallback chain of [`glyphs::GlyphReader`] recognizers
//! - [`replay::ScriptedPerception`] over a recorded JSON session

pub mod detection;
pub mod fallback;
pub mod glyphs;
pub mod observe;
pub mod pixels;
pub mod reading;
pub mod replay;
pub mod screen;

pub use fallback::{FallbackReader, TextRecognizer};
pub use glyphs::GlyphReader;
pub use observe::{observe, RawReadings};
pub use reading::{parse_number, parse_percent, TextRead};
pub use replay::ScriptedPerception;
pub use screen::ScreenPerception;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::career::{ScreenContext, StatKind};

/// Failures of the perception adapter itself
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PerceptionError {
    /// Capture or recognition backend is not responding
    #[error("perception adapter unreachable: {0}")]
    Unreachable(String),

    /// A single region could not be captured or read
    #[error("region '{0}' unavailable")]
    RegionUnavailable(String),

    /// Queried before the first refresh
    #[error("no frame captured yet")]
    NoFrame,

    /// The frame source has ended
    #[error("frame source closed")]
    SourceClosed,
}

impl PerceptionError {
    /// Whether the whole pass failed, as opposed to one region
    pub fn is_fatal_for_turn(&self) -> bool {
        !matches!(self, PerceptionError::RegionUnavailable(_))
    }
}

/// Screen areas the bot reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionId {
    DateBanner,
    Mood,
    EnergyBar,
    Stat(StatKind),
    FailureRate(StatKind),
    SupportPanel(StatKind),
    InfirmaryButton,
}

impl RegionId {
    /// Stable key used by layouts and replay files
    pub fn key(&self) -> String {
        match self {
            RegionId::DateBanner => "date".to_string(),
            RegionId::Mood => "mood".to_string(),
            RegionId::EnergyBar => "energy".to_string(),
            RegionId::Stat(kind) => format!("stat.{}", kind.short_name()),
            RegionId::FailureRate(kind) => format!("failure.{}", kind.short_name()),
            RegionId::SupportPanel(kind) => format!("support.{}", kind.short_name()),
            RegionId::InfirmaryButton => "infirmary".to_string(),
        }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Icons that can appear on a training's support panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportIcon {
    /// A support card of the given type
    Card(StatKind),
    Friend,
    Npc,
    Hint,
    SpiritExplosion,
    SpecialTraining,
}

impl SupportIcon {
    pub const ALL: [SupportIcon; 10] = [
        SupportIcon::Card(StatKind::Speed),
        SupportIcon::Card(StatKind::Stamina),
        SupportIcon::Card(StatKind::Power),
        SupportIcon::Card(StatKind::Guts),
        SupportIcon::Card(StatKind::Wit),
        SupportIcon::Friend,
        SupportIcon::Npc,
        SupportIcon::Hint,
        SupportIcon::SpiritExplosion,
        SupportIcon::SpecialTraining,
    ];
}

/// Things the bot looks for by template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    /// Marker that identifies a screen
    Screen(ScreenContext),
    RaceDay,
    Support(SupportIcon),
}

impl TemplateId {
    /// Every template the bot looks for
    pub fn all() -> Vec<TemplateId> {
        let mut ids: Vec<TemplateId> = observe::SCREENS.iter().map(|s| TemplateId::Screen(*s)).collect();
        ids.push(TemplateId::RaceDay);
        ids.extend(SupportIcon::ALL.iter().map(|icon| TemplateId::Support(*icon)));
        ids
    }

    /// Stable key; also the template image file stem
    pub fn key(&self) -> String {
        match self {
            TemplateId::Screen(screen) => {
                let name = match screen {
                    ScreenContext::Lobby => "lobby",
                    ScreenContext::TrainingSelect => "training_select",
                    ScreenContext::RaceSelect => "race_select",
                    ScreenContext::EventChoice => "event_choice",
                    ScreenContext::RestConfirm => "rest_confirm",
                    ScreenContext::Unknown => "unknown",
                };
                format!("screen.{}", name)
            }
            TemplateId::RaceDay => "race_day".to_string(),
            TemplateId::Support(icon) => match icon {
                SupportIcon::Card(kind) => format!("icon.{}", kind.short_name()),
                SupportIcon::Friend => "icon.friend".to_string(),
                SupportIcon::Npc => "icon.npc".to_string(),
                SupportIcon::Hint => "icon.hint".to_string(),
                SupportIcon::SpiritExplosion => "icon.spirit".to_string(),
                SupportIcon::SpecialTraining => "icon.special".to_string(),
            },
        }
    }
}

/// How text in a region should be recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadProfile {
    /// Numbers only (stats, percentages)
    Digits,
    /// Short words (mood)
    Word,
    /// Multi-word banner (career date)
    Banner,
}

/// Result of one template lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub found: bool,
    pub confidence: f32,
    /// Top-left corner in frame coordinates
    pub location: Option<(u32, u32)>,
}

impl TemplateMatch {
    pub fn missing() -> Self {
        Self { found: false, confidence: 0.0, location: None }
    }

    pub fn at(location: (u32, u32), confidence: f32) -> Self {
        Self { found: true, confidence, location: Some(location) }
    }
}

/// Capability interface over capture, OCR and template matching
pub trait Perception {
    /// Grab a new frame; all later queries answer against it
    fn refresh(&mut self) -> Result<(), PerceptionError>;

    fn capture_region(&mut self, region: RegionId) -> Result<RgbaImage, PerceptionError>;

    fn read_text(&mut self, region: RegionId, profile: ReadProfile) -> Result<TextRead, PerceptionError>;

    /// Best match of a template, optionally restricted to a region
    fn match_template(
        &mut self,
        template: TemplateId,
        region: Option<RegionId>,
    ) -> Result<TemplateMatch, PerceptionError>;

    /// Every separate occurrence of a template
    fn find_all(
        &mut self,
        template: TemplateId,
        region: Option<RegionId>,
    ) -> Result<Vec<TemplateMatch>, PerceptionError> {
        let best = self.match_template(template, region)?;
        Ok(if best.found { vec![best] } else { Vec::new() })
    }
}

impl<P: Perception + ?Sized> Perception for Box<P> {
    fn refresh(&mut self) -> Result<(), PerceptionError> {
        (**self).refresh()
    }

    fn capture_region(&mut self, region: RegionId) -> Result<RgbaImage, PerceptionError> {
        (**self).capture_region(region)
    }

    fn read_text(&mut self, region: RegionId, profile: ReadProfile) -> Result<TextRead, PerceptionError> {
        (**self).read_text(region, profile)
    }

    fn match_template(
        &mut self,
        template: TemplateId,
        region: Option<RegionId>,
    ) -> Result<TemplateMatch, PerceptionError> {
        (**self).match_template(template, region)
    }

    fn find_all(
        &mut self,
        template: TemplateId,
        region: Option<RegionId>,
    ) -> Result<Vec<TemplateMatch>, PerceptionError> {
        (**self).find_all(template, region)
    }
}
