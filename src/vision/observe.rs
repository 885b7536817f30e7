//! One perception pass
//!
//! Collects everything the normalizer needs for a turn. Individual regions
//! that cannot be read are recorded as missing; only adapter-level failures
//! abort the pass.

use tracing::debug;

use super::pixels::{energy_from_bar, infirmary_active};
use super::{Perception, PerceptionError, ReadProfile, RegionId, SupportIcon, TemplateId, TextRead};
use crate::career::{ScreenContext, StatKind, StatTable, SupportCards};
use crate::config::PerceptionConfig;

/// Screens identified by their marker template, in lookup order
pub(crate) const SCREENS: [ScreenContext; 5] = [
    ScreenContext::Lobby,
    ScreenContext::TrainingSelect,
    ScreenContext::RaceSelect,
    ScreenContext::EventChoice,
    ScreenContext::RestConfirm,
];

/// Unvalidated results of one perception pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReadings {
    /// Best-matching screen marker; `None` when nothing matched
    pub screen: Option<ScreenContext>,
    pub date: Option<TextRead>,
    pub mood: Option<TextRead>,
    pub energy_percent: Option<u8>,
    pub stats: StatTable<Option<TextRead>>,
    pub failure: StatTable<Option<TextRead>>,
    pub support: StatTable<Option<SupportCards>>,
    pub race_day: bool,
    pub infirmary: bool,
}

/// Turn a region-level failure into a missing reading
fn optional<T>(result: Result<T, PerceptionError>) -> Result<Option<T>, PerceptionError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(PerceptionError::RegionUnavailable(region)) => {
            debug!("Region {} unavailable", region);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Run one perception pass against the current frame.
///
/// The caller refreshes the frame first. Only the lobby is read in full;
/// other screens just report which screen they are.
pub fn observe(perception: &mut dyn Perception, config: &PerceptionConfig) -> Result<RawReadings, PerceptionError> {
    let mut raw = RawReadings {
        screen: classify_screen(perception, config.template_floor)?,
        ..Default::default()
    };
    if raw.screen != Some(ScreenContext::Lobby) {
        return Ok(raw);
    }

    raw.date = optional(perception.read_text(RegionId::DateBanner, ReadProfile::Banner))?;
    raw.mood = optional(perception.read_text(RegionId::Mood, ReadProfile::Word))?;
    raw.energy_percent = optional(perception.capture_region(RegionId::EnergyBar))?
        .and_then(|bar| energy_from_bar(&bar, config.energy_gray_tolerance));

    for kind in StatKind::ALL {
        raw.stats[kind] = optional(perception.read_text(RegionId::Stat(kind), ReadProfile::Digits))?;
    }

    let race_day = perception.match_template(TemplateId::RaceDay, None)?;
    raw.race_day = race_day.found && race_day.confidence >= config.template_floor;

    raw.infirmary = optional(perception.capture_region(RegionId::InfirmaryButton))?
        .map(|button| infirmary_active(&button, config.infirmary_brightness))
        .unwrap_or(false);

    for kind in StatKind::ALL {
        raw.failure[kind] = optional(perception.read_text(RegionId::FailureRate(kind), ReadProfile::Digits))?;
        raw.support[kind] = Some(stable_support(perception, kind, config)?);
    }

    Ok(raw)
}

fn classify_screen(perception: &mut dyn Perception, floor: f32) -> Result<Option<ScreenContext>, PerceptionError> {
    let mut best: Option<(ScreenContext, f32)> = None;
    for screen in SCREENS {
        let m = perception.match_template(TemplateId::Screen(screen), None)?;
        if m.found && m.confidence >= floor && best.map_or(true, |(_, c)| m.confidence > c) {
            best = Some((screen, m.confidence));
        }
    }
    Ok(best.map(|(screen, _)| screen))
}

/// Count the icons on one support panel
pub fn read_support(perception: &mut dyn Perception, kind: StatKind, floor: f32) -> Result<SupportCards, PerceptionError> {
    let panel = Some(RegionId::SupportPanel(kind));
    let mut cards = SupportCards::default();
    for icon in SupportIcon::ALL {
        let seen = perception
            .find_all(TemplateId::Support(icon), panel)?
            .into_iter()
            .filter(|m| m.found && m.confidence >= floor)
            .count() as u32;
        match icon {
            SupportIcon::Card(card) => {
                cards.count += seen;
                if card == kind {
                    cards.rainbow_count += seen;
                }
            }
            SupportIcon::Friend => {
                cards.count += seen;
                cards.friend_count += seen;
            }
            SupportIcon::Npc => cards.npc_count += seen,
            SupportIcon::Hint => cards.hint_count += seen,
            SupportIcon::SpiritExplosion => cards.spirit_explosion |= seen > 0,
            SupportIcon::SpecialTraining => cards.special_training |= seen > 0,
        }
    }
    Ok(cards)
}

/// Crowded panels are read several times and the median read is kept
fn stable_support(
    perception: &mut dyn Perception,
    kind: StatKind,
    config: &PerceptionConfig,
) -> Result<SupportCards, PerceptionError> {
    let first = read_support(perception, kind, config.template_floor)?;
    if first.count <= config.support_reread_threshold || config.support_reread_count <= 1 {
        return Ok(first);
    }

    let mut reads = vec![first];
    for _ in 1..config.support_reread_count {
        reads.push(read_support(perception, kind, config.template_floor)?);
    }
    reads.sort_by_key(|cards| cards.count);
    let median = reads[reads.len() / 2];
    debug!(
        "Support panel {} re-read {} times, counts {:?}, keeping {}",
        kind,
        reads.len(),
        reads.iter().map(|c| c.count).collect::<Vec<_>>(),
        median.count
    );
    Ok(median)
}
