//! Application Configuration
//!
//! Bot settings stored in TOML format. Everything here is read once when a
//! run starts and treated as immutable until the run stops.

pub mod scoring;
pub mod strategy;

pub use scoring::{
    BonusWeights, CapAdjustment, CrossTraining, EnergyCurve, EnergyPoint, RaceWeights,
    ScoringConfig, StatCapConfig,
};
pub use strategy::{
    RaceFilterConfig, ScheduledRace, StopConditionConfig, StrategyConfig, StrategyMode,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::career::{CareerDate, StatKind};

/// File name used inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Loop timing and retry budgets
    pub general: GeneralConfig,
    /// Perception thresholds
    pub perception: PerceptionConfig,
    /// Candidate scoring
    pub scoring: ScoringConfig,
    /// Strategy preferences
    pub strategy: StrategyConfig,
    /// Graceful stop conditions
    pub stop_conditions: StopConditionConfig,
    /// Race filters and schedule
    pub races: RaceFilterConfig,
    /// Global stop hotkeys
    pub hotkeys: HotkeyConfig,
}

/// Run loop timing and budgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Pause between turns
    pub cooldown_ms: u64,
    /// Pause before re-perceiving a degraded snapshot
    pub retry_delay_ms: u64,
    /// Degraded re-perceptions before falling back to rest
    pub degraded_retry_budget: u32,
    /// Consecutive adapter failures before the run stops
    pub perception_failure_budget: u32,
    /// Log actions instead of sending input
    pub dry_run: bool,
    /// Race catalog JSON; the data directory copy is used when unset
    pub race_catalog: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 1500,
            retry_delay_ms: 400,
            degraded_retry_budget: 2,
            perception_failure_budget: 5,
            dry_run: false,
            race_catalog: None,
        }
    }
}

impl GeneralConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Thresholds applied to raw perception results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Numeric reads below this confidence count as unknown
    pub confidence_floor: f32,
    /// Minimum similarity for fuzzy mood matching
    pub mood_similarity_floor: f64,
    /// Template matches below this confidence are ignored
    pub template_floor: f32,
    /// Trainings with more support cards than this are re-read
    pub support_reread_threshold: u32,
    /// Reads taken when re-reading support cards
    pub support_reread_count: u32,
    /// Per-channel tolerance around the empty energy-bar gray
    pub energy_gray_tolerance: u8,
    /// Mean brightness above which the infirmary button counts as lit
    pub infirmary_brightness: f32,
    /// Gray level at or above which glyph recognition treats a pixel as ink
    pub glyph_threshold: u8,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.6,
            mood_similarity_floor: 0.6,
            template_floor: 0.8,
            support_reread_threshold: 6,
            support_reread_count: 3,
            energy_gray_tolerance: 2,
            infirmary_brightness: 150.0,
            glyph_threshold: 160,
        }
    }
}

/// Global hotkeys forwarded to the control channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub enabled: bool,
    /// Graceful stop
    pub stop: String,
    /// Unsafe hard stop
    pub force_stop: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stop: "F3".to_string(),
            force_stop: "Ctrl+F3".to_string(),
        }
    }
}

/// A configuration that must not be used to start a run
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite number (got {value})")]
    NonFinite { field: String, value: f64 },

    #[error("stage thresholds must increase: pre_debut {pre_debut}, early {early}, mid {mid}")]
    StageThresholdsNotMonotonic { pre_debut: u32, early: u32, mid: u32 },

    #[error("{field} must be between 0 and 100 (got {value})")]
    PercentOutOfRange { field: String, value: u32 },

    #[error("{field} must be a fraction between 0 and 1 (got {value})")]
    FractionOutOfRange { field: String, value: f64 },

    #[error("priority order lists {0} more than once")]
    DuplicatePriorityStat(StatKind),

    #[error("priority order is missing {0}")]
    MissingPriorityStat(StatKind),

    #[error("critical energy ({critical}%) must be below minimum energy ({minimum}%)")]
    EnergyThresholdsInverted { minimum: u8, critical: u8 },

    #[error("energy penalty curve needs at least one point, in increasing energy order")]
    EnergyCurveUnordered,

    #[error("stop target date '{0}' is not a recognisable career date")]
    InvalidTargetDate(String),

    #[error("invalid {name} hotkey '{value}': {reason}")]
    InvalidHotkey {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl AppConfig {
    /// Check every cross-field rule; the first violation wins
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let scoring = &self.scoring;

        for (field, value) in self.float_fields() {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }

        let t = scoring.stage_thresholds;
        if !t.is_monotonic() {
            return Err(ConfigError::StageThresholdsNotMonotonic {
                pre_debut: t.pre_debut,
                early: t.early,
                mid: t.mid,
            });
        }

        let percents = [
            ("scoring.failure_ceiling_percent", u32::from(scoring.failure_ceiling_percent)),
            ("scoring.minimum_energy_percent", u32::from(scoring.minimum_energy_percent)),
            ("scoring.critical_energy_percent", u32::from(scoring.critical_energy_percent)),
        ];
        for (field, value) in percents {
            if value > 100 {
                return Err(ConfigError::PercentOutOfRange { field: field.to_string(), value });
            }
        }

        let caps = &scoring.stat_caps;
        let fractions = [
            ("scoring.stat_caps.start_penalty_percent", caps.start_penalty_percent),
            ("scoring.stat_caps.max_penalty_percent", caps.max_penalty_percent),
            ("perception.mood_similarity_floor", self.perception.mood_similarity_floor),
            ("perception.confidence_floor", f64::from(self.perception.confidence_floor)),
            ("perception.template_floor", f64::from(self.perception.template_floor)),
        ];
        for (field, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::FractionOutOfRange { field: field.to_string(), value });
            }
        }
        for cross in &caps.cross_training {
            if !(0.0..=1.0).contains(&cross.coefficient) {
                return Err(ConfigError::FractionOutOfRange {
                    field: format!("scoring.stat_caps.cross_training.{}_{}", cross.from, cross.to),
                    value: cross.coefficient,
                });
            }
        }

        let mut seen = BTreeSet::new();
        for kind in &scoring.priority_stats {
            if !seen.insert(*kind) {
                return Err(ConfigError::DuplicatePriorityStat(*kind));
            }
        }
        if let Some(missing) = StatKind::ALL.into_iter().find(|k| !seen.contains(k)) {
            return Err(ConfigError::MissingPriorityStat(missing));
        }

        if scoring.critical_energy_percent >= scoring.minimum_energy_percent {
            return Err(ConfigError::EnergyThresholdsInverted {
                minimum: scoring.minimum_energy_percent,
                critical: scoring.critical_energy_percent,
            });
        }

        if scoring.energy_penalty.points.is_empty() || !scoring.energy_penalty.is_ordered() {
            return Err(ConfigError::EnergyCurveUnordered);
        }

        let stop = &self.stop_conditions;
        if stop.at_target_date && CareerDate::parse(&stop.target_date).is_none() {
            return Err(ConfigError::InvalidTargetDate(stop.target_date.clone()));
        }

        if self.hotkeys.enabled {
            for (name, value) in [("stop", &self.hotkeys.stop), ("force-stop", &self.hotkeys.force_stop)] {
                if let Err(e) = crate::hotkey::parse_hotkey(value) {
                    return Err(ConfigError::InvalidHotkey {
                        name,
                        value: value.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Every float weight, labelled for error messages
    fn float_fields(&self) -> Vec<(String, f64)> {
        let s = &self.scoring;
        let b = &s.bonuses;
        let r = &s.races;
        let mut fields = vec![
            ("scoring.stage_multiplier".to_string(), s.stage_multiplier),
            ("scoring.minimum_score".to_string(), s.minimum_score),
            ("scoring.rest_baseline".to_string(), s.rest_baseline),
            ("scoring.bonuses.support_card".to_string(), b.support_card),
            ("scoring.bonuses.hint_early".to_string(), b.hint_early),
            ("scoring.bonuses.hint_late".to_string(), b.hint_late),
            ("scoring.bonuses.npc".to_string(), b.npc),
            ("scoring.bonuses.special_training".to_string(), b.special_training),
            ("scoring.bonuses.spirit_explosion".to_string(), b.spirit_explosion),
            ("scoring.bonuses.friend".to_string(), b.friend),
            ("scoring.bonuses.wit_early_stage".to_string(), b.wit_early_stage),
            ("scoring.stat_caps.start_penalty_percent".to_string(), s.stat_caps.start_penalty_percent),
            ("scoring.stat_caps.max_penalty_percent".to_string(), s.stat_caps.max_penalty_percent),
            ("scoring.races.fan_weight".to_string(), r.fan_weight),
            ("scoring.races.skill_point_weight".to_string(), r.skill_point_weight),
            ("scoring.races.scheduled_bonus".to_string(), r.scheduled_bonus),
        ];
        let stages = ["pre_debut", "early", "mid", "late"];
        for (name, value) in stages.iter().zip(s.base_score.values()) {
            fields.push((format!("scoring.base_score.{}", name), *value));
        }
        for (name, value) in stages.iter().zip(b.rainbow.values()) {
            fields.push((format!("scoring.bonuses.rainbow.{}", name), *value));
        }
        let g = &r.grade_weight;
        for (name, value) in [("g1", g.g1), ("g2", g.g2), ("g3", g.g3), ("op", g.op)] {
            fields.push((format!("scoring.races.grade_weight.{}", name), value));
        }
        for point in &s.energy_penalty.points {
            fields.push((format!("scoring.energy_penalty.{}", point.energy), point.penalty));
        }
        if let StrategyMode::ScoreThreshold { threshold } = self.strategy.mode {
            fields.push(("strategy.mode.threshold".to_string(), threshold));
        }
        fields
    }
}

/// Default config file location
pub fn default_config_path() -> Result<PathBuf> {
    Ok(crate::storage::get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load and validate configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
