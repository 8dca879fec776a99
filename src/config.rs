use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::classify::{Generation, RaceCategory};

const ENV_PREFIX: &str = "TURF_INDEX_";

/// Anchor index per category: the rating a horse earns for running exactly
/// the good-ground baseline time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorTable {
    pub maiden: i32,
    pub win1: i32,
    pub win2: i32,
    pub win3: i32,
    pub open: i32,
}

impl Default for AnchorTable {
    fn default() -> Self {
        Self {
            maiden: 280,
            win1: 300,
            win2: 305,
            win3: 310,
            open: 315,
        }
    }
}

impl AnchorTable {
    pub fn get(&self, category: RaceCategory) -> i32 {
        match category {
            RaceCategory::Maiden => self.maiden,
            RaceCategory::Win1 => self.win1,
            RaceCategory::Win2 => self.win2,
            RaceCategory::Win3 => self.win3,
            RaceCategory::Open => self.open,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationCorrection {
    pub category: RaceCategory,
    pub generation: Generation,
    pub points: i32,
}

fn default_generation_corrections() -> Vec<GenerationCorrection> {
    // Points deducted from the anchor of age-restricted races.
    vec![
        GenerationCorrection {
            category: RaceCategory::Open,
            generation: Generation::ThreeYearOld,
            points: 7,
        },
        GenerationCorrection {
            category: RaceCategory::Open,
            generation: Generation::TwoYearOld,
            points: 12,
        },
        GenerationCorrection {
            category: RaceCategory::Win1,
            generation: Generation::ThreeYearOld,
            points: 2,
        },
        GenerationCorrection {
            category: RaceCategory::Win1,
            generation: Generation::TwoYearOld,
            points: 3,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Index points per second at the reference distance. Anchored on the
    /// 2023 Tenno Sho (Autumn): 1:55.2 on a -0.86s day over an open baseline
    /// of 1:59.32 rates 336, i.e. 21 points for 3.26s.
    pub calibration_factor: f64,
    pub calibration_reference_distance: f64,
    pub ability_weight: f64,
    /// Seconds of closing credit discounted per second behind the pace leader.
    pub draft_factor: f64,
    /// Share of the race-distance bias charged to the early section; the rest
    /// goes to the closing segment.
    pub early_bias_share: f64,
    pub anchors: AnchorTable,
    /// Points deducted from the anchor of age-restricted races. Legacy
    /// ratings added these points instead, so the two scales are not
    /// directly comparable.
    pub generation_corrections: Vec<GenerationCorrection>,
    pub tier_percentiles: Vec<f64>,
    pub min_slope_samples: usize,
    pub min_bias_day_samples: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            calibration_factor: 6.442,
            calibration_reference_distance: 2000.0,
            ability_weight: 0.5,
            draft_factor: 0.6,
            early_bias_share: 0.6,
            anchors: AnchorTable::default(),
            generation_corrections: default_generation_corrections(),
            tier_percentiles: vec![5.0, 15.0, 35.0, 65.0, 85.0, 95.0],
            min_slope_samples: 2,
            min_bias_day_samples: 3,
        }
    }
}

impl EngineConfig {
    /// Defaults, then the optional JSON file, then `TURF_INDEX_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        override_f64("CALIBRATION_FACTOR", &mut self.calibration_factor)?;
        override_f64(
            "CALIBRATION_REFERENCE_DISTANCE",
            &mut self.calibration_reference_distance,
        )?;
        override_f64("ABILITY_WEIGHT", &mut self.ability_weight)?;
        override_f64("DRAFT_FACTOR", &mut self.draft_factor)?;
        override_f64("EARLY_BIAS_SHARE", &mut self.early_bias_share)?;
        override_usize("MIN_SLOPE_SAMPLES", &mut self.min_slope_samples)?;
        override_usize("MIN_BIAS_DAY_SAMPLES", &mut self.min_bias_day_samples)?;
        if let Ok(raw) = std::env::var(format!("{ENV_PREFIX}TIER_PERCENTILES"))
            && !raw.trim().is_empty()
        {
            self.tier_percentiles = raw
                .split([',', ';', ' '])
                .filter(|part| !part.trim().is_empty())
                .map(|part| {
                    part.trim().parse::<f64>().with_context(|| {
                        format!("{ENV_PREFIX}TIER_PERCENTILES: bad value {part:?}")
                    })
                })
                .collect::<Result<Vec<_>>>()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.calibration_factor.is_finite() && self.calibration_factor > 0.0) {
            return Err(anyhow!("calibration_factor must be positive"));
        }
        if !(self.calibration_reference_distance.is_finite()
            && self.calibration_reference_distance > 0.0)
        {
            return Err(anyhow!("calibration_reference_distance must be positive"));
        }
        if !(0.0..=1.0).contains(&self.early_bias_share) {
            return Err(anyhow!("early_bias_share must lie in [0, 1]"));
        }
        if self.tier_percentiles.len() != 6 {
            return Err(anyhow!(
                "tier_percentiles needs 6 cut points for 7 tiers, got {}",
                self.tier_percentiles.len()
            ));
        }
        if self
            .tier_percentiles
            .windows(2)
            .any(|w| w[0] > w[1] || !(0.0..100.0).contains(&w[0]))
            || self
                .tier_percentiles
                .last()
                .is_some_and(|p| !(0.0..100.0).contains(p))
        {
            return Err(anyhow!(
                "tier_percentiles must be non-decreasing within [0, 100)"
            ));
        }
        if self.min_bias_day_samples == 0 {
            return Err(anyhow!("min_bias_day_samples must be at least 1"));
        }
        Ok(())
    }

    pub fn closing_bias_share(&self) -> f64 {
        1.0 - self.early_bias_share
    }

    pub fn generation_correction(&self, category: RaceCategory, generation: Generation) -> i32 {
        self.generation_corrections
            .iter()
            .find(|g| g.category == category && g.generation == generation)
            .map(|g| g.points)
            .unwrap_or(0)
    }

    /// Points per second at `distance`.
    pub fn distance_factor(&self, distance: u32) -> f64 {
        self.calibration_factor * (self.calibration_reference_distance / distance.max(1) as f64)
    }
}

fn override_f64(key: &str, slot: &mut f64) -> Result<()> {
    let name = format!("{ENV_PREFIX}{key}");
    if let Ok(raw) = std::env::var(&name)
        && !raw.trim().is_empty()
    {
        *slot = raw
            .trim()
            .parse()
            .with_context(|| format!("{name}: expected a number, got {raw:?}"))?;
    }
    Ok(())
}

fn override_usize(key: &str, slot: &mut usize) -> Result<()> {
    let name = format!("{ENV_PREFIX}{key}");
    if let Ok(raw) = std::env::var(&name)
        && !raw.trim().is_empty()
    {
        *slot = raw
            .trim()
            .parse()
            .with_context(|| format!("{name}: expected an integer, got {raw:?}"))?;
    }
    Ok(())
}
