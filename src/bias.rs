use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::baseline::BaselineTable;
use crate::classify::classify_race;
use crate::config::EngineConfig;
use crate::race::{RaceDayKey, RaceRecord};
use crate::stats::{percentile_cut_points, round_to, sorted_copy, tier_for};

/// Seven-level track speed scale, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpeedTier {
    VeryFast,
    Fast,
    SlightlyFast,
    Standard,
    SlightlySlow,
    Slow,
    VerySlow,
}

impl SpeedTier {
    pub const ALL: [SpeedTier; 7] = [
        SpeedTier::VeryFast,
        SpeedTier::Fast,
        SpeedTier::SlightlyFast,
        SpeedTier::Standard,
        SpeedTier::SlightlySlow,
        SpeedTier::Slow,
        SpeedTier::VerySlow,
    ];

    /// Bin index from `stats::tier_for`; anything past the last bin clamps.
    pub fn from_index(idx: usize) -> Self {
        Self::ALL[idx.min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            SpeedTier::VeryFast => "極速",
            SpeedTier::Fast => "速",
            SpeedTier::SlightlyFast => "稍速",
            SpeedTier::Standard => "標準",
            SpeedTier::SlightlySlow => "稍遅",
            SpeedTier::Slow => "遅",
            SpeedTier::VerySlow => "極遅",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.label() == raw.trim())
    }
}

/// Day-level track bias in seconds at the reference distance. Positive means
/// the track ran slower than the good-ground baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasEntry {
    pub year: i32,
    pub venue: String,
    pub meeting: u32,
    pub day: u32,
    pub bias: f64,
    pub samples: usize,
    pub tier: SpeedTier,
}

impl BiasEntry {
    pub fn key(&self) -> RaceDayKey {
        RaceDayKey {
            year: self.year,
            venue: self.venue.clone(),
            meeting: self.meeting,
            day: self.day,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BiasTable {
    entries: BTreeMap<RaceDayKey, BiasEntry>,
    cut_points: Vec<f64>,
}

impl BiasTable {
    /// Rebuild from persisted rows; tiers are kept as stored.
    pub fn from_entries(
        entries: impl IntoIterator<Item = BiasEntry>,
        cut_points: Vec<f64>,
    ) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.key(), e)).collect(),
            cut_points,
        }
    }

    pub fn lookup(&self, year: i32, venue: &str, meeting: u32, day: u32) -> Option<&BiasEntry> {
        self.entries.get(&RaceDayKey {
            year,
            venue: venue.to_string(),
            meeting,
            day,
        })
    }

    pub fn get(&self, key: &RaceDayKey) -> Option<&BiasEntry> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BiasEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cut_points(&self) -> &[f64] {
        &self.cut_points
    }

    pub fn to_rows(&self) -> Vec<BiasEntry> {
        self.entries.values().cloned().collect()
    }

    pub fn tier_counts(&self) -> [usize; 7] {
        let mut counts = [0usize; 7];
        for entry in self.entries.values() {
            counts[entry.tier.index()] += 1;
        }
        counts
    }
}

/// On-disk shape of a bias table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasTableFile {
    pub cut_points: Vec<f64>,
    pub entries: Vec<BiasEntry>,
}

impl From<&BiasTable> for BiasTableFile {
    fn from(table: &BiasTable) -> Self {
        Self {
            cut_points: table.cut_points.clone(),
            entries: table.to_rows(),
        }
    }
}

impl From<BiasTableFile> for BiasTable {
    fn from(file: BiasTableFile) -> Self {
        BiasTable::from_entries(file.entries, file.cut_points)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BiasSummary {
    pub races_used: usize,
    pub races_unclassified: usize,
    pub races_missing_baseline: usize,
    pub races_filtered: usize,
    pub deviations: usize,
    pub days_seen: usize,
    pub days_insufficient: usize,
    pub entries: usize,
}

/// `raw × (reference / distance)`: seconds behind a good-ground baseline,
/// restated at the reference distance.
pub fn normalized_deviation(raw_deviation: f64, distance: u32, reference_distance: f64) -> f64 {
    raw_deviation * (reference_distance / distance.max(1) as f64)
}

pub fn build_bias_table(
    races: &[RaceRecord],
    baselines: &BaselineTable,
    cfg: &EngineConfig,
) -> (BiasTable, BiasSummary) {
    let mut summary = BiasSummary::default();
    let mut days: BTreeMap<RaceDayKey, Vec<f64>> = BTreeMap::new();

    for race in races {
        if !race.is_turf() {
            summary.races_filtered += 1;
            continue;
        }
        let Some(category) = classify_race(&race.class_label) else {
            summary.races_unclassified += 1;
            continue;
        };
        let Some(base) = baselines.lookup(&race.venue, race.distance, category) else {
            summary.races_missing_baseline += 1;
            continue;
        };
        summary.races_used += 1;

        let slot = days.entry(race.day_key()).or_default();
        for finisher in &race.finishers {
            if finisher.rank().is_none() {
                continue;
            }
            let Some(total) = finisher.total_seconds() else {
                continue;
            };
            slot.push(normalized_deviation(
                total - base.avg_total,
                race.distance,
                cfg.calibration_reference_distance,
            ));
            summary.deviations += 1;
        }
    }

    summary.days_seen = days.len();
    let mut magnitudes: Vec<(RaceDayKey, f64, usize)> = Vec::with_capacity(days.len());
    for (key, deviations) in days {
        if deviations.len() < cfg.min_bias_day_samples {
            summary.days_insufficient += 1;
            continue;
        }
        let avg = deviations.iter().sum::<f64>() / deviations.len() as f64;
        magnitudes.push((key, round_to(avg, 2), deviations.len()));
    }

    let sorted = sorted_copy(&magnitudes.iter().map(|(_, b, _)| *b).collect::<Vec<_>>());
    let cut_points = percentile_cut_points(&sorted, &cfg.tier_percentiles);

    let entries = magnitudes
        .into_iter()
        .map(|(key, bias, samples)| {
            let entry = BiasEntry {
                year: key.year,
                venue: key.venue.clone(),
                meeting: key.meeting,
                day: key.day,
                bias,
                samples,
                tier: SpeedTier::from_index(tier_for(bias, &cut_points)),
            };
            (key, entry)
        })
        .collect::<BTreeMap<_, _>>();

    summary.entries = entries.len();
    tracing::info!(
        days = summary.days_seen,
        entries = summary.entries,
        insufficient = summary.days_insufficient,
        missing_baseline = summary.races_missing_baseline,
        "bias table built"
    );
    (
        BiasTable {
            entries,
            cut_points,
        },
        summary,
    )
}
