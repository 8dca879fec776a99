use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::{RaceCategory, classify_race};
use crate::config::EngineConfig;
use crate::race::RaceRecord;
use crate::stats::{ols_slope, round_to};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BaselineKey {
    pub venue: String,
    pub distance: u32,
    pub category: RaceCategory,
}

/// Good-ground reference times for one (venue, distance, category).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub venue: String,
    pub distance: u32,
    pub category: RaceCategory,
    pub anchor_index: i32,
    pub avg_early: f64,
    pub avg_closing: f64,
    pub avg_total: f64,
    /// Closing-time change per second of early-section deviation, pooled over
    /// every category at this venue and distance.
    pub slope: f64,
    pub samples: usize,
}

impl BaselineEntry {
    pub fn key(&self) -> BaselineKey {
        BaselineKey {
            venue: self.venue.clone(),
            distance: self.distance,
            category: self.category,
        }
    }
}

/// Immutable once built; ordered by venue, distance, category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineTable {
    entries: BTreeMap<BaselineKey, BaselineEntry>,
}

impl BaselineTable {
    pub fn from_entries(entries: impl IntoIterator<Item = BaselineEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.key(), e)).collect(),
        }
    }

    pub fn lookup(
        &self,
        venue: &str,
        distance: u32,
        category: RaceCategory,
    ) -> Option<&BaselineEntry> {
        self.entries.get(&BaselineKey {
            venue: venue.to_string(),
            distance,
            category,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &BaselineEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_rows(&self) -> Vec<BaselineEntry> {
        self.entries.values().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BaselineSummary {
    pub races_used: usize,
    pub finishers_used: usize,
    pub races_unclassified: usize,
    pub races_filtered: usize,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct SplitSamples {
    early: Vec<f64>,
    closing: Vec<f64>,
}

impl SplitSamples {
    fn push(&mut self, early: f64, closing: f64) {
        self.early.push(early);
        self.closing.push(closing);
    }
}

/// One pass over good-ground turf races.
pub fn build_baseline_table(
    races: &[RaceRecord],
    cfg: &EngineConfig,
) -> (BaselineTable, BaselineSummary) {
    let mut summary = BaselineSummary::default();
    let mut groups: BTreeMap<BaselineKey, SplitSamples> = BTreeMap::new();

    for race in races {
        if !race.is_good_turf() {
            summary.races_filtered += 1;
            continue;
        }
        let Some(category) = classify_race(&race.class_label) else {
            summary.races_unclassified += 1;
            continue;
        };

        let key = BaselineKey {
            venue: race.venue.clone(),
            distance: race.distance,
            category,
        };
        let mut had_data = false;
        for finisher in &race.finishers {
            let Some((early, closing)) = finisher.timed_split() else {
                continue;
            };
            groups.entry(key.clone()).or_default().push(early, closing);
            summary.finishers_used += 1;
            had_data = true;
        }
        if had_data {
            summary.races_used += 1;
        }
    }

    let mut pooled: BTreeMap<(String, u32), SplitSamples> = BTreeMap::new();
    for (key, samples) in &groups {
        let slot = pooled
            .entry((key.venue.clone(), key.distance))
            .or_default();
        slot.early.extend_from_slice(&samples.early);
        slot.closing.extend_from_slice(&samples.closing);
    }
    let slopes: BTreeMap<(String, u32), f64> = pooled
        .into_iter()
        .map(|(course, s)| {
            let slope = ols_slope(&s.early, &s.closing, cfg.min_slope_samples);
            tracing::debug!(
                venue = %course.0,
                distance = course.1,
                slope,
                n = s.early.len(),
                "course slope"
            );
            (course, slope)
        })
        .collect();

    let mut entries = BTreeMap::new();
    for (key, samples) in groups {
        let n = samples.early.len();
        if n == 0 {
            continue;
        }
        let avg_early = samples.early.iter().sum::<f64>() / n as f64;
        let avg_closing = samples.closing.iter().sum::<f64>() / n as f64;
        // Total comes from the raw averages and is rounded once.
        let avg_total = avg_early + avg_closing;
        let slope = slopes
            .get(&(key.venue.clone(), key.distance))
            .copied()
            .unwrap_or(0.0);
        let entry = BaselineEntry {
            venue: key.venue.clone(),
            distance: key.distance,
            category: key.category,
            anchor_index: cfg.anchors.get(key.category),
            avg_early: round_to(avg_early, 2),
            avg_closing: round_to(avg_closing, 2),
            avg_total: round_to(avg_total, 2),
            slope: round_to(slope, 4),
            samples: n,
        };
        entries.insert(key, entry);
    }

    summary.entries = entries.len();
    tracing::info!(
        races = summary.races_used,
        finishers = summary.finishers_used,
        unclassified = summary.races_unclassified,
        entries = summary.entries,
        "baseline table built"
    );
    (BaselineTable { entries }, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race::{FinisherRecord, Surface, TrackCondition};

    fn finisher(rank: &str, time: &str, closing: &str) -> FinisherRecord {
        FinisherRecord {
            rank: rank.to_string(),
            time: time.to_string(),
            closing: closing.to_string(),
            ..Default::default()
        }
    }

    fn race(
        class_label: &str,
        condition: TrackCondition,
        finishers: Vec<FinisherRecord>,
    ) -> RaceRecord {
        RaceRecord {
            race_id: "202305040101".to_string(),
            year: 2023,
            venue: "東京".to_string(),
            surface: Surface::Turf,
            distance: 1600,
            class_label: class_label.to_string(),
            condition: Some(condition),
            meeting: 4,
            day: 1,
            weather: String::new(),
            finishers,
        }
    }

    #[test]
    fn averages_and_total_from_raw_sums() {
        let races = vec![race(
            "3歳以上1勝クラス",
            TrackCondition::Good,
            vec![
                finisher("1", "1:33.4", "33.8"),
                finisher("2", "1:33.6", "34.1"),
                finisher("3", "1:33.9", "34.0"),
                finisher("中", "", ""),
            ],
        )];
        let (table, summary) = build_baseline_table(&races, &EngineConfig::default());
        let entry = table.lookup("東京", 1600, RaceCategory::Win1).unwrap();
        assert_eq!(entry.samples, 3);
        assert_eq!(entry.anchor_index, 300);
        let early = (59.6 + 59.5 + 59.9) / 3.0;
        let closing = (33.8 + 34.1 + 34.0) / 3.0;
        assert_eq!(entry.avg_early, round_to(early, 2));
        assert_eq!(entry.avg_closing, round_to(closing, 2));
        assert_eq!(entry.avg_total, round_to(early + closing, 2));
        assert_eq!(summary.finishers_used, 3);
    }

    #[test]
    fn non_good_and_unclassified_races_are_excluded() {
        let races = vec![
            race("3歳以上1勝クラス", TrackCondition::Heavy, vec![finisher("1", "1:35.0", "35.0")]),
            race("障害未勝利", TrackCondition::Good, vec![finisher("1", "1:35.0", "35.0")]),
        ];
        let (table, summary) = build_baseline_table(&races, &EngineConfig::default());
        assert!(table.is_empty());
        assert_eq!(summary.races_filtered, 1);
        assert_eq!(summary.races_unclassified, 1);
    }

    #[test]
    fn single_sample_course_has_zero_slope() {
        let races = vec![race(
            "2歳未勝利",
            TrackCondition::Good,
            vec![finisher("1", "1:35.0", "35.0")],
        )];
        let (table, _) = build_baseline_table(&races, &EngineConfig::default());
        let entry = table.lookup("東京", 1600, RaceCategory::Maiden).unwrap();
        assert_eq!(entry.slope, 0.0);
    }
}
