use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::baseline::{BaselineEntry, BaselineTable};
use crate::bias::{BiasTable, SpeedTier};
use crate::classify::{Generation, RaceCategory, classify_race, detect_generation};
use crate::config::EngineConfig;
use crate::race::{FinisherRecord, RaceDayKey, RaceRecord};
use crate::stats::round_half_up;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceIndex {
    pub overall: i64,
    pub closing_leg: i64,
    pub ability: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedFinisher {
    pub finisher: FinisherRecord,
    pub index: Option<PerformanceIndex>,
}

impl IndexedFinisher {
    /// Output cells in the order overall, closing-leg, ability; empty when null.
    pub fn index_cells(&self) -> [String; 3] {
        match self.index {
            Some(idx) => [
                idx.overall.to_string(),
                idx.closing_leg.to_string(),
                idx.ability.to_string(),
            ],
            None => [String::new(), String::new(), String::new()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedRace {
    pub race: RaceRecord,
    pub day_key: RaceDayKey,
    pub category: RaceCategory,
    pub generation: Generation,
    /// Baseline anchor less the generation correction.
    pub anchor_index: i32,
    pub generation_correction: i32,
    /// Day bias restated at this race's distance; 0 without a bias entry.
    pub race_bias: f64,
    pub bias_found: bool,
    pub speed_tier: Option<SpeedTier>,
    pub finishers: Vec<IndexedFinisher>,
}

impl IndexedRace {
    pub fn indexed_count(&self) -> usize {
        self.finishers.iter().filter(|f| f.index.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SkipReason {
    NotTurf,
    Unclassified,
    MissingBaseline,
    NoFinishers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RaceIndexOutcome {
    Indexed(IndexedRace),
    Skipped { race_id: String, reason: SkipReason },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub processed: usize,
    pub skipped_not_turf: usize,
    pub skipped_unclassified: usize,
    pub skipped_missing_baseline: usize,
    pub skipped_no_finishers: usize,
    pub no_bias: usize,
    pub finishers_indexed: usize,
    pub finishers_null: usize,
}

impl IndexSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_not_turf
            + self.skipped_unclassified
            + self.skipped_missing_baseline
            + self.skipped_no_finishers
    }

    fn record(&mut self, outcome: &RaceIndexOutcome) {
        match outcome {
            RaceIndexOutcome::Indexed(race) => {
                self.processed += 1;
                if !race.bias_found {
                    self.no_bias += 1;
                }
                let indexed = race.indexed_count();
                self.finishers_indexed += indexed;
                self.finishers_null += race.finishers.len() - indexed;
            }
            RaceIndexOutcome::Skipped { reason, .. } => match reason {
                SkipReason::NotTurf => self.skipped_not_turf += 1,
                SkipReason::Unclassified => self.skipped_unclassified += 1,
                SkipReason::MissingBaseline => self.skipped_missing_baseline += 1,
                SkipReason::NoFinishers => self.skipped_no_finishers += 1,
            },
        }
    }
}

/// Race-level quantities shared by every finisher.
#[derive(Debug, Clone, Copy)]
pub struct RaceContext<'a> {
    pub baseline: &'a BaselineEntry,
    pub anchor_index: i32,
    pub race_bias: f64,
    pub leader_early: f64,
    pub distance: u32,
}

/// Index for one finisher with total and closing-segment seconds.
pub fn finisher_index(
    ctx: &RaceContext<'_>,
    total: f64,
    closing: f64,
    cfg: &EngineConfig,
) -> PerformanceIndex {
    let factor = cfg.distance_factor(ctx.distance);
    let base = ctx.baseline;
    let early = total - closing;

    let overall =
        ctx.anchor_index as i64 + round_half_up((base.avg_total + ctx.race_bias - total) * factor);

    let adjusted_early_base = base.avg_early + ctx.race_bias * cfg.early_bias_share;
    let adjusted_closing_base = base.avg_closing + ctx.race_bias * cfg.closing_bias_share();
    let expected_closing = adjusted_closing_base + base.slope * (early - adjusted_early_base);

    // Sitting off the pace saves energy, so a closer's split is charged for
    // the ground they gave the leader.
    let position_gap = early - ctx.leader_early;
    let adjusted_closing = closing + position_gap * cfg.draft_factor;
    let closing_leg = round_half_up((expected_closing - adjusted_closing) * factor);

    let ability = round_half_up(overall as f64 + cfg.ability_weight * closing_leg as f64);

    PerformanceIndex {
        overall,
        closing_leg,
        ability,
    }
}

/// Pure in its three inputs: the same race against the same tables always
/// yields the same indices, whether run alone or as part of the corpus.
pub fn compute_race_indices(
    race: &RaceRecord,
    baselines: &BaselineTable,
    biases: &BiasTable,
    cfg: &EngineConfig,
) -> RaceIndexOutcome {
    let skip = |reason| RaceIndexOutcome::Skipped {
        race_id: race.race_id.clone(),
        reason,
    };
    if race.finishers.is_empty() {
        return skip(SkipReason::NoFinishers);
    }
    if !race.is_turf() {
        return skip(SkipReason::NotTurf);
    }
    let Some(category) = classify_race(&race.class_label) else {
        return skip(SkipReason::Unclassified);
    };
    let Some(baseline) = baselines.lookup(&race.venue, race.distance, category) else {
        return skip(SkipReason::MissingBaseline);
    };

    let generation = detect_generation(&race.class_label);
    // Age-restricted fields are weaker than mixed-age fields running the same
    // time, so the correction comes off the anchor.
    let generation_correction = cfg.generation_correction(category, generation);
    let anchor_index = baseline.anchor_index - generation_correction;

    let day_key = race.day_key();
    let bias_entry = biases.get(&day_key);
    let race_bias = bias_entry
        .map(|b| b.bias * (race.distance as f64 / cfg.calibration_reference_distance))
        .unwrap_or(0.0);

    let leader_early = race.leader_early_seconds();
    let finishers = race
        .finishers
        .iter()
        .map(|finisher| {
            let index = match (
                finisher.rank(),
                finisher.total_seconds(),
                finisher.closing_seconds(),
                leader_early,
            ) {
                (Some(_), Some(total), Some(closing), Some(leader_early)) => {
                    let ctx = RaceContext {
                        baseline,
                        anchor_index,
                        race_bias,
                        leader_early,
                        distance: race.distance,
                    };
                    Some(finisher_index(&ctx, total, closing, cfg))
                }
                _ => None,
            };
            IndexedFinisher {
                finisher: finisher.clone(),
                index,
            }
        })
        .collect();

    RaceIndexOutcome::Indexed(IndexedRace {
        race: race.clone(),
        day_key,
        category,
        generation,
        anchor_index,
        generation_correction,
        race_bias,
        bias_found: bias_entry.is_some(),
        speed_tier: bias_entry.map(|b| b.tier),
        finishers,
    })
}

/// Every race in the corpus, mapped in parallel; output keeps corpus order.
pub fn compute_all(
    races: &[RaceRecord],
    baselines: &BaselineTable,
    biases: &BiasTable,
    cfg: &EngineConfig,
) -> (Vec<IndexedRace>, IndexSummary) {
    let outcomes: Vec<RaceIndexOutcome> = races
        .par_iter()
        .map(|race| compute_race_indices(race, baselines, biases, cfg))
        .collect();

    let mut summary = IndexSummary::default();
    let mut indexed = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        summary.record(&outcome);
        match outcome {
            RaceIndexOutcome::Indexed(race) => indexed.push(race),
            RaceIndexOutcome::Skipped { race_id, reason } => {
                tracing::debug!(race_id = %race_id, ?reason, "race skipped");
            }
        }
    }
    tracing::info!(
        processed = summary.processed,
        skipped = summary.skipped(),
        no_bias = summary.no_bias,
        "indices computed"
    );
    (indexed, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_2000() -> BaselineEntry {
        BaselineEntry {
            venue: "東京".to_string(),
            distance: 2000,
            category: RaceCategory::Open,
            anchor_index: 315,
            avg_early: 85.12,
            avg_closing: 34.2,
            avg_total: 119.32,
            slope: -0.25,
            samples: 120,
        }
    }

    #[test]
    fn anchor_performance_rates_336() {
        let base = open_2000();
        let ctx = RaceContext {
            baseline: &base,
            anchor_index: 315,
            race_bias: -0.86,
            leader_early: 80.0,
            distance: 2000,
        };
        let idx = finisher_index(&ctx, 115.2, 33.9, &EngineConfig::default());
        assert_eq!(idx.overall, 336);
    }

    #[test]
    fn closing_leg_uses_split_bias_slope_and_draft() {
        let base = BaselineEntry {
            slope: -0.4,
            ..open_2000()
        };
        let ctx = RaceContext {
            baseline: &base,
            anchor_index: 315,
            race_bias: 1.5,
            leader_early: 81.0,
            distance: 2000,
        };
        // early 81.8; expected closing 34.8 - 0.4 * (81.8 - 86.02) = 36.488;
        // charged closing 33.4 + 0.8 * 0.6 = 33.88; 2.608 * 6.442 = 16.80.
        let idx = finisher_index(&ctx, 115.2, 33.4, &EngineConfig::default());
        assert_eq!(idx.closing_leg, 17);
        assert_eq!(idx.overall, 351);
        // 351 + 8.5 lands on the half and rounds up.
        assert_eq!(idx.ability, 360);
    }

    #[test]
    fn larger_gap_to_leader_never_raises_closing_credit() {
        let base = open_2000();
        let cfg = EngineConfig::default();
        let near = RaceContext {
            baseline: &base,
            anchor_index: 315,
            race_bias: 0.0,
            leader_early: 84.0,
            distance: 2000,
        };
        let far = RaceContext {
            leader_early: 82.0,
            ..near
        };
        let a = finisher_index(&near, 118.5, 33.5, &cfg);
        let b = finisher_index(&far, 118.5, 33.5, &cfg);
        assert!(b.closing_leg <= a.closing_leg);
        assert_eq!(a.overall, b.overall);
    }

    #[test]
    fn ability_blends_overall_and_closing() {
        let base = open_2000();
        let ctx = RaceContext {
            baseline: &base,
            anchor_index: 315,
            race_bias: 0.0,
            leader_early: 85.0,
            distance: 2000,
        };
        let cfg = EngineConfig::default();
        let idx = finisher_index(&ctx, 119.0, 33.8, &cfg);
        assert_eq!(
            idx.ability,
            round_half_up(idx.overall as f64 + 0.5 * idx.closing_leg as f64)
        );
    }
}
