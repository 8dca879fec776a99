use std::fmt;

use serde::Serialize;

use crate::baseline::{BaselineSummary, BaselineTable, build_baseline_table};
use crate::bias::{BiasSummary, BiasTable, SpeedTier, build_bias_table};
use crate::config::EngineConfig;
use crate::index::{IndexSummary, IndexedRace, compute_all};
use crate::race::RaceRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub races_in: usize,
    pub baseline: BaselineSummary,
    pub bias: BiasSummary,
    pub index: IndexSummary,
    pub tier_counts: [usize; 7],
}

pub struct PipelineOutput {
    pub baselines: BaselineTable,
    pub biases: BiasTable,
    pub indexed: Vec<IndexedRace>,
    pub summary: RunSummary,
}

/// Baselines from good-ground races, then day biases against them, then the
/// per-finisher indices. Each stage only reads what the earlier ones built.
pub fn run_pipeline(races: &[RaceRecord], cfg: &EngineConfig) -> PipelineOutput {
    let (baselines, baseline) = build_baseline_table(races, cfg);
    let (biases, bias) = build_bias_table(races, &baselines, cfg);
    let (indexed, index) = compute_all(races, &baselines, &biases, cfg);
    let summary = RunSummary {
        races_in: races.len(),
        baseline,
        bias,
        index,
        tier_counts: biases.tier_counts(),
    };
    PipelineOutput {
        baselines,
        biases,
        indexed,
        summary,
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Races loaded: {}", self.races_in)?;
        writeln!(
            f,
            "Baselines: {} entries from {} races ({} finishers); unclassified={} filtered={}",
            self.baseline.entries,
            self.baseline.races_used,
            self.baseline.finishers_used,
            self.baseline.races_unclassified,
            self.baseline.races_filtered
        )?;
        writeln!(
            f,
            "Bias days: {} of {} (insufficient={}); races missing baseline={}",
            self.bias.entries,
            self.bias.days_seen,
            self.bias.days_insufficient,
            self.bias.races_missing_baseline
        )?;
        let tiers = SpeedTier::ALL
            .iter()
            .zip(self.tier_counts)
            .map(|(tier, n)| format!("{}={n}", tier.label()))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(f, "Tiers: {tiers}")?;
        writeln!(
            f,
            "Indexed races: {} skipped={} (not turf={} unclassified={} no baseline={} empty={}) no bias={}",
            self.index.processed,
            self.index.skipped(),
            self.index.skipped_not_turf,
            self.index.skipped_unclassified,
            self.index.skipped_missing_baseline,
            self.index.skipped_no_finishers,
            self.index.no_bias
        )?;
        write!(
            f,
            "Finishers: indexed={} null={}",
            self.index.finishers_indexed, self.index.finishers_null
        )
    }
}
