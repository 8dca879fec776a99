//! Offline validation of the bias scale against physical track measurements
//! (cushion/firmness and turf moisture). Nothing here feeds back into the
//! baseline, bias or index computations.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bias::{BiasTable, SpeedTier};
use crate::config::EngineConfig;
use crate::linalg::{LinalgError, TwoFactorFit, fit_two_factor};
use crate::race::RaceDayKey;
use crate::stats::{mean, pearson, percentile_cut_points, r_squared, sorted_copy, tier_for};

const MIN_FIT_DAYS: usize = 3;

const FIRMNESS_BINS: &[(f64, f64)] = &[
    (f64::NEG_INFINITY, 7.5),
    (7.5, 8.5),
    (8.5, 9.0),
    (9.0, 9.5),
    (9.5, 10.0),
    (10.0, f64::INFINITY),
];

const MOISTURE_BINS: &[(f64, f64)] = &[
    (f64::NEG_INFINITY, 10.0),
    (10.0, 13.0),
    (13.0, 16.0),
    (16.0, 20.0),
    (20.0, 25.0),
    (25.0, f64::INFINITY),
];

#[derive(Debug, Error)]
pub enum CorrelatorError {
    #[error("only {found} bias days have both firmness and moisture readings; need {needed}")]
    InsufficientData { found: usize, needed: usize },
    #[error("bias regression failed: {0}")]
    Fit(#[from] LinalgError),
}

/// One measurement day as published in the track-condition reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMeasurement {
    #[serde(alias = "年")]
    pub year: i32,
    #[serde(alias = "競馬場")]
    pub venue: String,
    #[serde(alias = "開催")]
    pub meeting: u32,
    #[serde(alias = "日次")]
    pub day: u32,
    #[serde(default, alias = "日付")]
    pub date: Option<String>,
    #[serde(default, alias = "クッション値")]
    pub cushion: Option<f64>,
    #[serde(default, alias = "芝含水率ゴール前")]
    pub moisture_goal: Option<f64>,
    #[serde(default, alias = "芝含水率4コーナー")]
    pub moisture_corner: Option<f64>,
}

impl TrackMeasurement {
    pub fn key(&self) -> RaceDayKey {
        RaceDayKey {
            year: self.year,
            venue: self.venue.clone(),
            meeting: self.meeting,
            day: self.day,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinStat {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
    pub mean_bias: Option<f64>,
}

impl BinStat {
    pub fn label(&self) -> String {
        match (self.lo.is_finite(), self.hi.is_finite()) {
            (false, true) => format!("~{}", self.hi),
            (true, false) => format!("{}~", self.lo),
            _ => format!("{}~{}", self.lo, self.hi),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueFit {
    pub venue: String,
    pub fit: TwoFactorFit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictedDay {
    pub key: RaceDayKey,
    pub measured_bias: f64,
    pub predicted_bias: f64,
    pub measured_tier: SpeedTier,
    pub predicted_tier: SpeedTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationReport {
    pub joined_days: usize,
    pub unmatched_measurements: usize,
    pub firmness_r: Option<f64>,
    pub moisture_goal_r: Option<f64>,
    pub moisture_corner_r: Option<f64>,
    pub firmness_bins: Vec<BinStat>,
    pub moisture_bins: Vec<BinStat>,
    pub fit: TwoFactorFit,
    pub r_squared: Option<f64>,
    pub venue_fits: Vec<VenueFit>,
    pub predicted_cut_points: Vec<f64>,
    pub days: Vec<PredictedDay>,
    /// Share of days whose predicted tier equals the measured tier.
    pub tier_agreement: f64,
    pub tier_agreement_within_one: f64,
}

struct JoinedDay {
    key: RaceDayKey,
    bias: f64,
    tier: SpeedTier,
    cushion: Option<f64>,
    moisture_goal: Option<f64>,
    moisture_corner: Option<f64>,
}

pub fn correlate(
    biases: &BiasTable,
    measurements: &[TrackMeasurement],
    cfg: &EngineConfig,
) -> Result<CorrelationReport, CorrelatorError> {
    // Later readings for the same day replace earlier ones.
    let by_key: BTreeMap<RaceDayKey, &TrackMeasurement> =
        measurements.iter().map(|m| (m.key(), m)).collect();

    let mut joined = Vec::new();
    let mut unmatched = 0usize;
    for (key, m) in &by_key {
        let Some(entry) = biases.get(key) else {
            unmatched += 1;
            continue;
        };
        joined.push(JoinedDay {
            key: key.clone(),
            bias: entry.bias,
            tier: entry.tier,
            cushion: m.cushion,
            moisture_goal: m.moisture_goal,
            moisture_corner: m.moisture_corner,
        });
    }

    let firmness_r = correlation_of(&joined, |d| d.cushion);
    let moisture_goal_r = correlation_of(&joined, |d| d.moisture_goal);
    let moisture_corner_r = correlation_of(&joined, |d| d.moisture_corner);
    let firmness_bins = bin_means(&joined, |d| d.cushion, FIRMNESS_BINS);
    let moisture_bins = bin_means(&joined, |d| d.moisture_goal, MOISTURE_BINS);

    let complete: Vec<(&JoinedDay, f64, f64)> = joined
        .iter()
        .filter_map(|d| Some((d, d.cushion?, d.moisture_goal?)))
        .collect();
    if complete.len() < MIN_FIT_DAYS {
        return Err(CorrelatorError::InsufficientData {
            found: complete.len(),
            needed: MIN_FIT_DAYS,
        });
    }

    let xs: Vec<f64> = complete.iter().map(|(_, x, _)| *x).collect();
    let ys: Vec<f64> = complete.iter().map(|(_, _, y)| *y).collect();
    let zs: Vec<f64> = complete.iter().map(|(d, _, _)| d.bias).collect();
    let fit = fit_two_factor(&xs, &ys, &zs)?;

    let predicted: Vec<f64> = xs.iter().zip(&ys).map(|(x, y)| fit.predict(*x, *y)).collect();
    let r2 = r_squared(&zs, &predicted);
    let predicted_cut_points =
        percentile_cut_points(&sorted_copy(&predicted), &cfg.tier_percentiles);

    let days: Vec<PredictedDay> = complete
        .iter()
        .zip(&predicted)
        .map(|((d, _, _), p)| PredictedDay {
            key: d.key.clone(),
            measured_bias: d.bias,
            predicted_bias: *p,
            measured_tier: d.tier,
            predicted_tier: SpeedTier::from_index(tier_for(*p, &predicted_cut_points)),
        })
        .collect();
    let exact = days
        .iter()
        .filter(|d| d.measured_tier == d.predicted_tier)
        .count();
    let within_one = days
        .iter()
        .filter(|d| d.measured_tier.index().abs_diff(d.predicted_tier.index()) <= 1)
        .count();

    let venue_fits = fit_per_venue(&complete);

    tracing::info!(
        joined = joined.len(),
        fitted = complete.len(),
        a = fit.a,
        b = fit.b,
        c = fit.c,
        "bias regression fitted"
    );

    Ok(CorrelationReport {
        joined_days: joined.len(),
        unmatched_measurements: unmatched,
        firmness_r,
        moisture_goal_r,
        moisture_corner_r,
        firmness_bins,
        moisture_bins,
        fit,
        r_squared: r2,
        venue_fits,
        predicted_cut_points,
        tier_agreement: exact as f64 / days.len() as f64,
        tier_agreement_within_one: within_one as f64 / days.len() as f64,
        days,
    })
}

fn correlation_of(days: &[JoinedDay], pick: impl Fn(&JoinedDay) -> Option<f64>) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = days
        .iter()
        .filter_map(|d| pick(d).map(|x| (x, d.bias)))
        .unzip();
    pearson(&xs, &ys)
}

fn bin_means(
    days: &[JoinedDay],
    pick: impl Fn(&JoinedDay) -> Option<f64>,
    bins: &[(f64, f64)],
) -> Vec<BinStat> {
    bins.iter()
        .map(|&(lo, hi)| {
            let values: Vec<f64> = days
                .iter()
                .filter(|d| pick(*d).is_some_and(|x| x >= lo && x < hi))
                .map(|d| d.bias)
                .collect();
            BinStat {
                lo,
                hi,
                count: values.len(),
                mean_bias: mean(&values),
            }
        })
        .collect()
}

/// Venues with too few days or a degenerate design are left out.
fn fit_per_venue(complete: &[(&JoinedDay, f64, f64)]) -> Vec<VenueFit> {
    let mut by_venue: HashMap<&str, (Vec<f64>, Vec<f64>, Vec<f64>)> = HashMap::new();
    for (d, x, y) in complete {
        let slot = by_venue.entry(d.key.venue.as_str()).or_default();
        slot.0.push(*x);
        slot.1.push(*y);
        slot.2.push(d.bias);
    }
    let mut out: Vec<VenueFit> = by_venue
        .into_iter()
        .filter(|(_, (xs, _, _))| xs.len() >= MIN_FIT_DAYS)
        .filter_map(|(venue, (xs, ys, zs))| {
            let fit = fit_two_factor(&xs, &ys, &zs).ok()?;
            Some(VenueFit {
                venue: venue.to_string(),
                fit,
            })
        })
        .collect();
    out.sort_by(|a, b| a.venue.cmp(&b.venue));
    out
}
