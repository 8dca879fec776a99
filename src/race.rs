use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+):(\d+\.\d+)$").expect("time pattern is valid"));
static RANK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("rank pattern is valid"));
static LEADING_INT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)").expect("leading int pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Surface {
    Turf,
    Dirt,
    Other,
}

impl Surface {
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if s.starts_with('芝') || s.eq_ignore_ascii_case("turf") {
            Surface::Turf
        } else if s.starts_with('ダ') || s.eq_ignore_ascii_case("dirt") {
            Surface::Dirt
        } else {
            Surface::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Surface::Turf => "芝",
            Surface::Dirt => "ダート",
            Surface::Other => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackCondition {
    Good,
    SlightlyHeavy,
    Heavy,
    Bad,
}

impl TrackCondition {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "良" | "good" | "firm" => Some(TrackCondition::Good),
            "稍重" | "slightly-heavy" | "slightly_heavy" | "yielding" => {
                Some(TrackCondition::SlightlyHeavy)
            }
            "重" | "heavy" | "soft" => Some(TrackCondition::Heavy),
            "不良" | "bad" => Some(TrackCondition::Bad),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrackCondition::Good => "良",
            TrackCondition::SlightlyHeavy => "稍重",
            TrackCondition::Heavy => "重",
            TrackCondition::Bad => "不良",
        }
    }
}

/// One finisher row as it came out of the result page. Numeric fields stay raw
/// so a malformed value only nulls this finisher's indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinisherRecord {
    pub rank: String,
    #[serde(default)]
    pub horse_name: String,
    #[serde(default)]
    pub horse_number: String,
    pub time: String,
    pub closing: String,
    /// Remaining source columns, carried through to the index output untouched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
}

impl FinisherRecord {
    pub fn rank(&self) -> Option<u32> {
        let raw = self.rank.trim();
        if !RANK_RE.is_match(raw) {
            return None;
        }
        raw.parse().ok()
    }

    pub fn total_seconds(&self) -> Option<f64> {
        parse_time_seconds(&self.time)
    }

    pub fn closing_seconds(&self) -> Option<f64> {
        parse_closing_seconds(&self.closing)
    }

    /// Finished, with both times parseable: the finisher counts toward every
    /// early/closing aggregate.
    pub fn timed_split(&self) -> Option<(f64, f64)> {
        self.rank()?;
        let total = self.total_seconds()?;
        let closing = self.closing_seconds()?;
        Some((total - closing, closing))
    }

    pub fn early_seconds(&self) -> Option<f64> {
        self.timed_split().map(|(early, _)| early)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub race_id: String,
    pub year: i32,
    pub venue: String,
    pub surface: Surface,
    pub distance: u32,
    pub class_label: String,
    pub condition: Option<TrackCondition>,
    pub meeting: u32,
    pub day: u32,
    #[serde(default)]
    pub weather: String,
    pub finishers: Vec<FinisherRecord>,
}

impl RaceRecord {
    pub fn day_key(&self) -> RaceDayKey {
        RaceDayKey {
            year: self.year,
            venue: self.venue.clone(),
            meeting: self.meeting,
            day: self.day,
        }
    }

    pub fn is_turf(&self) -> bool {
        self.surface == Surface::Turf
    }

    pub fn is_good_turf(&self) -> bool {
        self.is_turf() && self.condition == Some(TrackCondition::Good)
    }

    /// Distance-normalisation multiplier to the reference distance.
    pub fn normalizer(&self, reference_distance: f64) -> f64 {
        reference_distance / self.distance.max(1) as f64
    }

    /// Fastest early section among finishers with a full split; the pace
    /// leader for the draft correction.
    pub fn leader_early_seconds(&self) -> Option<f64> {
        self.finishers
            .iter()
            .filter_map(FinisherRecord::early_seconds)
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// (year, venue, meeting, day). Derived ordering is the Bias Table sort order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RaceDayKey {
    pub year: i32,
    pub venue: String,
    pub meeting: u32,
    pub day: u32,
}

impl std::fmt::Display for RaceDayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}_{}", self.year, self.venue, self.meeting, self.day)
    }
}

/// `M:SS.S` to seconds. Anything else, and a zero time, is `None`.
pub fn parse_time_seconds(raw: &str) -> Option<f64> {
    let caps = TIME_RE.captures(raw.trim())?;
    let minutes: f64 = caps.get(1)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(2)?.as_str().parse().ok()?;
    let total = minutes * 60.0 + seconds;
    (total > 0.0).then_some(total)
}

pub fn parse_closing_seconds(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

pub fn parse_distance(raw: &str) -> Option<u32> {
    let caps = LEADING_INT_RE.captures(raw)?;
    caps.get(1)?.as_str().parse().ok().filter(|d: &u32| *d > 0)
}

/// "4回" -> 4
pub fn parse_meeting(raw: &str) -> Option<u32> {
    parse_leading_int(raw)
}

/// "9日目" -> 9
pub fn parse_day(raw: &str) -> Option<u32> {
    parse_leading_int(raw)
}

/// Race ids are `YYYYVVKKDDNN`; the first four digits are the year.
pub fn year_from_race_id(race_id: &str) -> Option<i32> {
    race_id.get(0..4)?.parse().ok()
}

fn parse_leading_int(raw: &str) -> Option<u32> {
    let caps = LEADING_INT_RE.captures(raw)?;
    caps.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_strings_follow_minute_second_pattern() {
        let close = |raw: &str, want: f64| {
            parse_time_seconds(raw).is_some_and(|got| (got - want).abs() < 1e-9)
        };
        assert!(close("1:55.2", 115.2));
        assert!(close("2:01.5", 121.5));
        assert_eq!(parse_time_seconds("115.2"), None);
        assert_eq!(parse_time_seconds("1:55"), None);
        assert_eq!(parse_time_seconds(""), None);
        assert_eq!(parse_time_seconds("0:00.0"), None);
    }

    #[test]
    fn scratched_rank_is_not_numeric() {
        let mut f = FinisherRecord {
            rank: "取".to_string(),
            time: "1:35.0".to_string(),
            closing: "34.0".to_string(),
            ..Default::default()
        };
        assert_eq!(f.rank(), None);
        assert_eq!(f.timed_split(), None);
        f.rank = "3".to_string();
        let (early, closing) = f.timed_split().unwrap();
        assert!((early - 61.0).abs() < 1e-9);
        assert_eq!(closing, 34.0);
    }

    #[test]
    fn meeting_day_and_year_parse() {
        assert_eq!(parse_meeting("4回"), Some(4));
        assert_eq!(parse_day("9日目"), Some(9));
        assert_eq!(parse_distance("2000m"), Some(2000));
        assert_eq!(year_from_race_id("202305040911"), Some(2023));
        assert_eq!(parse_meeting("回"), None);
    }

    #[test]
    fn condition_and_surface_labels() {
        assert_eq!(TrackCondition::parse("良"), Some(TrackCondition::Good));
        assert_eq!(TrackCondition::parse("不良"), Some(TrackCondition::Bad));
        assert_eq!(TrackCondition::parse("?"), None);
        assert_eq!(Surface::parse("芝"), Surface::Turf);
        assert_eq!(Surface::parse("ダート"), Surface::Dirt);
        assert_eq!(Surface::parse("障"), Surface::Other);
    }
}
