use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static GRADED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"G[1-3I]|GI|GII|GIII|リステッド|L$").expect("graded pattern is valid")
});

const JUMP_MARKERS: &[&str] = &["障害"];
const MAIDEN_MARKERS: &[&str] = &["新馬", "未勝利"];
const WIN1_MARKERS: &[&str] = &["1勝", "500万下"];
const WIN2_MARKERS: &[&str] = &["2勝", "1000万下"];
const WIN3_MARKERS: &[&str] = &["3勝", "1600万下"];
const OPEN_MARKERS: &[&str] = &["オープン", "OP"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RaceCategory {
    Maiden,
    Win1,
    Win2,
    Win3,
    Open,
}

impl RaceCategory {
    pub const ALL: [RaceCategory; 5] = [
        RaceCategory::Maiden,
        RaceCategory::Win1,
        RaceCategory::Win2,
        RaceCategory::Win3,
        RaceCategory::Open,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RaceCategory::Maiden => "未勝利",
            RaceCategory::Win1 => "1勝クラス",
            RaceCategory::Win2 => "2勝クラス",
            RaceCategory::Win3 => "3勝クラス",
            RaceCategory::Open => "OP",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == raw.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Generation {
    TwoYearOld,
    ThreeYearOld,
    Mixed,
}

impl Generation {
    pub fn label(self) -> &'static str {
        match self {
            Generation::TwoYearOld => "2歳",
            Generation::ThreeYearOld => "3歳",
            Generation::Mixed => "古馬",
        }
    }
}

/// Maps a free-text class label to a category. Labels routinely match more than
/// one marker ("3歳1勝クラス"), so the check order below is load-bearing:
/// jump, maiden/debut, win tiers ascending, open, graded.
pub fn classify_race(class_label: &str) -> Option<RaceCategory> {
    let label = class_label.trim();
    if label.is_empty() || contains_any(label, JUMP_MARKERS) {
        return None;
    }
    if contains_any(label, MAIDEN_MARKERS) {
        return Some(RaceCategory::Maiden);
    }
    if contains_any(label, WIN1_MARKERS) {
        return Some(RaceCategory::Win1);
    }
    if contains_any(label, WIN2_MARKERS) {
        return Some(RaceCategory::Win2);
    }
    if contains_any(label, WIN3_MARKERS) {
        return Some(RaceCategory::Win3);
    }
    if contains_any(label, OPEN_MARKERS) || GRADED_RE.is_match(label) {
        return Some(RaceCategory::Open);
    }
    None
}

/// "3歳以上" is an open-age race, not a 3yo-only one.
pub fn detect_generation(class_label: &str) -> Generation {
    if class_label.contains("2歳") {
        Generation::TwoYearOld
    } else if class_label.contains("3歳") && !class_label.contains("以上") {
        Generation::ThreeYearOld
    } else {
        Generation::Mixed
    }
}

fn contains_any(label: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| label.contains(m))
}
