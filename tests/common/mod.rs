#![allow(dead_code)]

use turf_index::race::{FinisherRecord, RaceRecord, Surface, TrackCondition};

pub fn finisher(rank: &str, time: &str, closing: &str) -> FinisherRecord {
    FinisherRecord {
        rank: rank.to_string(),
        horse_name: format!("horse-{rank}"),
        horse_number: rank.to_string(),
        time: time.to_string(),
        closing: closing.to_string(),
        extra: Vec::new(),
    }
}

pub struct RaceSpec<'a> {
    pub id: &'a str,
    pub venue: &'a str,
    pub distance: u32,
    pub class_label: &'a str,
    pub surface: Surface,
    pub condition: TrackCondition,
    pub meeting: u32,
    pub day: u32,
}

impl Default for RaceSpec<'_> {
    fn default() -> Self {
        Self {
            id: "202305040901",
            venue: "東京",
            distance: 2000,
            class_label: "3歳以上2勝クラス",
            surface: Surface::Turf,
            condition: TrackCondition::Good,
            meeting: 4,
            day: 9,
        }
    }
}

pub fn race(spec: RaceSpec<'_>, finishers: Vec<FinisherRecord>) -> RaceRecord {
    RaceRecord {
        race_id: spec.id.to_string(),
        year: 2023,
        venue: spec.venue.to_string(),
        surface: spec.surface,
        distance: spec.distance,
        class_label: spec.class_label.to_string(),
        condition: Some(spec.condition),
        meeting: spec.meeting,
        day: spec.day,
        weather: "晴".to_string(),
        finishers,
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
