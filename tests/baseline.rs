mod common;

use common::{RaceSpec, approx, finisher, race};
use turf_index::baseline::build_baseline_table;
use turf_index::classify::RaceCategory;
use turf_index::config::EngineConfig;
use turf_index::race::{Surface, TrackCondition};

fn corpus() -> Vec<turf_index::race::RaceRecord> {
    vec![
        race(
            RaceSpec::default(),
            vec![
                finisher("1", "1:59.0", "35.0"),
                finisher("2", "2:00.0", "35.5"),
                finisher("中", "", ""),
            ],
        ),
        race(
            RaceSpec {
                id: "202305040902",
                condition: TrackCondition::SlightlyHeavy,
                ..RaceSpec::default()
            },
            vec![finisher("1", "2:05.0", "37.0")],
        ),
        race(
            RaceSpec {
                id: "202305040903",
                surface: Surface::Dirt,
                ..RaceSpec::default()
            },
            vec![finisher("1", "2:03.0", "37.0")],
        ),
        race(
            RaceSpec {
                id: "202305040904",
                class_label: "障害3歳以上オープン",
                ..RaceSpec::default()
            },
            vec![finisher("1", "3:20.0", "13.0")],
        ),
        race(
            RaceSpec {
                id: "202306010105",
                venue: "中山",
                distance: 1600,
                class_label: "3歳未勝利",
                ..RaceSpec::default()
            },
            vec![finisher("1", "1:35.0", "34.0")],
        ),
    ]
}

#[test]
fn averages_come_from_good_turf_only() {
    let (table, summary) = build_baseline_table(&corpus(), &EngineConfig::default());
    assert_eq!(table.len(), 2);
    assert_eq!(summary.races_filtered, 2);
    assert_eq!(summary.races_unclassified, 1);
    assert_eq!(summary.races_used, 2);
    assert_eq!(summary.finishers_used, 3);

    let entry = table
        .lookup("東京", 2000, RaceCategory::Win2)
        .expect("tokyo 2000 baseline");
    assert_eq!(entry.samples, 2);
    assert_eq!(entry.anchor_index, 305);
    assert!(approx(entry.avg_early, 84.25));
    assert!(approx(entry.avg_closing, 35.25));
    assert!(approx(entry.avg_total, 119.5));
    assert!(approx(entry.slope, 1.0));
}

#[test]
fn slope_needs_minimum_samples() {
    let (table, _) = build_baseline_table(&corpus(), &EngineConfig::default());
    let single = table
        .lookup("中山", 1600, RaceCategory::Maiden)
        .expect("nakayama 1600 baseline");
    assert_eq!(single.samples, 1);
    assert_eq!(single.slope, 0.0);
    assert_eq!(single.anchor_index, 280);

    let strict = EngineConfig {
        min_slope_samples: 3,
        ..EngineConfig::default()
    };
    let (table, _) = build_baseline_table(&corpus(), &strict);
    let tokyo = table.lookup("東京", 2000, RaceCategory::Win2).unwrap();
    assert_eq!(tokyo.slope, 0.0);
}

#[test]
fn slope_is_pooled_across_categories_on_one_course() {
    let mut races = corpus();
    races.push(race(
        RaceSpec {
            id: "202305040906",
            class_label: "3歳以上1勝クラス",
            ..RaceSpec::default()
        },
        vec![finisher("1", "2:01.0", "36.0")],
    ));
    let (table, _) = build_baseline_table(&races, &EngineConfig::default());
    let win1 = table.lookup("東京", 2000, RaceCategory::Win1).unwrap();
    let win2 = table.lookup("東京", 2000, RaceCategory::Win2).unwrap();
    assert_eq!(win1.samples, 1);
    assert_eq!(win1.slope, win2.slope);
    assert!(win1.slope > 0.0);
}

#[test]
fn table_is_sorted_by_key() {
    let (table, _) = build_baseline_table(&corpus(), &EngineConfig::default());
    let keys: Vec<_> = table.iter().map(|e| e.key()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}
