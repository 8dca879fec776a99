use std::fs;

use turf_index::config::EngineConfig;
use turf_index::correlator::correlate;
use turf_index::index::{RaceIndexOutcome, compute_race_indices};
use turf_index::pipeline::run_pipeline;
use turf_index::store;
use turf_index::synthetic::{SyntheticConfig, generate};

#[test]
fn runs_are_deterministic() {
    let corpus = generate(&SyntheticConfig::default());
    let cfg = EngineConfig::default();
    let a = run_pipeline(&corpus.races, &cfg);
    let b = run_pipeline(&corpus.races, &cfg);
    assert_eq!(a.summary, b.summary);
    assert_eq!(a.baselines, b.baselines);
    assert_eq!(a.biases, b.biases);
    assert_eq!(a.indexed, b.indexed);
}

#[test]
fn summary_accounts_for_every_race() {
    let corpus = generate(&SyntheticConfig::default());
    let out = run_pipeline(&corpus.races, &EngineConfig::default());
    let s = out.summary;
    assert_eq!(s.races_in, corpus.races.len());
    assert_eq!(s.index.processed + s.index.skipped(), corpus.races.len());
    assert!(s.index.skipped_not_turf > 0);
    assert!(s.baseline.entries > 0);
    assert!(s.bias.entries > 0);
    assert_eq!(s.tier_counts.iter().sum::<usize>(), s.bias.entries);
    assert_eq!(out.indexed.len(), s.index.processed);
    assert!(s.to_string().contains("Indexed races"));
}

#[test]
fn single_race_recompute_matches_batch() {
    let corpus = generate(&SyntheticConfig::default());
    let cfg = EngineConfig::default();
    let out = run_pipeline(&corpus.races, &cfg);
    for race in &out.indexed {
        match compute_race_indices(&race.race, &out.baselines, &out.biases, &cfg) {
            RaceIndexOutcome::Indexed(again) => assert_eq!(&again, race),
            RaceIndexOutcome::Skipped { race_id, reason } => {
                panic!("{race_id} skipped on recompute: {reason:?}")
            }
        }
    }
}

#[test]
fn persisted_tables_reproduce_indices() {
    let corpus = generate(&SyntheticConfig {
        days_per_venue: 4,
        ..SyntheticConfig::default()
    });
    let cfg = EngineConfig::default();
    let out = run_pipeline(&corpus.races, &cfg);

    let dir = std::env::temp_dir().join(format!("turf_index_store_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    let db_path = dir.join("tables.sqlite");
    let mut conn = store::open_db(&db_path).expect("db opens");
    let run_id = store::begin_run(&conn, corpus.races.len()).expect("run starts");
    store::save_tables(&mut conn, &out.baselines, &out.biases, &out.indexed).expect("tables save");
    store::finish_run(&conn, run_id, &out.summary).expect("run finishes");

    let baselines = store::load_baseline_table(&conn).expect("baselines load");
    let biases = store::load_bias_table(&conn).expect("biases load");
    assert_eq!(baselines, out.baselines);
    assert_eq!(biases, out.biases);

    let target = &out.indexed[out.indexed.len() / 2];
    let race = store::load_race(&conn, &target.race.race_id)
        .expect("race query")
        .expect("race stored");
    match compute_race_indices(&race, &baselines, &biases, &cfg) {
        RaceIndexOutcome::Indexed(again) => assert_eq!(&again, target),
        RaceIndexOutcome::Skipped { reason, .. } => panic!("skipped: {reason:?}"),
    }

    // Saving again replaces rather than appends.
    store::save_tables(&mut conn, &out.baselines, &out.biases, &out.indexed).expect("resave");
    assert_eq!(store::load_baseline_table(&conn).unwrap().len(), out.baselines.len());

    drop(conn);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn estimated_bias_tracks_synthetic_measurements() {
    let corpus = generate(&SyntheticConfig::default());
    let cfg = EngineConfig::default();
    let out = run_pipeline(&corpus.races, &cfg);
    let report = correlate(&out.biases, &corpus.measurements, &cfg).expect("fit succeeds");
    assert!(report.joined_days >= 30);
    assert!(report.moisture_goal_r.unwrap() > 0.5);
    assert!(report.firmness_r.unwrap() < -0.3);
    assert!(report.r_squared.unwrap() > 0.3);
}
