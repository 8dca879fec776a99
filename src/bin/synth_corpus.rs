use std::path::PathBuf;

use anyhow::Result;

use turf_index::cli_args::{arg_parsed, arg_path};
use turf_index::corpus::write_json;
use turf_index::logging::init_tracing;
use turf_index::synthetic::{SyntheticConfig, generate};

fn main() -> Result<()> {
    init_tracing();

    let mut cfg = SyntheticConfig::default();
    if let Some(seed) = arg_parsed::<u64>("seed")? {
        cfg.seed = seed;
    }
    if let Some(days) = arg_parsed::<u32>("days")? {
        cfg.days_per_venue = days.max(1);
    }
    if let Some(runners) = arg_parsed::<u32>("runners")? {
        cfg.runners = runners.max(2);
    }
    let out = arg_path("out").unwrap_or_else(|| PathBuf::from("synthetic_corpus.json"));

    let corpus = generate(&cfg);
    write_json(&out, &corpus.races)?;
    println!("Synthetic corpus: {} ({} races)", out.display(), corpus.races.len());

    if let Some(path) = arg_path("measurements") {
        write_json(&path, &corpus.measurements)?;
        println!(
            "Measurements: {} ({} days)",
            path.display(),
            corpus.measurements.len()
        );
    }
    Ok(())
}
