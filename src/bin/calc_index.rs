use anyhow::{Context, Result, anyhow};

use turf_index::cli_args::{arg_path, arg_value};
use turf_index::config::EngineConfig;
use turf_index::index::{RaceIndexOutcome, compute_race_indices};
use turf_index::logging::init_tracing;
use turf_index::store;

fn main() -> Result<()> {
    init_tracing();

    let race_id = arg_value("race").ok_or_else(|| anyhow!("pass --race=<race id>"))?;
    let db_path = arg_path("db").ok_or_else(|| anyhow!("pass --db=<sqlite path>"))?;
    let cfg = EngineConfig::load(arg_path("config").as_deref())?;

    let conn = store::open_db(&db_path)?;
    let baselines = store::load_baseline_table(&conn).context("load baselines")?;
    let biases = store::load_bias_table(&conn).context("load bias table")?;
    let race = store::load_race(&conn, &race_id)?
        .ok_or_else(|| anyhow!("race {race_id} is not in {}", db_path.display()))?;

    match compute_race_indices(&race, &baselines, &biases, &cfg) {
        RaceIndexOutcome::Skipped { race_id, reason } => {
            println!("{race_id}: skipped ({reason:?})");
        }
        RaceIndexOutcome::Indexed(indexed) => {
            println!(
                "{} {} {}m {} [{}]",
                indexed.race.race_id,
                indexed.race.venue,
                indexed.race.distance,
                indexed.race.class_label,
                indexed.category.label()
            );
            println!(
                "anchor={} (generation {:+}) race_bias={:.2} tier={}",
                indexed.anchor_index,
                indexed.generation_correction,
                indexed.race_bias,
                indexed.speed_tier.map(|t| t.label()).unwrap_or("n/a")
            );
            if !indexed.bias_found {
                eprintln!("[WARN] no bias entry for {}; bias taken as 0", indexed.day_key);
            }
            for row in &indexed.finishers {
                let [overall, closing, ability] = row.index_cells();
                println!(
                    "{:>3} {:>3} {:<18} {:>7} {:>5} | {:>4} {:>4} {:>4}",
                    row.finisher.rank,
                    row.finisher.horse_number,
                    row.finisher.horse_name,
                    row.finisher.time,
                    row.finisher.closing,
                    overall,
                    closing,
                    ability
                );
            }
        }
    }
    Ok(())
}
