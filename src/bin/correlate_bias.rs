use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use turf_index::bias::{BiasTable, BiasTableFile};
use turf_index::cli_args::arg_path;
use turf_index::config::EngineConfig;
use turf_index::corpus::{load_measurements, read_json, write_json};
use turf_index::correlator::{BinStat, correlate};
use turf_index::logging::init_tracing;
use turf_index::store;

fn main() -> Result<()> {
    init_tracing();

    let measurements_path = arg_path("measurements")
        .ok_or_else(|| anyhow!("pass --measurements=<json>"))?;
    let cfg = EngineConfig::load(arg_path("config").as_deref())?;

    let biases: BiasTable = match arg_path("db") {
        Some(db_path) => {
            let conn = store::open_db(&db_path)?;
            store::load_bias_table(&conn).context("load bias table")?
        }
        None => {
            let path = arg_path("bias").unwrap_or_else(|| PathBuf::from("out/track_bias.json"));
            read_json::<BiasTableFile>(&path)?.into()
        }
    };
    let measurements = load_measurements(&measurements_path)?;
    let report = correlate(&biases, &measurements, &cfg)?;

    println!("Bias/measurement correlation");
    println!(
        "Days joined: {} (unmatched measurements: {})",
        report.joined_days, report.unmatched_measurements
    );
    println!("r(cushion, bias) = {}", fmt_opt(report.firmness_r));
    println!("r(moisture goal, bias) = {}", fmt_opt(report.moisture_goal_r));
    println!("r(moisture 4c, bias) = {}", fmt_opt(report.moisture_corner_r));
    print_bins("Cushion", &report.firmness_bins);
    print_bins("Moisture (goal)", &report.moisture_bins);
    println!(
        "Fit: bias = {} (n={}, R2={})",
        report.fit.equation("cushion", "moisture"),
        report.fit.samples,
        fmt_opt(report.r_squared)
    );
    for venue in &report.venue_fits {
        println!(
            "  {}: {} (n={})",
            venue.venue,
            venue.fit.equation("cushion", "moisture"),
            venue.fit.samples
        );
    }
    println!(
        "Tier agreement: exact {:.1}% within one {:.1}%",
        report.tier_agreement * 100.0,
        report.tier_agreement_within_one * 100.0
    );

    if let Some(out) = arg_path("out") {
        write_json(&out, &report)?;
        println!("Report: {}", out.display());
    }
    Ok(())
}

fn print_bins(name: &str, bins: &[BinStat]) {
    println!("{name}:");
    for bin in bins {
        println!(
            "  {:<10} n={:<4} mean bias {}",
            bin.label(),
            bin.count,
            fmt_opt(bin.mean_bias)
        );
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.3}")).unwrap_or_else(|| "n/a".to_string())
}
