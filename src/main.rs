use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use turf_index::bias::BiasTableFile;
use turf_index::cli_args::{arg_path, has_flag};
use turf_index::config::EngineConfig;
use turf_index::corpus::{load_corpus, write_index_csv, write_json};
use turf_index::export::export_workbook;
use turf_index::logging::init_tracing;
use turf_index::pipeline::run_pipeline;
use turf_index::store;

const BASELINE_FILE: &str = "base_times.json";
const BIAS_FILE: &str = "track_bias.json";
const INDEX_DIR: &str = "indices";

fn main() -> Result<()> {
    init_tracing();

    let corpus_path = arg_path("corpus")
        .or_else(|| std::env::var("TURF_INDEX_CORPUS").ok().map(PathBuf::from))
        .ok_or_else(|| anyhow!("no corpus given; pass --corpus=<file|dir>"))?;
    let cfg = EngineConfig::load(arg_path("config").as_deref())?;
    let out_dir = arg_path("out").unwrap_or_else(|| PathBuf::from("out"));

    let corpus = load_corpus(&corpus_path)?;
    if corpus.races.is_empty() {
        return Err(anyhow!("corpus {} has no races", corpus_path.display()));
    }
    for err in corpus.errors.iter().take(6) {
        eprintln!("[WARN] {err}");
    }

    let output = run_pipeline(&corpus.races, &cfg);

    write_json(&out_dir.join(BASELINE_FILE), &output.baselines.to_rows())?;
    write_json(&out_dir.join(BIAS_FILE), &BiasTableFile::from(&output.biases))?;
    if !has_flag("no-csv") {
        let index_dir = out_dir.join(INDEX_DIR);
        for race in &output.indexed {
            write_index_csv(&index_dir, race)?;
        }
    }

    if let Some(db_path) = arg_path("db") {
        let mut conn = store::open_db(&db_path)?;
        let run_id = store::begin_run(&conn, corpus.races.len())?;
        store::save_tables(&mut conn, &output.baselines, &output.biases, &output.indexed)
            .context("persist pipeline tables")?;
        store::finish_run(&conn, run_id, &output.summary)?;
        println!("DB: {} (run {run_id})", db_path.display());
    }

    if let Some(xlsx_path) = arg_path("xlsx") {
        let report = export_workbook(
            &xlsx_path,
            &output.baselines,
            &output.biases,
            &output.summary,
        )?;
        println!(
            "Workbook: {} ({} baselines, {} bias days)",
            xlsx_path.display(),
            report.baseline_rows,
            report.bias_rows
        );
    }

    println!("Pipeline complete");
    println!("Corpus: {} ({} files)", corpus_path.display(), corpus.files_seen);
    if !corpus.errors.is_empty() {
        println!("Unreadable files: {}", corpus.errors.len());
    }
    println!("{}", output.summary);
    println!("Output: {}", out_dir.display());
    Ok(())
}
