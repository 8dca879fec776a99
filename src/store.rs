use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::baseline::{BaselineEntry, BaselineTable};
use crate::bias::{BiasEntry, BiasTable, SpeedTier};
use crate::classify::RaceCategory;
use crate::index::IndexedRace;
use crate::pipeline::RunSummary;
use crate::race::RaceRecord;

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS baseline_entries (
            venue TEXT NOT NULL,
            distance INTEGER NOT NULL,
            category TEXT NOT NULL,
            anchor_index INTEGER NOT NULL,
            avg_early REAL NOT NULL,
            avg_closing REAL NOT NULL,
            avg_total REAL NOT NULL,
            slope REAL NOT NULL,
            samples INTEGER NOT NULL,
            PRIMARY KEY (venue, distance, category)
        );

        CREATE TABLE IF NOT EXISTS bias_entries (
            year INTEGER NOT NULL,
            venue TEXT NOT NULL,
            meeting INTEGER NOT NULL,
            day INTEGER NOT NULL,
            bias REAL NOT NULL,
            samples INTEGER NOT NULL,
            tier TEXT NOT NULL,
            PRIMARY KEY (year, venue, meeting, day)
        );

        CREATE TABLE IF NOT EXISTS bias_cut_points (
            position INTEGER PRIMARY KEY,
            value REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS races (
            race_id TEXT PRIMARY KEY,
            body_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS performance_indices (
            race_id TEXT NOT NULL,
            row_no INTEGER NOT NULL,
            horse_number TEXT NOT NULL,
            horse_name TEXT NOT NULL,
            rank TEXT NOT NULL,
            overall INTEGER NULL,
            closing_leg INTEGER NULL,
            ability INTEGER NULL,
            PRIMARY KEY (race_id, row_no)
        );
        CREATE INDEX IF NOT EXISTS idx_indices_horse ON performance_indices(horse_name);

        CREATE TABLE IF NOT EXISTS pipeline_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            races_in INTEGER NOT NULL,
            baseline_entries INTEGER NOT NULL,
            bias_entries INTEGER NOT NULL,
            races_indexed INTEGER NOT NULL,
            races_skipped INTEGER NOT NULL,
            races_no_bias INTEGER NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn begin_run(conn: &Connection, races_in: usize) -> Result<i64> {
    conn.execute(
        "INSERT INTO pipeline_runs(started_at, finished_at, races_in, baseline_entries, bias_entries, races_indexed, races_skipped, races_no_bias)
         VALUES (?1, NULL, ?2, 0, 0, 0, 0, 0)",
        params![Utc::now().to_rfc3339(), races_in as i64],
    )
    .context("insert pipeline run")?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_run(conn: &Connection, run_id: i64, summary: &RunSummary) -> Result<()> {
    conn.execute(
        "UPDATE pipeline_runs
         SET finished_at = ?1, baseline_entries = ?2, bias_entries = ?3, races_indexed = ?4, races_skipped = ?5, races_no_bias = ?6
         WHERE run_id = ?7",
        params![
            Utc::now().to_rfc3339(),
            summary.baseline.entries as i64,
            summary.bias.entries as i64,
            summary.index.processed as i64,
            summary.index.skipped() as i64,
            summary.index.no_bias as i64,
            run_id
        ],
    )
    .context("finish pipeline run")?;
    Ok(())
}

/// Replaces every table wholesale: tables are rebuilt per run, never patched.
pub fn save_tables(
    conn: &mut Connection,
    baselines: &BaselineTable,
    biases: &BiasTable,
    indexed: &[IndexedRace],
) -> Result<()> {
    let tx = conn.transaction().context("begin save transaction")?;
    tx.execute_batch(
        "DELETE FROM baseline_entries; DELETE FROM bias_entries; DELETE FROM bias_cut_points;
         DELETE FROM races; DELETE FROM performance_indices;",
    )
    .context("clear tables")?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO baseline_entries(venue, distance, category, anchor_index, avg_early, avg_closing, avg_total, slope, samples)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for e in baselines.iter() {
            stmt.execute(params![
                e.venue,
                e.distance as i64,
                e.category.label(),
                e.anchor_index as i64,
                e.avg_early,
                e.avg_closing,
                e.avg_total,
                e.slope,
                e.samples as i64
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO bias_entries(year, venue, meeting, day, bias, samples, tier)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for e in biases.iter() {
            stmt.execute(params![
                e.year as i64,
                e.venue,
                e.meeting as i64,
                e.day as i64,
                e.bias,
                e.samples as i64,
                e.tier.label()
            ])?;
        }

        let mut stmt = tx.prepare("INSERT INTO bias_cut_points(position, value) VALUES (?1, ?2)")?;
        for (pos, value) in biases.cut_points().iter().enumerate() {
            stmt.execute(params![pos as i64, value])?;
        }

        let mut race_stmt =
            tx.prepare("INSERT OR REPLACE INTO races(race_id, body_json) VALUES (?1, ?2)")?;
        let mut idx_stmt = tx.prepare(
            "INSERT OR REPLACE INTO performance_indices(race_id, row_no, horse_number, horse_name, rank, overall, closing_leg, ability)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for race in indexed {
            let body = serde_json::to_string(&race.race).context("serialize race")?;
            race_stmt.execute(params![race.race.race_id, body])?;
            for (row_no, row) in race.finishers.iter().enumerate() {
                let idx = row.index;
                idx_stmt.execute(params![
                    race.race.race_id,
                    row_no as i64,
                    row.finisher.horse_number,
                    row.finisher.horse_name,
                    row.finisher.rank,
                    idx.map(|i| i.overall),
                    idx.map(|i| i.closing_leg),
                    idx.map(|i| i.ability)
                ])?;
            }
        }
    }

    tx.commit().context("commit save transaction")?;
    Ok(())
}

pub fn load_baseline_table(conn: &Connection) -> Result<BaselineTable> {
    let mut stmt = conn.prepare(
        "SELECT venue, distance, category, anchor_index, avg_early, avg_closing, avg_total, slope, samples
         FROM baseline_entries ORDER BY venue, distance, category",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, f64>(4)?,
            row.get::<_, f64>(5)?,
            row.get::<_, f64>(6)?,
            row.get::<_, f64>(7)?,
            row.get::<_, i64>(8)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (venue, distance, category, anchor, early, closing, total, slope, samples) = row?;
        let category = RaceCategory::from_label(&category)
            .ok_or_else(|| anyhow!("unknown category {category:?} in baseline_entries"))?;
        entries.push(BaselineEntry {
            venue,
            distance: u32::try_from(distance).context("baseline distance out of range")?,
            category,
            anchor_index: i32::try_from(anchor).context("anchor index out of range")?,
            avg_early: early,
            avg_closing: closing,
            avg_total: total,
            slope,
            samples: samples.max(0) as usize,
        });
    }
    Ok(BaselineTable::from_entries(entries))
}

pub fn load_bias_table(conn: &Connection) -> Result<BiasTable> {
    let mut stmt = conn.prepare(
        "SELECT year, venue, meeting, day, bias, samples, tier
         FROM bias_entries ORDER BY year, venue, meeting, day",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, f64>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;
    let mut entries = Vec::new();
    for row in rows {
        let (year, venue, meeting, day, bias, samples, tier) = row?;
        let tier = SpeedTier::from_label(&tier)
            .ok_or_else(|| anyhow!("unknown tier {tier:?} in bias_entries"))?;
        entries.push(BiasEntry {
            year: i32::try_from(year).context("bias year out of range")?,
            venue,
            meeting: u32::try_from(meeting).context("meeting out of range")?,
            day: u32::try_from(day).context("day out of range")?,
            bias,
            samples: samples.max(0) as usize,
            tier,
        });
    }

    let mut stmt = conn.prepare("SELECT value FROM bias_cut_points ORDER BY position")?;
    let cut_points = stmt
        .query_map([], |row| row.get::<_, f64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(BiasTable::from_entries(entries, cut_points))
}

pub fn load_race(conn: &Connection, race_id: &str) -> Result<Option<RaceRecord>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body_json FROM races WHERE race_id = ?1",
            params![race_id],
            |row| row.get(0),
        )
        .optional()
        .context("query race")?;
    body.map(|raw| serde_json::from_str(&raw).context("parse stored race"))
        .transpose()
}
