use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::correlator::TrackMeasurement;
use crate::index::IndexedRace;
use crate::race::{
    FinisherRecord, RaceRecord, Surface, TrackCondition, parse_day, parse_distance, parse_meeting,
    year_from_race_id,
};

pub const RESULT_PREFIX: &str = "result_";
pub const INDEX_PREFIX: &str = "index_";

const COL_VENUE: &str = "競馬場名";
const COL_MEETING: &str = "開催";
const COL_DAY: &str = "開催日";
const COL_CLASS: &str = "クラス";
const COL_SURFACE: &str = "芝/ダート";
const COL_DISTANCE: &str = "距離";
const COL_WEATHER: &str = "天候";
const COL_CONDITION: &str = "馬場";
const COL_RANK: &str = "着順";
const COL_HORSE_NUMBER: &str = "馬番";
const COL_HORSE_NAME: &str = "馬名";
const COL_TIME: &str = "タイム";
const COL_CLOSING: &str = "上がり";

const RACE_COLUMNS: &[&str] = &[
    COL_VENUE,
    COL_MEETING,
    COL_DAY,
    COL_CLASS,
    COL_SURFACE,
    COL_DISTANCE,
    COL_WEATHER,
    COL_CONDITION,
];

const FINISHER_COLUMNS: &[&str] = &[
    COL_RANK,
    "枠番",
    COL_HORSE_NUMBER,
    COL_HORSE_NAME,
    "性齢",
    "斤量",
    "騎手",
    COL_TIME,
    "着差",
    "通過",
    COL_CLOSING,
    "人気",
    "単勝オッズ",
];

const INDEX_COLUMNS: &[&str] = &["総合指数", "上がり指数", "能力指数"];

#[derive(Debug, Clone, Default)]
pub struct CorpusLoad {
    pub races: Vec<RaceRecord>,
    pub files_seen: usize,
    pub errors: Vec<String>,
}

/// A JSON array of races, or a directory of `result_<race id>.csv` files.
pub fn load_corpus(path: &Path) -> Result<CorpusLoad> {
    if path.is_dir() {
        return load_result_dir(path);
    }
    let races: Vec<RaceRecord> = read_json(path)?;
    Ok(CorpusLoad {
        files_seen: 1,
        races,
        errors: Vec::new(),
    })
}

/// Files are read in name order so repeated runs see the same corpus order.
pub fn load_result_dir(dir: &Path) -> Result<CorpusLoad> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read corpus dir {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "csv")
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(RESULT_PREFIX))
        })
        .collect();
    files.sort();

    let mut out = CorpusLoad {
        files_seen: files.len(),
        ..CorpusLoad::default()
    };
    for path in files {
        let race_id = race_id_from_path(&path).unwrap_or_default();
        let parsed = fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))
            .and_then(|raw| parse_result_csv(&race_id, &raw));
        match parsed {
            Ok(race) => out.races.push(race),
            Err(err) => {
                tracing::warn!(file = %path.display(), "skipping result file: {err:#}");
                out.errors.push(format!("{}: {err:#}", path.display()));
            }
        }
    }
    Ok(out)
}

pub fn race_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let id = stem.strip_prefix(RESULT_PREFIX).unwrap_or(stem);
    Some(id.to_string())
}

/// One result page: a header row, then one row per runner. Race-level columns
/// are read from the first row.
pub fn parse_result_csv(race_id: &str, raw: &str) -> Result<RaceRecord> {
    let year = year_from_race_id(race_id)
        .ok_or_else(|| anyhow!("race id {race_id:?} does not start with a year"))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());
    let headers = reader.headers().context("read csv header")?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record.context("read csv row")?);
    }
    let first = rows.first().ok_or_else(|| anyhow!("no runner rows"))?;
    let field = |row: &csv::StringRecord, name: &str| -> String {
        col(name)
            .and_then(|i| row.get(i))
            .unwrap_or_default()
            .to_string()
    };

    let venue = field(first, COL_VENUE);
    let class_label = field(first, COL_CLASS);
    if venue.is_empty() || class_label.is_empty() {
        return Err(anyhow!("missing venue or class label"));
    }
    let distance_raw = field(first, COL_DISTANCE);
    let distance = parse_distance(&distance_raw)
        .ok_or_else(|| anyhow!("bad distance {distance_raw:?}"))?;
    let meeting_raw = field(first, COL_MEETING);
    let meeting =
        parse_meeting(&meeting_raw).ok_or_else(|| anyhow!("bad meeting {meeting_raw:?}"))?;
    let day_raw = field(first, COL_DAY);
    let day = parse_day(&day_raw).ok_or_else(|| anyhow!("bad day {day_raw:?}"))?;

    let mut finishers = Vec::with_capacity(rows.len());
    for row in &rows {
        let extra = FINISHER_COLUMNS
            .iter()
            .filter(|name| {
                ![COL_RANK, COL_HORSE_NUMBER, COL_HORSE_NAME, COL_TIME, COL_CLOSING]
                    .contains(*name)
            })
            .map(|name| (name.to_string(), field(row, name)))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        finishers.push(FinisherRecord {
            rank: field(row, COL_RANK),
            horse_name: field(row, COL_HORSE_NAME),
            horse_number: field(row, COL_HORSE_NUMBER),
            time: field(row, COL_TIME),
            closing: field(row, COL_CLOSING),
            extra,
        });
    }

    Ok(RaceRecord {
        race_id: race_id.to_string(),
        year,
        venue,
        surface: Surface::parse(&field(first, COL_SURFACE)),
        distance,
        class_label,
        condition: TrackCondition::parse(&field(first, COL_CONDITION)),
        meeting,
        day,
        weather: field(first, COL_WEATHER),
        finishers,
    })
}

/// Source columns plus the three index columns; null indices are empty cells.
pub fn write_index_csv(dir: &Path, race: &IndexedRace) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(format!("{INDEX_PREFIX}{}.csv", race.race.race_id));
    let mut writer =
        csv::Writer::from_path(&path).with_context(|| format!("create {}", path.display()))?;

    let header: Vec<&str> = RACE_COLUMNS
        .iter()
        .chain(FINISHER_COLUMNS)
        .chain(INDEX_COLUMNS)
        .copied()
        .collect();
    writer.write_record(&header)?;

    let r = &race.race;
    let meeting = format!("{}回", r.meeting);
    let day = format!("{}日目", r.day);
    let distance = r.distance.to_string();
    let condition = r.condition.map(|c| c.label()).unwrap_or_default();
    for row in &race.finishers {
        let f = &row.finisher;
        let mut cells: Vec<&str> = vec![
            r.venue.as_str(),
            meeting.as_str(),
            day.as_str(),
            r.class_label.as_str(),
            r.surface.label(),
            distance.as_str(),
            r.weather.as_str(),
            condition,
        ];
        for name in FINISHER_COLUMNS {
            let value = match *name {
                COL_RANK => f.rank.as_str(),
                COL_HORSE_NUMBER => f.horse_number.as_str(),
                COL_HORSE_NAME => f.horse_name.as_str(),
                COL_TIME => f.time.as_str(),
                COL_CLOSING => f.closing.as_str(),
                other => f
                    .extra
                    .iter()
                    .find(|(k, _)| k == other)
                    .map(|(_, v)| v.as_str())
                    .unwrap_or_default(),
            };
            cells.push(value);
        }
        let index = row.index_cells();
        cells.extend(index.iter().map(String::as_str));
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(path)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

/// Pretty JSON written through a temp file and renamed into place.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value).context("serialize json")?;
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

pub fn load_measurements(path: &Path) -> Result<Vec<TrackMeasurement>> {
    read_json(path).context("load track measurements")
}
