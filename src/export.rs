use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::baseline::BaselineTable;
use crate::bias::{BiasTable, SpeedTier};
use crate::pipeline::RunSummary;

pub struct ExportReport {
    pub baseline_rows: usize,
    pub bias_rows: usize,
}

pub fn export_workbook(
    path: &Path,
    baselines: &BaselineTable,
    biases: &BiasTable,
    summary: &RunSummary,
) -> Result<ExportReport> {
    let mut baseline_rows = vec![strings(&[
        "Venue", "Distance", "Class", "Anchor", "Early", "Closing", "Total", "Slope", "Samples",
    ])];
    baseline_rows.extend(baselines.iter().map(|e| {
        vec![
            e.venue.clone(),
            e.distance.to_string(),
            e.category.label().to_string(),
            e.anchor_index.to_string(),
            format!("{:.2}", e.avg_early),
            format!("{:.2}", e.avg_closing),
            format!("{:.2}", e.avg_total),
            format!("{:.4}", e.slope),
            e.samples.to_string(),
        ]
    }));

    let mut bias_rows = vec![strings(&[
        "Day", "Year", "Venue", "Meeting", "Day No", "Bias", "Samples", "Tier",
    ])];
    bias_rows.extend(biases.iter().map(|e| {
        vec![
            e.key().to_string(),
            e.year.to_string(),
            e.venue.clone(),
            e.meeting.to_string(),
            e.day.to_string(),
            format!("{:.2}", e.bias),
            e.samples.to_string(),
            e.tier.label().to_string(),
        ]
    }));

    let mut tier_rows = vec![strings(&["Tier", "Lower bound", "Days"])];
    let counts = biases.tier_counts();
    for tier in SpeedTier::ALL {
        let lower = match tier.index() {
            0 => String::new(),
            i => biases
                .cut_points()
                .get(i - 1)
                .map(|c| format!("{c:.2}"))
                .unwrap_or_default(),
        };
        tier_rows.push(vec![
            tier.label().to_string(),
            lower,
            counts[tier.index()].to_string(),
        ]);
    }

    let summary_rows: Vec<Vec<String>> = summary
        .to_string()
        .lines()
        .map(|line| vec![line.to_string()])
        .collect();

    let mut workbook = Workbook::new();
    for (name, rows) in [
        ("Baselines", &baseline_rows),
        ("Bias", &bias_rows),
        ("Tiers", &tier_rows),
        ("Summary", &summary_rows),
    ] {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        write_rows(sheet, rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        baseline_rows: baseline_rows.len().saturating_sub(1),
        bias_rows: bias_rows.len().saturating_sub(1),
    })
}

fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
