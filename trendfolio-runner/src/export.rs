//! Run artifacts: JSON report plus CSV trade and equity tapes.
//!
//! `write_run` lays out one directory per run:
//! - `report.json`: the full [`RunReport`], schema-versioned
//! - `trades.csv`: one row per closed trade
//! - `equity.csv`: one row per equity sample
//!
//! Reports with a newer schema version than this build are rejected on load.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use trendfolio_core::domain::{EquitySample, Trade};

use crate::runner::{RunReport, SCHEMA_VERSION};

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV ────────────────────────────────────────────────────────────

pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "entry_date",
        "exit_date",
        "entry_price",
        "exit_price",
        "shares",
        "pnl",
        "pnl_pct",
        "hold_days",
        "commission",
        "entry_reason",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            t.symbol.clone(),
            t.entry_date.to_string(),
            t.exit_date.to_string(),
            format!("{:.6}", t.entry_price),
            format!("{:.6}", t.exit_price),
            t.shares.to_string(),
            format!("{:.2}", t.pnl),
            format!("{:.6}", t.pnl_pct),
            t.hold_days.to_string(),
            format!("{:.2}", t.commission),
            t.entry_reason.as_str().to_string(),
            t.exit_reason.as_str().to_string(),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush trades CSV")?;
    String::from_utf8(bytes).context("trades CSV is not valid UTF-8")
}

pub fn export_equity_csv(equity_curve: &[EquitySample]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "cash",
        "position_value",
        "equity",
        "running_peak",
        "drawdown",
        "open_count",
    ])?;

    for s in equity_curve {
        wtr.write_record([
            s.date.to_string(),
            format!("{:.2}", s.cash),
            format!("{:.2}", s.position_value),
            format!("{:.2}", s.equity),
            format!("{:.2}", s.running_peak),
            format!("{:.6}", s.drawdown),
            s.open_count.to_string(),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush equity CSV")?;
    String::from_utf8(bytes).context("equity CSV is not valid UTF-8")
}

// ─── Files ──────────────────────────────────────────────────────────

/// Write all artifacts for `report` into `dir/<run_id prefix>/`.
///
/// Returns the directory written.
pub fn write_run(dir: &Path, report: &RunReport) -> Result<PathBuf> {
    let prefix = report.run_id.get(..12).unwrap_or(&report.run_id);
    let run_dir = dir.join(prefix);
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create {}", run_dir.display()))?;

    write_file(&run_dir.join("report.json"), &export_json(report)?)?;
    write_file(&run_dir.join("trades.csv"), &export_trades_csv(&report.trades)?)?;
    write_file(
        &run_dir.join("equity.csv"),
        &export_equity_csv(&report.equity_curve)?,
    )?;
    Ok(run_dir)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
