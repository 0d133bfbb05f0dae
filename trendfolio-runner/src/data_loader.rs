//! Bar loading for the runner.
//!
//! Reads one CSV per symbol (`<SYMBOL>.csv`, header
//! `date,open,high,low,close,volume`) from a data directory and assembles a
//! [`Universe`]. A symbol whose file is missing, unreadable or lacks a column
//! is skipped with a warning; it never aborts the batch. Individual rows that
//! fail to parse are dropped for that date only.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};
use trendfolio_core::domain::{Bar, DataError, PriceSeries, Universe};
use trendfolio_core::ConfigError;

use crate::config::DataConfig;
use crate::synthetic::generate_universe;

/// Errors from config and data loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to read CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("no data source configured (set data.dir or data.synthetic)")]
    NoDataSource,

    #[error("no usable symbols loaded")]
    EmptyUniverse,
}

const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Build the universe described by `data`.
pub fn load_data(data: &DataConfig) -> Result<Universe, LoadError> {
    let universe = match (&data.synthetic, &data.dir) {
        (Some(synthetic), _) => generate_universe(synthetic),
        (None, Some(dir)) => load_universe(dir, &data.symbols)?,
        (None, None) => return Err(LoadError::NoDataSource),
    };
    if universe.is_empty() {
        return Err(LoadError::EmptyUniverse);
    }
    Ok(universe)
}

/// Load `symbols` from `dir`. An empty list loads every `*.csv` in the directory.
pub fn load_universe(dir: &Path, symbols: &[String]) -> Result<Universe, LoadError> {
    let symbols = if symbols.is_empty() {
        discover_symbols(dir)?
    } else {
        symbols.to_vec()
    };

    let mut universe = Universe::new();
    let mut dropped_bars = 0usize;
    for symbol in symbols {
        let path = dir.join(format!("{symbol}.csv"));
        let series = load_symbol_csv(&path, &symbol)
            .and_then(|bars| PriceSeries::new(symbol.clone(), bars).map_err(LoadError::from));
        match series {
            Ok((series, dropped)) => {
                if dropped > 0 {
                    warn!(%symbol, dropped, "dropped invalid bars");
                    dropped_bars += dropped;
                }
                if let Err(e) = universe.insert(series) {
                    universe.skip(symbol, &e);
                }
            }
            Err(e) => universe.skip(symbol, &e),
        }
    }
    info!(
        loaded = universe.len(),
        skipped = universe.skipped().len(),
        dropped_bars,
        dir = %dir.display(),
        "loaded universe"
    );
    Ok(universe)
}

/// Symbols with a `.csv` file in `dir`, sorted.
pub fn discover_symbols(dir: &Path) -> Result<Vec<String>, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut symbols: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect();
    symbols.sort();
    Ok(symbols)
}

/// Read one symbol's bars. Rows that fail to parse are dropped and logged.
pub fn load_symbol_csv(path: &Path, symbol: &str) -> Result<Vec<Bar>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    // Short or long rows reach `parse_row` and fail there, one date at a time.
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let mut index = [0usize; 6];
    for (slot, column) in index.iter_mut().zip(COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(column))
            .ok_or_else(|| LoadError::MissingColumn {
                path: path.to_path_buf(),
                column,
            })?;
    }

    let mut bars = Vec::new();
    let mut bad_rows = 0usize;
    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(csv_err(e)),
            Err(e) => {
                bad_rows += 1;
                warn!(symbol, row = row + 2, error = %e, "dropping unreadable row");
                continue;
            }
        };
        let field = |i: usize| record.get(index[i]).unwrap_or("");
        match parse_row(symbol, field(0), field(1), field(2), field(3), field(4), field(5)) {
            Some(bar) => bars.push(bar),
            None => {
                bad_rows += 1;
                warn!(symbol, row = row + 2, "dropping unparseable row");
            }
        }
    }
    if bad_rows > 0 {
        warn!(symbol, bad_rows, "rows dropped while loading");
    }
    Ok(bars)
}

fn parse_row(
    symbol: &str,
    date: &str,
    open: &str,
    high: &str,
    low: &str,
    close: &str,
    volume: &str,
) -> Option<Bar> {
    // Accept "2024-01-02" and "2024-01-02 00:00:00".
    let date = NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d").ok()?;
    let volume: f64 = volume.parse().ok()?;
    if !(volume.is_finite() && volume >= 0.0) {
        return None;
    }
    Some(Bar {
        symbol: symbol.to_string(),
        date,
        open: open.parse().ok()?,
        high: high.parse().ok()?,
        low: low.parse().ok()?,
        close: close.parse().ok()?,
        volume: volume.round() as u64,
    })
}

/// Deterministic BLAKE3 hash over every bar, in symbol order.
pub fn dataset_hash(universe: &Universe) -> String {
    let mut hasher = blake3::Hasher::new();
    for series in universe.iter() {
        hasher.update(series.symbol().as_bytes());
        for bar in series.bars() {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
