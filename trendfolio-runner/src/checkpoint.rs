//! Sweep checkpoint: JSONL append-only record of finished units.
//!
//! Each finished `(parameter signature, symbol)` unit is one JSON object per
//! line. On open, the keys already present are loaded so a restarted sweep
//! can skip them. Appends are idempotent: a key that is already recorded is
//! never written twice. Malformed lines (e.g. a write torn by a crash) are
//! skipped on read.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use trendfolio_core::EngineConfig;

use crate::metrics::PerformanceReport;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize checkpoint record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// How a unit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Completed,
    /// Nothing to simulate (e.g. the symbol has no bars in the window).
    Skipped,
    Failed,
}

/// One line of the checkpoint file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub key: String,
    pub run_id: String,
    /// `None` for whole-universe units.
    pub symbol: Option<String>,
    pub status: UnitStatus,
    pub engine: EngineConfig,
    #[serde(default)]
    pub report: Option<PerformanceReport>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Checkpoint key for a unit.
pub fn unit_key(run_id: &str, symbol: Option<&str>) -> String {
    format!("{run_id}:{}", symbol.unwrap_or("*"))
}

/// An open checkpoint file. Safe to share across sweep workers.
pub struct Checkpoint {
    path: PathBuf,
    completed: Mutex<HashSet<String>>,
}

impl Checkpoint {
    /// Open (or prepare to create) the checkpoint at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();
        let keys = read_records(&path)?
            .into_iter()
            .map(|record| record.key)
            .collect();
        Ok(Self {
            path,
            completed: Mutex::new(keys),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys().contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `record` unless its key is already present.
    ///
    /// Returns `Ok(true)` if written, `Ok(false)` if the key was already recorded.
    pub fn append(&self, record: &CheckpointRecord) -> Result<bool, CheckpointError> {
        let json = serde_json::to_string(record)?;

        // The lock also serializes writers, so lines never interleave.
        let mut keys = self.keys();
        if keys.contains(&record.key) {
            return Ok(false);
        }

        let io_err = |source| CheckpointError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        // A crash can leave a torn last line; start a fresh one after it.
        if !ends_with_newline(&mut file).map_err(io_err)? {
            writeln!(file).map_err(io_err)?;
        }
        writeln!(file, "{json}").map_err(io_err)?;
        file.flush().map_err(io_err)?;

        keys.insert(record.key.clone());
        Ok(true)
    }

    /// Every well-formed record currently on disk, in file order.
    pub fn read_all(&self) -> Result<Vec<CheckpointRecord>, CheckpointError> {
        read_records(&self.path)
    }

    // Inserts are single calls, so a poisoned set is still consistent.
    fn keys(&self) -> MutexGuard<'_, HashSet<String>> {
        self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// True for an empty file or one whose last byte is `\n`.
fn ends_with_newline(file: &mut fs::File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn read_records(path: &Path) -> Result<Vec<CheckpointRecord>, CheckpointError> {
    let io_err = |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(e)),
    };

    let mut records = Vec::new();
    let mut malformed = 0usize;
    for line in io::BufReader::new(file).lines() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CheckpointRecord>(&line) {
            Ok(record) => records.push(record),
            Err(_) => malformed += 1,
        }
    }
    if malformed > 0 {
        warn!(path = %path.display(), malformed, "skipped malformed checkpoint lines");
    }
    Ok(records)
}
