//! Draw file discovery and bounded parallel reads.
//!
//! RULE: One bad file never aborts an aggregation. Every read failure
//! is logged with the file path and becomes an empty contribution.
//!
//! Reads run on a fixed-size rayon pool owned by the loader. Results
//! are collected in input (file) order, not completion order, because
//! draw renumbering downstream depends on row order.

use crate::{
    demographic::{DatasetKind, Demographic, COUNTY_COLUMN, DRAW_COLUMN},
    error::{SummaryError, SummaryResult},
    matrix::SimMatrix,
    table::{RegionSet, SimulationDrawRow, SimulationTable},
    types::{CountyIndex, DrawIndex},
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_WORKERS: usize = 8;

/// Result of loading one dataset slice from many files.
#[derive(Debug, Default)]
pub struct LoadOutcome<T> {
    /// Per-file contributions in file order. Failed files are absent.
    pub parts:        Vec<T>,
    pub failed_reads: usize,
}

pub struct DrawLoader {
    pool: rayon::ThreadPool,
}

impl DrawLoader {
    pub fn new(workers: usize) -> SummaryResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("draw-reader-{i}"))
            .build()
            .map_err(|e| SummaryError::Configuration(format!("cannot build reader pool: {e}")))?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Long-form rows of `kind` restricted to `region`, concatenated in
    /// file order.
    pub fn load_long(
        &self,
        paths: &[PathBuf],
        kind: DatasetKind,
        demo: Option<Demographic>,
        region: &RegionSet,
    ) -> (SimulationTable, usize) {
        let outcome = self.read_all(paths, |path| read_long_file(path, kind, demo, region));
        (SimulationTable::concat(outcome.parts), outcome.failed_reads)
    }

    /// Wide draw matrices, one per readable file. Files whose county
    /// count differs from `expected_rows` are rejected; without it, the
    /// most common count across the readable files is taken.
    pub fn load_wide(&self, paths: &[PathBuf], expected_rows: Option<usize>) -> LoadOutcome<SimMatrix> {
        let mut outcome = self.read_all(paths, read_wide_file);
        let Some(rows) = expected_rows.or_else(|| most_common_rows(&outcome.parts)) else {
            return outcome;
        };
        let before = outcome.parts.len();
        outcome.parts.retain(|m| {
            if m.n_rows() != rows {
                log::warn!(
                    "Dropping draw block with {} counties (expected {rows})",
                    m.n_rows()
                );
            }
            m.n_rows() == rows
        });
        outcome.failed_reads += before - outcome.parts.len();
        outcome
    }

    fn read_all<T, F>(&self, paths: &[PathBuf], read: F) -> LoadOutcome<T>
    where
        T: Send,
        F: Fn(&Path) -> SummaryResult<T> + Sync,
    {
        let results: Vec<SummaryResult<T>> = self
            .pool
            .install(|| paths.par_iter().map(|p| read(p.as_path())).collect());

        let mut outcome = LoadOutcome { parts: Vec::with_capacity(results.len()), failed_reads: 0 };
        for result in results {
            match result {
                Ok(part) => outcome.parts.push(part),
                Err(e) => {
                    log::warn!("{e}; treating as empty");
                    outcome.failed_reads += 1;
                }
            }
        }
        outcome
    }
}

/// Modal row count; ties go to the larger count.
fn most_common_rows(blocks: &[SimMatrix]) -> Option<usize> {
    let mut freq: BTreeMap<usize, usize> = BTreeMap::new();
    for block in blocks {
        *freq.entry(block.n_rows()).or_insert(0) += 1;
    }
    freq.into_iter().max_by_key(|(_, f)| *f).map(|(rows, _)| rows)
}

/// Files in `dir` whose name starts with `prefix`, sorted by name.
pub fn discover(dir: impl AsRef<Path>, prefix: &str) -> SummaryResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        log::warn!("Draw directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".csv"));
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    log::info!("{} files matching {prefix}* in {}", paths.len(), dir.display());
    Ok(paths)
}

fn file_error(path: &Path, reason: impl Into<String>) -> SummaryError {
    SummaryError::FileRead { path: path.display().to_string(), reason: reason.into() }
}

fn parse_index(path: &Path, column: &str, raw: &str) -> SummaryResult<u32> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<u32>() {
        return Ok(v);
    }
    // Integer columns sometimes arrive as floats ("12.0").
    match raw.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v >= 0.0 && v <= u32::MAX as f64 => Ok(v as u32),
        _ => Err(file_error(path, format!("bad {column} value '{raw}'"))),
    }
}

fn parse_value(path: &Path, column: &str, raw: &str) -> SummaryResult<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|_| file_error(path, format!("bad {column} value '{raw}'")))
}

/// Read one long-form file, keeping only rows inside `region`.
pub fn read_long_file(
    path: &Path,
    kind: DatasetKind,
    demo: Option<Demographic>,
    region: &RegionSet,
) -> SummaryResult<SimulationTable> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| file_error(path, e.to_string()))?;
    let headers = rdr.headers().map_err(|e| file_error(path, e.to_string()))?.clone();
    let find = |name: &str| headers.iter().position(|h| h.trim() == name);
    let require = |name: &str| find(name).ok_or_else(|| file_error(path, format!("missing column {name}")));

    let county_at = require(COUNTY_COLUMN)?;
    let draw_at = require(DRAW_COLUMN)?;
    let value_at = require(kind.value_column())?;
    let category_at = match demo {
        Some(demo) => {
            let candidates = kind.demographic_columns(demo);
            let at = candidates.iter().find_map(|c| find(c.as_str())).ok_or_else(|| {
                file_error(path, format!("missing column {}", candidates.join(" or ")))
            })?;
            Some(at)
        }
        None => None,
    };

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| file_error(path, e.to_string()))?;
        let field = |at: usize| record.get(at).unwrap_or_default();

        let county: CountyIndex = parse_index(path, COUNTY_COLUMN, field(county_at))?;
        if !region.contains(county) {
            continue;
        }
        let draw: DrawIndex = parse_index(path, DRAW_COLUMN, field(draw_at))?;
        let value = parse_value(path, kind.value_column(), field(value_at))?;
        let category = category_at.map(|at| field(at).trim().to_string());
        rows.push(SimulationDrawRow { county, category, draw, value });
    }
    log::debug!("{}: {} rows in {}", path.display(), rows.len(), region.describe());
    Ok(SimulationTable::from_rows(rows))
}

/// Read one wide file: one row per county, one column per draw.
/// A `county_index` column, if present, is ignored.
pub fn read_wide_file(path: &Path) -> SummaryResult<SimMatrix> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| file_error(path, e.to_string()))?;
    let headers = rdr.headers().map_err(|e| file_error(path, e.to_string()))?.clone();
    let draw_columns: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.trim() != COUNTY_COLUMN)
        .map(|(i, _)| i)
        .collect();
    if draw_columns.is_empty() {
        return Err(file_error(path, "no draw columns"));
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| file_error(path, e.to_string()))?;
        let row = draw_columns
            .iter()
            .map(|&at| parse_value(path, "draw", record.get(at).unwrap_or_default()))
            .collect::<SummaryResult<Vec<f64>>>()?;
        rows.push(row);
    }
    log::debug!("{}: {} counties x {} draws", path.display(), rows.len(), draw_columns.len());
    Ok(SimMatrix::from_rows(rows))
}
