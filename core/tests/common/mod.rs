//! Shared fixtures: scratch directories and CSV draw files.
#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::path::{Path, PathBuf};

/// A unique scratch directory, removed on drop.
pub struct Scratch {
    pub path: PathBuf,
}

impl Scratch {
    pub fn new(name: &str) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let path = std::env::temp_dir().join(format!("drawsum-{name}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).expect("create scratch dir");
        Self { path }
    }

    pub fn join(&self, file: &str) -> PathBuf {
        self.path.join(file)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// One long-form row: (category, county, sim_index, value).
pub type LongRow = (&'static str, u32, u32, f64);

pub fn write_geo(path: &Path, rows: &[(&str, &str)]) {
    let mut body = String::from("FIPS,NAME,ST_ABBREV\n");
    for (fips, state) in rows {
        body.push_str(&format!("{fips},County {fips},{state}\n"));
    }
    std::fs::write(path, body).expect("write geo");
}

pub fn write_long(path: &Path, demo_column: &str, value_column: &str, rows: &[LongRow]) {
    let mut body = format!("{demo_column},county_index,sim_index,{value_column}\n");
    for (cat, county, draw, value) in rows {
        body.push_str(&format!("{cat},{county},{draw},{value}\n"));
    }
    std::fs::write(path, body).expect("write long draws");
}

pub fn write_wide(path: &Path, rows: &[Vec<f64>]) {
    let draws = rows.first().map(Vec::len).unwrap_or(0);
    let header: Vec<String> = (1..=draws).map(|d| format!("sim_{d}")).collect();
    let mut body = header.join(",");
    body.push('\n');
    for row in rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        body.push_str(&cells.join(","));
        body.push('\n');
    }
    std::fs::write(path, body).expect("write wide draws");
}

/// Random block files: `blocks` files, each with `draws` draws for every
/// (county, category). Draw numbers restart at 1 in every file, as the
/// real block exports do. Values are non-negative integers.
pub fn random_blocks(
    seed: u64,
    counties: u32,
    categories: &[&'static str],
    blocks: usize,
    draws: u32,
    max_value: u32,
) -> Vec<Vec<LongRow>> {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    (0..blocks)
        .map(|_| {
            let mut rows = Vec::new();
            for county in 1..=counties {
                for cat in categories {
                    for draw in 1..=draws {
                        let value = rng.gen_range(1..=max_value) as f64;
                        rows.push((*cat, county, draw, value));
                    }
                }
            }
            rows
        })
        .collect()
}

/// Write each block to `dir/<prefix><i>.csv` and return the paths in order.
pub fn write_blocks(
    dir: &Path,
    prefix: &str,
    demo_column: &str,
    value_column: &str,
    blocks: &[Vec<LongRow>],
) -> Vec<PathBuf> {
    blocks
        .iter()
        .enumerate()
        .map(|(i, rows)| {
            let path = dir.join(format!("{prefix}{}.csv", i + 1));
            write_long(&path, demo_column, value_column, rows);
            path
        })
        .collect()
}

pub fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "{what}: expected {expected}, got {actual}"
    );
}
