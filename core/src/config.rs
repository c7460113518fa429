use crate::{
    county::{DEFAULT_CHUNK_SIZE, DEFAULT_COUNTY_COUNT},
    demographic::Demographic,
    error::{SummaryError, SummaryResult},
    loader::DEFAULT_WORKERS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a run needs. Passed into the pipeline at construction;
/// nothing is read from globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Directory of MSM count draw files.
    pub msm_dir:          PathBuf,
    /// Directory of male population draw files.
    pub male_dir:         PathBuf,
    /// Geographic reference CSV (FIPS, ST_ABBREV).
    pub geoid_path:       PathBuf,
    pub output_dir:       PathBuf,
    pub n_counties:       u32,
    pub chunk_size:       u32,
    pub workers:          usize,
    /// Draws every (category, county) cell should hold. When unset the
    /// most common count in each slice is used.
    pub draws_per_region: Option<usize>,
    /// Run the no-demographic summaries.
    pub aggregate:        bool,
    pub demographics:     Vec<Demographic>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            msm_dir:          PathBuf::from("msm_draws"),
            male_dir:         PathBuf::from("male_draws"),
            geoid_path:       PathBuf::from("GEOID.csv"),
            output_dir:       PathBuf::from("outputs"),
            n_counties:       DEFAULT_COUNTY_COUNT,
            chunk_size:       DEFAULT_CHUNK_SIZE,
            workers:          DEFAULT_WORKERS,
            draws_per_region: None,
            aggregate:        true,
            demographics:     Demographic::ALL.to_vec(),
        }
    }
}

impl SummaryConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> SummaryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SummaryError::Configuration(format!("Cannot read {}: {e}", path.display()))
        })?;
        let config: SummaryConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Small domain rooted at `dir`, for tests.
    pub fn default_test(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            msm_dir:          dir.join("msm_draws"),
            male_dir:         dir.join("male_draws"),
            geoid_path:       dir.join("GEOID.csv"),
            output_dir:       dir.join("outputs"),
            n_counties:       6,
            chunk_size:       4,
            workers:          2,
            draws_per_region: None,
            aggregate:        true,
            demographics:     vec![Demographic::Age],
        }
    }

    pub fn validate(&self) -> SummaryResult<()> {
        if self.n_counties == 0 {
            return Err(SummaryError::Configuration("n_counties must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(SummaryError::Configuration("chunk_size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(SummaryError::Configuration("workers must be at least 1".into()));
        }
        if self.draws_per_region == Some(0) {
            return Err(SummaryError::Configuration("draws_per_region must be at least 1".into()));
        }
        Ok(())
    }
}
