//! CSV summaries and the JSON run manifest.

use crate::{
    config::SummaryConfig,
    demographic::Demographic,
    error::SummaryResult,
    quality::QualityReport,
    summary::SummaryRow,
    types::RunId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_FILE: &str = "run_manifest.json";

/// Which key columns a summary file carries, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColumns {
    pub county:      bool,
    pub state:       bool,
    pub demographic: Option<Demographic>,
}

impl KeyColumns {
    pub fn county(demographic: Option<Demographic>) -> Self {
        Self { county: true, state: false, demographic }
    }

    pub fn state(demographic: Option<Demographic>) -> Self {
        Self { county: false, state: true, demographic }
    }

    fn headers(&self) -> Vec<&'static str> {
        let mut headers = Vec::new();
        if self.county {
            headers.push("county_index");
        }
        if self.state {
            headers.push("state");
        }
        if let Some(demo) = self.demographic {
            headers.push(demo.name());
        }
        headers.extend(["mean", "median", "2.5%", "97.5%"]);
        headers
    }
}

/// Write one summary collection. Returns the number of data rows.
pub fn write_summary_csv(path: &Path, columns: KeyColumns, rows: &[SummaryRow]) -> SummaryResult<usize> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(columns.headers())?;
    for row in rows {
        let mut record: Vec<String> = Vec::with_capacity(7);
        if columns.county {
            record.push(row.key.county.map(|c| c.to_string()).unwrap_or_default());
        }
        if columns.state {
            record.push(row.key.state.clone().unwrap_or_default());
        }
        if columns.demographic.is_some() {
            record.push(row.key.demographic.clone().unwrap_or_default());
        }
        let s = &row.stats;
        record.extend([s.mean, s.median, s.q025, s.q975].map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub file: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id:      RunId,
    pub started_at:  DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub version:     String,
    pub config:      SummaryConfig,
    pub outputs:     Vec<OutputRecord>,
    pub quality:     QualityReport,
}

impl RunManifest {
    pub fn start(config: &SummaryConfig) -> Self {
        Self {
            run_id:      uuid::Uuid::new_v4().to_string(),
            started_at:  Utc::now(),
            finished_at: None,
            version:     env!("CARGO_PKG_VERSION").to_string(),
            config:      config.clone(),
            outputs:     Vec::new(),
            quality:     QualityReport::default(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn write(&self, dir: &Path) -> SummaryResult<()> {
        let path = dir.join(MANIFEST_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        log::info!("Run manifest written to {}", path.display());
        Ok(())
    }
}
