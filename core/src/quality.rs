//! Data-quality counters accumulated over a run.
//!
//! None of these conditions abort the run. They are logged where they
//! occur and totalled here so the manifest records what was tolerated.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Files that could not be read and counted as empty.
    pub failed_reads:          usize,
    /// Negative values replaced with zero.
    pub clamped_values:        usize,
    /// County ranges with no numerator rows in any file.
    pub skipped_ranges:        usize,
    /// States with no numerator rows in any file.
    pub skipped_states:        usize,
    /// (category, county) cells whose draw count differs from the rest.
    pub irregular_cells:       usize,
    /// Numerator draws with no denominator partner in the rate join.
    pub unmatched_numerator:   usize,
    /// Denominator draws with no numerator partner in the rate join.
    pub unmatched_denominator: usize,
    /// Rates that came out infinite or NaN.
    pub non_finite_rates:      usize,
}

impl QualityReport {
    pub fn merge(&mut self, other: &QualityReport) {
        self.failed_reads          += other.failed_reads;
        self.clamped_values        += other.clamped_values;
        self.skipped_ranges        += other.skipped_ranges;
        self.skipped_states        += other.skipped_states;
        self.irregular_cells       += other.irregular_cells;
        self.unmatched_numerator   += other.unmatched_numerator;
        self.unmatched_denominator += other.unmatched_denominator;
        self.non_finite_rates      += other.non_finite_rates;
    }

    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}
