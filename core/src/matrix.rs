//! Wide draw matrices for the no-demographic summaries.
//!
//! Rows are counties in county_index order, columns are draws. Block
//! files each carry a slice of the draws and are joined side by side.

use crate::{
    error::{SummaryError, SummaryResult},
    geo::GeoMapper,
    state::StateSums,
    summary::{summarize_groups, GroupKey, SummaryRow},
    types::{CountyIndex, StateAbbrev},
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimMatrix {
    rows: Vec<Vec<f64>>,
}

impl SimMatrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// Join blocks along the draw axis. All blocks must have the same
    /// number of counties; the loader rejects those that do not.
    pub fn hconcat(blocks: Vec<SimMatrix>) -> Self {
        let n_rows = blocks.first().map(Self::n_rows).unwrap_or(0);
        let mut rows: Vec<Vec<f64>> = vec![Vec::new(); n_rows];
        for block in blocks {
            for (acc, part) in rows.iter_mut().zip(block.rows) {
                acc.extend(part);
            }
        }
        Self { rows }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_draws(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn row(&self, county: CountyIndex) -> Option<&[f64]> {
        (county as usize)
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .map(Vec::as_slice)
    }

    pub fn clamp_negative(&mut self) -> usize {
        let mut clamped = 0;
        for v in self.rows.iter_mut().flatten().filter(|v| **v < 0.0) {
            *v = 0.0;
            clamped += 1;
        }
        clamped
    }

    /// One summary per county.
    pub fn summarize_rows(&self) -> Vec<SummaryRow> {
        summarize_groups(
            self.rows
                .iter()
                .enumerate()
                .map(|(i, draws)| (GroupKey::county((i + 1) as CountyIndex), draws.clone())),
        )
    }

    /// Element-wise `self / denominator`. Shapes must match exactly.
    /// Returns the rate matrix and how many rates are not finite.
    pub fn rate(&self, denominator: &SimMatrix) -> SummaryResult<(SimMatrix, usize)> {
        if self.n_rows() != denominator.n_rows() || self.n_draws() != denominator.n_draws() {
            return Err(SummaryError::Alignment {
                dataset:     "county rate".to_string(),
                state:       "-".to_string(),
                demographic: "-".to_string(),
                details:     format!(
                    "numerator is {}x{}, denominator is {}x{}",
                    self.n_rows(),
                    self.n_draws(),
                    denominator.n_rows(),
                    denominator.n_draws()
                ),
            });
        }
        let mut non_finite = 0;
        let rows: Vec<Vec<f64>> = self
            .rows
            .iter()
            .zip(&denominator.rows)
            .map(|(num, den)| {
                num.iter()
                    .zip(den)
                    .map(|(n, d)| {
                        let r = n / d;
                        if !r.is_finite() {
                            non_finite += 1;
                        }
                        r
                    })
                    .collect()
            })
            .collect();
        Ok((Self { rows }, non_finite))
    }

    /// Per-state draw sums over member counties, NaN skipped. Every row
    /// must belong to a county of the reference table.
    pub fn state_sums(&self, geo: &GeoMapper) -> SummaryResult<Vec<StateSums>> {
        let mut totals: BTreeMap<StateAbbrev, Vec<f64>> = BTreeMap::new();
        for (i, draws) in self.rows.iter().enumerate() {
            let state = geo.state_of((i + 1) as CountyIndex)?;
            let acc = totals
                .entry(state.to_string())
                .or_insert_with(|| vec![0.0; self.n_draws()]);
            for (sum, v) in acc.iter_mut().zip(draws) {
                if !v.is_nan() {
                    *sum += v;
                }
            }
        }
        Ok(totals
            .into_iter()
            .map(|(state, draws)| StateSums::single(state, draws))
            .collect())
    }
}
