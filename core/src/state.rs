//! State-level aggregation of long-form draws.
//!
//! For every state, in lexicographic order:
//!   1. Load the member counties' rows from every numerator file.
//!   2. Clamp negatives, renumber draws over (members x category).
//!   3. Sum across member counties per (category, draw).
//!   4. Summarize each category over the draw dimension.
//!   5. Keep the per-draw sums for the rate step.
//!   6. Repeat 1-3 for the denominator files.
//!
//! Only one state's rows are resident at a time.

use crate::{
    demographic::{DatasetKind, Demographic},
    error::SummaryResult,
    geo::GeoMapper,
    loader::DrawLoader,
    quality::QualityReport,
    summary::{summarize_groups, GroupKey, SummaryRow},
    table::{RegionSet, SimulationTable},
    types::{Category, StateAbbrev},
};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Per-draw totals of one state. `per_category[c][d - 1]` is the state
/// total of category `c` in draw `d`; the no-demographic mode uses the
/// single key `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSums {
    pub state:        StateAbbrev,
    pub per_category: BTreeMap<Option<Category>, Vec<f64>>,
}

impl StateSums {
    pub fn single(state: impl Into<StateAbbrev>, draws: Vec<f64>) -> Self {
        Self {
            state:        state.into(),
            per_category: BTreeMap::from([(None, draws)]),
        }
    }

    /// One summary per category, keyed by state (and category when present).
    pub fn summarize(&self) -> Vec<SummaryRow> {
        summarize_groups(self.per_category.iter().map(|(category, draws)| {
            let key = GroupKey::state(self.state.clone());
            let key = match category {
                Some(c) => key.with_demographic(c.clone()),
                None    => key,
            };
            (key, draws.clone())
        }))
    }
}

#[derive(Debug, Default)]
pub struct StateAggregation {
    pub summaries:        Vec<SummaryRow>,
    pub numerator_sums:   Vec<StateSums>,
    pub denominator_sums: Vec<StateSums>,
    pub quality:          QualityReport,
}

pub struct StateAggregator<'a> {
    loader:         &'a DrawLoader,
    geo:            &'a GeoMapper,
    demographic:    Option<Demographic>,
    expected_draws: Option<usize>,
}

impl<'a> StateAggregator<'a> {
    pub fn new(loader: &'a DrawLoader, geo: &'a GeoMapper, demographic: Option<Demographic>) -> Self {
        Self { loader, geo, demographic, expected_draws: None }
    }

    /// Draws every (category, county) cell should carry. Cells that
    /// differ are counted as irregular.
    pub fn with_expected_draws(mut self, draws: Option<usize>) -> Self {
        self.expected_draws = draws;
        self
    }

    pub fn run(
        &self,
        numerator: &[PathBuf],
        denominator: Option<&[PathBuf]>,
    ) -> SummaryResult<StateAggregation> {
        let mut out = StateAggregation::default();
        let label = self.label();

        for state in self.geo.states() {
            let region = RegionSet::Members(self.geo.counties_of(state)?.clone());
            log::info!("Processing state {state} for '{label}' ({})", region.describe());

            let loaded =
                self.load_sums(numerator, DatasetKind::Numerator, state, &region, &mut out.quality);
            let Some(sums) = loaded else {
                log::warn!("State {state}: no {label} rows in any numerator file; skipped");
                out.quality.skipped_states += 1;
                continue;
            };
            out.summaries.extend(sums.summarize());
            out.numerator_sums.push(sums);

            if let Some(paths) = denominator {
                match self.load_sums(paths, DatasetKind::Denominator, state, &region, &mut out.quality) {
                    Some(sums) => out.denominator_sums.push(sums),
                    None => log::warn!("State {state}: no {label} rows in any denominator file"),
                }
            }
        }
        Ok(out)
    }

    fn load_sums(
        &self,
        paths: &[PathBuf],
        kind: DatasetKind,
        state: &str,
        region: &RegionSet,
        quality: &mut QualityReport,
    ) -> Option<StateSums> {
        let (mut table, failed) = self.loader.load_long(paths, kind, self.demographic, region);
        quality.failed_reads += failed;
        if table.is_empty() {
            return None;
        }
        quality.clamped_values += table.clamp_negative();
        table.reassign_draw_indices();
        quality.irregular_cells += self.check_density(&table, kind, state);

        Some(StateSums {
            state:        state.to_string(),
            per_category: table.sum_by_category_draw(),
        })
    }

    fn check_density(&self, table: &SimulationTable, kind: DatasetKind, state: &str) -> usize {
        let irregular = table.irregular_cells(self.expected_draws);
        if irregular > 0 {
            log::warn!(
                "State {state}: {irregular} {} cells with an irregular number of draws",
                kind.label()
            );
        }
        irregular
    }

    fn label(&self) -> &'static str {
        self.demographic.map(|d| d.name()).unwrap_or("all")
    }
}
