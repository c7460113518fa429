//! County-level summaries over the county domain, one chunk at a time.
//!
//! The domain [1, N] is cut into contiguous ranges of `chunk_size`
//! counties. For each range, in order:
//!   1. Load the range's numerator rows from every file (parallel reads,
//!      concatenated in file order).
//!   2. Clamp negatives and renumber draws per (category, county).
//!   3. Summarize each (category, county) cell.
//!   4. Load and renumber the denominator rows for the same range.
//!   5. Inner-join on (category, county, draw), divide, and summarize
//!      each (county, category) rate.
//!
//! Only one range's rows are resident at a time.

use crate::{
    demographic::{DatasetKind, Demographic},
    error::{SummaryError, SummaryResult},
    geo::GeoMapper,
    loader::DrawLoader,
    quality::QualityReport,
    summary::{summarize_groups, GroupKey, SummaryRow},
    table::{RegionSet, SimulationTable},
    types::{Category, CountyIndex},
};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_COUNTY_COUNT: u32 = 3144;
pub const DEFAULT_CHUNK_SIZE: u32 = 100;

/// Contiguous inclusive ranges covering [1, n_counties].
pub fn partition(n_counties: u32, chunk_size: u32) -> Vec<RegionSet> {
    if chunk_size == 0 {
        return Vec::new();
    }
    (1..=n_counties)
        .step_by(chunk_size as usize)
        .map(|start| RegionSet::Range {
            start,
            end: start.saturating_add(chunk_size - 1).min(n_counties),
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct CountyAggregation {
    /// Ordered by range, then (category, county).
    pub summaries:      Vec<SummaryRow>,
    /// Ordered by range, then (county, category).
    pub rate_summaries: Vec<SummaryRow>,
    pub quality:        QualityReport,
}

pub struct ChunkedCountyAggregator<'a> {
    loader:         &'a DrawLoader,
    demographic:    Option<Demographic>,
    n_counties:     u32,
    chunk_size:     u32,
    expected_draws: Option<usize>,
    geo:            Option<&'a GeoMapper>,
}

impl<'a> ChunkedCountyAggregator<'a> {
    pub fn new(
        loader: &'a DrawLoader,
        demographic: Option<Demographic>,
        n_counties: u32,
        chunk_size: u32,
    ) -> SummaryResult<Self> {
        if chunk_size == 0 {
            return Err(SummaryError::Configuration("chunk_size must be at least 1".to_string()));
        }
        Ok(Self {
            loader,
            demographic,
            n_counties,
            chunk_size,
            expected_draws: None,
            geo: None,
        })
    }

    /// Check every summarized county against the reference table.
    pub fn with_geo(mut self, geo: &'a GeoMapper) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn with_expected_draws(mut self, draws: Option<usize>) -> Self {
        self.expected_draws = draws;
        self
    }

    pub fn ranges(&self) -> Vec<RegionSet> {
        partition(self.n_counties, self.chunk_size)
    }

    pub fn run(
        &self,
        numerator: &[PathBuf],
        denominator: Option<&[PathBuf]>,
    ) -> SummaryResult<CountyAggregation> {
        let mut out = CountyAggregation::default();
        let ranges = self.ranges();
        let total = ranges.len();

        for (i, range) in ranges.iter().enumerate() {
            log::info!("[{}/{total}] {} '{}'", i + 1, range.describe(), self.label());

            let numerator_table = self.load(numerator, DatasetKind::Numerator, range, &mut out.quality);
            if numerator_table.is_empty() {
                log::warn!("{}: no numerator rows in any file; range skipped", range.describe());
                out.quality.skipped_ranges += 1;
                continue;
            }
            self.check_mapping(&numerator_table)?;

            out.summaries.extend(summarize_groups(
                numerator_table
                    .values_by_cell()
                    .into_iter()
                    .map(|((category, county), draws)| (cell_key(county, category), draws)),
            ));

            let Some(paths) = denominator else { continue };
            let denominator_table = self.load(paths, DatasetKind::Denominator, range, &mut out.quality);
            if denominator_table.is_empty() {
                log::warn!("{}: no denominator rows in any file; no rates", range.describe());
                continue;
            }
            self.check_mapping(&denominator_table)?;
            let rates = self.join_rates(&numerator_table, &denominator_table, range, &mut out.quality);
            out.rate_summaries.extend(summarize_groups(
                rates
                    .into_iter()
                    .map(|((county, category), draws)| (cell_key(county, category), draws)),
            ));
        }
        Ok(out)
    }

    fn load(
        &self,
        paths: &[PathBuf],
        kind: DatasetKind,
        range: &RegionSet,
        quality: &mut QualityReport,
    ) -> SimulationTable {
        let (mut table, failed) = self.loader.load_long(paths, kind, self.demographic, range);
        quality.failed_reads += failed;
        if table.is_empty() {
            return table;
        }
        quality.clamped_values += table.clamp_negative();
        table.reassign_draw_indices();

        let irregular = table.irregular_cells(self.expected_draws);
        if irregular > 0 {
            log::warn!(
                "{}: {irregular} {} cells with an irregular number of draws",
                range.describe(),
                kind.label()
            );
            quality.irregular_cells += irregular;
        }
        table
    }

    /// Per-draw rates keyed by (county, category). Draws present on
    /// only one side are dropped and counted.
    fn join_rates(
        &self,
        numerator: &SimulationTable,
        denominator: &SimulationTable,
        range: &RegionSet,
        quality: &mut QualityReport,
    ) -> BTreeMap<(CountyIndex, Option<Category>), Vec<f64>> {
        let population = denominator.index_by_draw();
        let mut rates: BTreeMap<(CountyIndex, Option<Category>), Vec<f64>> = BTreeMap::new();
        let mut matched = 0;
        let mut non_finite = 0;

        for row in numerator.rows() {
            let Some(pop) = population.get(&(row.category.clone(), row.county, row.draw)) else {
                continue;
            };
            matched += 1;
            let rate = row.value / pop;
            if !rate.is_finite() {
                non_finite += 1;
            }
            rates
                .entry((row.county, row.category.clone()))
                .or_default()
                .push(rate);
        }

        let unmatched_num = numerator.len() - matched;
        let unmatched_den = population.len() - matched;
        if unmatched_num > 0 || unmatched_den > 0 {
            log::warn!(
                "{}: rate join dropped {unmatched_num} numerator and {unmatched_den} denominator draws",
                range.describe()
            );
        }
        if non_finite > 0 {
            log::warn!("{}: {non_finite} rates are not finite", range.describe());
        }
        quality.unmatched_numerator += unmatched_num;
        quality.unmatched_denominator += unmatched_den;
        quality.non_finite_rates += non_finite;
        rates
    }

    fn check_mapping(&self, table: &SimulationTable) -> SummaryResult<()> {
        let Some(geo) = self.geo else { return Ok(()) };
        for (_, county) in table.draw_counts().keys() {
            geo.state_of(*county)?;
        }
        Ok(())
    }

    fn label(&self) -> &'static str {
        self.demographic.map(|d| d.name()).unwrap_or("all")
    }
}

fn cell_key(county: CountyIndex, category: Option<Category>) -> GroupKey {
    let key = GroupKey::county(county);
    match category {
        Some(c) => key.with_demographic(c),
        None    => key,
    }
}
