//! One summary run, end to end.
//!
//! EXECUTION ORDER (fixed):
//!   1. Aggregate mode: county, county rate, state, state rate.
//!   2. For each configured demographic: county and county rate
//!      (chunked), state, state rate.
//!   3. Run manifest.
//!
//! RULES:
//!   - The reference mapping and reader pool are built once per run.
//!   - Summaries are written as soon as each step finishes.
//!   - Missing input files skip a step with a warning; alignment and
//!     mapping errors abort the run.

use crate::{
    config::SummaryConfig,
    county::ChunkedCountyAggregator,
    demographic::{DatasetKind, Demographic},
    error::SummaryResult,
    geo::GeoMapper,
    loader::{discover, DrawLoader},
    matrix::SimMatrix,
    output::{write_summary_csv, KeyColumns, OutputRecord, RunManifest},
    quality::QualityReport,
    rate::RateCombiner,
    state::StateAggregator,
    summary::SummaryRow,
};
use std::path::PathBuf;

/// Summaries of one mode. Rate collections are empty when no
/// denominator files were found.
#[derive(Debug, Default)]
pub struct ModeSummaries {
    pub county:       Vec<SummaryRow>,
    pub county_rate:  Vec<SummaryRow>,
    pub state:        Vec<SummaryRow>,
    pub state_rate:   Vec<SummaryRow>,
    pub quality:      QualityReport,
}

pub struct SummaryPipeline {
    pub config: SummaryConfig,
    pub geo:    GeoMapper,
    loader:     DrawLoader,
}

impl SummaryPipeline {
    /// Validate the config, load the reference mapping, build the pool.
    pub fn build(config: SummaryConfig) -> SummaryResult<Self> {
        config.validate()?;
        let geo = GeoMapper::load(&config.geoid_path)?;
        if geo.county_count() < config.n_counties as usize {
            log::warn!(
                "Reference has {} counties but n_counties is {}",
                geo.county_count(),
                config.n_counties
            );
        }
        Self::with_geo(config, geo)
    }

    /// Build around an already constructed mapping.
    pub fn with_geo(config: SummaryConfig, geo: GeoMapper) -> SummaryResult<Self> {
        let loader = DrawLoader::new(config.workers)?;
        log::info!(
            "Pipeline ready: {} counties in {} states, {} reader threads",
            geo.county_count(),
            geo.states().count(),
            loader.workers()
        );
        Ok(Self { config, geo, loader })
    }

    /// Run every configured step and write all outputs.
    pub fn run(&self) -> SummaryResult<RunManifest> {
        let mut manifest = RunManifest::start(&self.config);
        std::fs::create_dir_all(&self.config.output_dir)?;
        log::info!("Run {} writing to {}", manifest.run_id, self.config.output_dir.display());

        if self.config.aggregate {
            let summaries = self.aggregate_summaries()?;
            self.write_mode(&mut manifest, None, &summaries)?;
        }
        for demo in &self.config.demographics {
            let summaries = self.demographic_summaries(*demo)?;
            self.write_mode(&mut manifest, Some(*demo), &summaries)?;
        }

        manifest.finish();
        manifest.write(&self.config.output_dir)?;
        if !manifest.quality.is_clean() {
            log::warn!("Data-quality issues tolerated: {:?}", manifest.quality);
        }
        Ok(manifest)
    }

    /// No-demographic summaries from the wide `msm_blk_*` / `male_blk_*`
    /// matrices.
    pub fn aggregate_summaries(&self) -> SummaryResult<ModeSummaries> {
        let mut out = ModeSummaries::default();
        let Some(numerator) = self.load_matrix(DatasetKind::Numerator, &mut out.quality)? else {
            log::warn!("No aggregate numerator draws found; aggregate summaries skipped");
            return Ok(out);
        };

        out.county = numerator.summarize_rows();
        let numerator_sums = numerator.state_sums(&self.geo)?;
        out.state = numerator_sums.iter().flat_map(|s| s.summarize()).collect();

        let Some(denominator) = self.load_matrix(DatasetKind::Denominator, &mut out.quality)? else {
            log::warn!("No aggregate denominator draws found; rates skipped");
            return Ok(out);
        };
        let (rates, non_finite) = numerator.rate(&denominator)?;
        out.quality.non_finite_rates += non_finite;
        out.county_rate = rates.summarize_rows();

        let denominator_sums = denominator.state_sums(&self.geo)?;
        let (state_rate, non_finite) =
            RateCombiner::new("msm/male state").combine(&numerator_sums, &denominator_sums)?;
        out.quality.non_finite_rates += non_finite;
        out.state_rate = state_rate;
        Ok(out)
    }

    /// Summaries stratified by `demo` from the long `adj_*` files.
    pub fn demographic_summaries(&self, demo: Demographic) -> SummaryResult<ModeSummaries> {
        let mut out = ModeSummaries::default();
        let numerator = self.discover(DatasetKind::Numerator, Some(demo))?;
        if numerator.is_empty() {
            log::warn!("No '{demo}' numerator files found; '{demo}' summaries skipped");
            return Ok(out);
        }
        let denominator = self.discover(DatasetKind::Denominator, Some(demo))?;
        let denominator = (!denominator.is_empty()).then_some(denominator.as_slice());

        let county = ChunkedCountyAggregator::new(
            &self.loader,
            Some(demo),
            self.config.n_counties,
            self.config.chunk_size,
        )?
        .with_geo(&self.geo)
        .with_expected_draws(self.config.draws_per_region)
        .run(&numerator, denominator)?;
        out.county = county.summaries;
        out.county_rate = county.rate_summaries;
        out.quality.merge(&county.quality);

        let state = StateAggregator::new(&self.loader, &self.geo, Some(demo))
            .with_expected_draws(self.config.draws_per_region)
            .run(&numerator, denominator)?;
        out.state = state.summaries;
        out.quality.merge(&state.quality);

        if denominator.is_some() {
            let (state_rate, non_finite) = RateCombiner::new(format!("msm/male {demo}"))
                .combine(&state.numerator_sums, &state.denominator_sums)?;
            out.quality.non_finite_rates += non_finite;
            out.state_rate = state_rate;
        }
        Ok(out)
    }

    fn discover(&self, kind: DatasetKind, demo: Option<Demographic>) -> SummaryResult<Vec<PathBuf>> {
        let dir = match kind {
            DatasetKind::Numerator   => &self.config.msm_dir,
            DatasetKind::Denominator => &self.config.male_dir,
        };
        let prefix = match demo {
            Some(demo) => kind.demographic_prefix(demo),
            None       => kind.aggregate_prefix(),
        };
        discover(dir, &prefix)
    }

    fn load_matrix(&self, kind: DatasetKind, quality: &mut QualityReport) -> SummaryResult<Option<SimMatrix>> {
        let paths = self.discover(kind, None)?;
        let outcome = self.loader.load_wide(&paths, Some(self.geo.county_count()));
        quality.failed_reads += outcome.failed_reads;
        if outcome.parts.is_empty() {
            return Ok(None);
        }
        let mut matrix = SimMatrix::hconcat(outcome.parts);
        quality.clamped_values += matrix.clamp_negative();
        log::info!(
            "{} aggregate draws: {} counties x {} draws",
            kind.label(),
            matrix.n_rows(),
            matrix.n_draws()
        );
        Ok(Some(matrix))
    }

    fn write_mode(
        &self,
        manifest: &mut RunManifest,
        demo: Option<Demographic>,
        summaries: &ModeSummaries,
    ) -> SummaryResult<()> {
        let suffix = demo.map(|d| format!("_{d}")).unwrap_or_default();
        let files = [
            (format!("msm_county{suffix}_summary.csv"), KeyColumns::county(demo), &summaries.county),
            (format!("msm_rate_county{suffix}_summary.csv"), KeyColumns::county(demo), &summaries.county_rate),
            (format!("msm_state{suffix}_summary.csv"), KeyColumns::state(demo), &summaries.state),
            (format!("msm_rate_state{suffix}_summary.csv"), KeyColumns::state(demo), &summaries.state_rate),
        ];
        for (file, columns, rows) in files {
            if rows.is_empty() {
                continue;
            }
            let path = self.config.output_dir.join(&file);
            let rows = write_summary_csv(&path, columns, rows)?;
            manifest.outputs.push(OutputRecord { file, rows });
        }
        manifest.quality.merge(&summaries.quality);
        Ok(())
    }
}
