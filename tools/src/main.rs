//! drawsum-runner: headless batch runner for draw summaries.
//!
//! Usage:
//!   drawsum-runner --config run.json
//!   drawsum-runner --msm-dir msm_draws --male-dir male_draws \
//!                  --geoid GEOID.csv --out outputs --demo age --demo educ
//!
//! Flags override values from --config. Set RUST_LOG=info for progress.

use anyhow::{Context, Result};
use drawsum_core::{
    config::SummaryConfig, demographic::Demographic, output::RunManifest,
    pipeline::SummaryPipeline,
};
use std::env;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = build_config(&args)?;

    println!("drawsum: population draw summaries");
    println!("  msm_dir:     {}", config.msm_dir.display());
    println!("  male_dir:    {}", config.male_dir.display());
    println!("  geoid:       {}", config.geoid_path.display());
    println!("  output_dir:  {}", config.output_dir.display());
    println!("  counties:    {} (chunks of {})", config.n_counties, config.chunk_size);
    println!("  workers:     {}", config.workers);
    println!();

    let pipeline = SummaryPipeline::build(config).context("pipeline setup failed")?;
    let manifest = pipeline.run().context("summary run failed")?;
    print_summary(&manifest)?;
    Ok(())
}

fn build_config(args: &[String]) -> Result<SummaryConfig> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => SummaryConfig::load(path)
            .with_context(|| format!("cannot load config {path}"))?,
        None => SummaryConfig::default(),
    };

    if let Some(dir) = flag_value(args, "--msm-dir") {
        config.msm_dir = PathBuf::from(dir);
    }
    if let Some(dir) = flag_value(args, "--male-dir") {
        config.male_dir = PathBuf::from(dir);
    }
    if let Some(path) = flag_value(args, "--geoid") {
        config.geoid_path = PathBuf::from(path);
    }
    if let Some(dir) = flag_value(args, "--out") {
        config.output_dir = PathBuf::from(dir);
    }
    config.n_counties = parse_arg(args, "--counties", config.n_counties);
    config.chunk_size = parse_arg(args, "--chunk-size", config.chunk_size);
    config.workers = parse_arg(args, "--workers", config.workers);

    let demos = args
        .windows(2)
        .filter(|w| w[0] == "--demo")
        .map(|w| w[1].parse::<Demographic>().map_err(anyhow::Error::msg))
        .collect::<Result<Vec<_>>>()?;
    if !demos.is_empty() {
        config.demographics = demos;
    }
    if args.iter().any(|a| a == "--skip-aggregate") {
        config.aggregate = false;
    }

    config.validate()?;
    Ok(config)
}

fn print_summary(manifest: &RunManifest) -> Result<()> {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:   {}", manifest.run_id);
    if let Some(finished) = manifest.finished_at {
        let secs = (finished - manifest.started_at).num_milliseconds() as f64 / 1000.0;
        println!("  elapsed:  {secs:.1}s");
    }
    for output in &manifest.outputs {
        println!("  {:<40} {:>8} rows", output.file, output.rows);
    }
    println!();
    println!("=== DATA QUALITY ===");
    println!("{}", serde_json::to_string_pretty(&manifest.quality)?);
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
