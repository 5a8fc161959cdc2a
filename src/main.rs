mod cli;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use brownian_motion::config;
use brownian_motion::ensemble::{export_ensemble, run_ensemble, seeded_rng};
use brownian_motion::output::{ensure_directory, resolve_artifacts};
use clap::Parser;

use crate::cli::CliOptions;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = CliOptions::parse();

    let config_path = normalize_config_path(&cli.config)?;
    let mut params = config::load_from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    params
        .apply_overrides(cli.seed, cli.tracks, cli.temperature)
        .context("invalid command line override")?;

    println!("Configuration summary:");
    for line in params.summary_lines() {
        println!("  - {line}");
    }

    if cli.dry_run {
        println!("Dry-run requested; exiting without running simulation.");
        return Ok(());
    }

    let artifacts = resolve_artifacts(&params.output);
    ensure_directory(&artifacts.directory)?;

    let start = Instant::now();
    let mut rng = seeded_rng(params.seed);
    let result = run_ensemble(&params, &mut rng)?;
    export_ensemble(&artifacts, &result)?;

    println!(
        "Simulation finished in {:.3?}: {} tracks x {} steps.",
        start.elapsed(),
        result.metadata.track_count,
        result.metadata.time_steps
    );
    match &result.fit {
        Some(fit) => {
            println!("RMSD exponent α = {:.4} (normal diffusion: 0.5)", fit.exponent);
            println!("RMSD prefactor = {:.4}", fit.prefactor);
        }
        None => println!("RMSD exponent unavailable (no positive displacement)."),
    }
    println!("Outputs in {}", artifacts.directory.display());

    Ok(())
}

fn normalize_config_path(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }

    Err(anyhow!(
        "configuration file {} does not exist",
        path.display()
    ))
}
