use std::path::PathBuf;

use clap::Parser;

/// Command line options for the Brownian ensemble driver.
#[derive(Parser, Debug)]
#[command(author, version, about = "2D Brownian motion ensemble with RMSD analysis")]
pub struct CliOptions {
    /// Path to the simulation TOML configuration file.
    #[arg(long, value_name = "FILE", default_value = "config/simulation.toml")]
    pub config: PathBuf,

    /// Override the random seed (runs are reproducible for a fixed seed).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the number of simulated tracks.
    #[arg(long)]
    pub tracks: Option<usize>,

    /// Override the particle temperature.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Display configuration summary without running the simulation.
    #[arg(long)]
    pub dry_run: bool,
}
