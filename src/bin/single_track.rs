//! Simulates and plots a single Brownian particle to check the step function
//! before running a full ensemble.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use brownian_motion::config::load_from_file;
use brownian_motion::dynamics::{simulate_track, time_grid};
use brownian_motion::ensemble::{TrajectoryEnsemble, seeded_rng};
use brownian_motion::output::{ensure_directory, resolve_artifacts, write_tracks_csv};
use brownian_motion::plotting::render_tracks;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config/single_track.toml"));

    let params = load_from_file(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    let artifacts = resolve_artifacts(&params.output);
    ensure_directory(&artifacts.directory)?;

    let time_steps = params.time_steps();
    let mut rng = seeded_rng(params.seed);
    let track = simulate_track(
        params.initial_position,
        params.temperature,
        params.dt,
        time_steps,
        &mut rng,
    )?;

    let last = *track
        .last()
        .ok_or_else(|| anyhow!("Simulation produced zero samples"))?;
    let ensemble = TrajectoryEnsemble::from_tracks(std::slice::from_ref(&track))?;

    if artifacts.toggles.csv {
        write_tracks_csv(&artifacts.tracks_csv, &time_grid(time_steps, params.dt), &ensemble)?;
    }
    if artifacts.toggles.png || artifacts.toggles.svg {
        render_tracks(&artifacts, &ensemble)?;
    }

    println!(
        "[single-track] completed. {} samples, final position ({:.4}, {:.4}), net displacement {:.4}. Outputs in {}",
        track.len(),
        last.x,
        last.y,
        last.squared_distance(&params.initial_position).sqrt(),
        artifacts.directory.display()
    );

    Ok(())
}
