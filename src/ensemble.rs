use anyhow::{Context, Result};
use log::info;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::analysis::{PowerLawFit, RmsdCurve, compute_rmsd, fit_power_law};
use crate::config::SimulationParams;
use crate::dynamics::{simulate_track, time_grid};
use crate::error::{self, BrownianError};
use crate::output::{OutputArtifacts, write_rmsd_csv, write_summary_json, write_tracks_csv};
use crate::plotting::{render_rmsd, render_tracks};
use crate::state::{Position, Trajectory};

/// Equal-length trajectories stored as `(time_steps, track_count)` grids.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryEnsemble {
    xs: Array2<f64>,
    ys: Array2<f64>,
}

impl TrajectoryEnsemble {
    pub fn new(xs: Array2<f64>, ys: Array2<f64>) -> error::Result<Self> {
        if xs.dim() != ys.dim() {
            return Err(BrownianError::InvalidInput(format!(
                "x and y grids must share a shape, got {:?} and {:?}",
                xs.dim(),
                ys.dim()
            )));
        }
        Ok(Self { xs, ys })
    }

    /// Assembles the grids column by column, one column per trajectory.
    pub fn from_tracks(tracks: &[Trajectory]) -> error::Result<Self> {
        if tracks.first().is_some_and(Trajectory::is_empty) {
            return Err(BrownianError::InvalidInput(
                "tracks must hold at least one sample".into(),
            ));
        }

        let time_steps = tracks.first().map(Trajectory::len).unwrap_or(0);
        if let Some(index) = tracks.iter().position(|track| track.len() != time_steps) {
            return Err(BrownianError::InvalidInput(format!(
                "track {} has {} samples, expected {}",
                index,
                tracks[index].len(),
                time_steps
            )));
        }

        let mut xs = Array2::zeros((time_steps, tracks.len()));
        let mut ys = Array2::zeros((time_steps, tracks.len()));
        for (column, track) in tracks.iter().enumerate() {
            for (row, position) in track.iter().enumerate() {
                xs[[row, column]] = position.x;
                ys[[row, column]] = position.y;
            }
        }

        Self::new(xs, ys)
    }

    pub fn xs(&self) -> &Array2<f64> {
        &self.xs
    }

    pub fn ys(&self) -> &Array2<f64> {
        &self.ys
    }

    pub fn time_steps(&self) -> usize {
        self.xs.nrows()
    }

    pub fn track_count(&self) -> usize {
        self.xs.ncols()
    }

    pub fn track(&self, index: usize) -> Option<Trajectory> {
        if index >= self.track_count() {
            return None;
        }

        let positions = self
            .xs
            .column(index)
            .iter()
            .zip(self.ys.column(index).iter())
            .map(|(&x, &y)| Position::new(x, y))
            .collect::<Vec<_>>();
        Some(Trajectory::from(positions))
    }

    pub fn rmsd(&self) -> error::Result<RmsdCurve> {
        compute_rmsd(self.xs.view(), self.ys.view())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsembleMetadata {
    pub track_count: usize,
    pub time_steps: usize,
    pub total_time: f64,
    pub dt: f64,
    pub temperature: f64,
    pub initial_position: Position,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EnsembleResult {
    pub metadata: EnsembleMetadata,
    pub time_grid: Vec<f64>,
    pub ensemble: TrajectoryEnsemble,
    pub rmsd: RmsdCurve,
    pub fit: Option<PowerLawFit>,
}

pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Runs `params.track_count` independent tracks and analyzes them.
pub fn run_ensemble<R: Rng>(params: &SimulationParams, rng: &mut R) -> Result<EnsembleResult> {
    params.validate()?;

    let time_steps = params.time_steps();
    info!(
        "[ensemble] starting run with {} tracks of {} steps, T = {}",
        params.track_count, time_steps, params.temperature
    );

    let mut tracks = Vec::with_capacity(params.track_count);
    for index in 0..params.track_count {
        info!(
            "[ensemble] running track {}/{}",
            index + 1,
            params.track_count
        );
        let track = simulate_track(
            params.initial_position,
            params.temperature,
            params.dt,
            time_steps,
            rng,
        )
        .with_context(|| format!("Simulation failed for track {}", index))?;
        tracks.push(track);
    }

    let ensemble = TrajectoryEnsemble::from_tracks(&tracks)?;
    let rmsd = ensemble
        .rmsd()
        .context("Failed to compute RMSD for ensemble")?;
    let time_grid = time_grid(time_steps, params.dt);
    let fit = fit_power_law(&time_grid, &rmsd.values);

    match &fit {
        Some(fit) => info!(
            "[ensemble] RMSD power law exponent {:.4} over {} points",
            fit.exponent, fit.point_count
        ),
        None => info!("[ensemble] not enough positive RMSD samples for a power law fit"),
    }

    Ok(EnsembleResult {
        metadata: EnsembleMetadata {
            track_count: params.track_count,
            time_steps,
            total_time: params.total_time,
            dt: params.dt,
            temperature: params.temperature,
            initial_position: params.initial_position,
            seed: params.seed,
        },
        time_grid,
        ensemble,
        rmsd,
        fit,
    })
}

pub fn export_ensemble(artifacts: &OutputArtifacts, result: &EnsembleResult) -> Result<()> {
    let toggles = artifacts.toggles;

    if toggles.csv {
        if toggles.tracks {
            write_tracks_csv(&artifacts.tracks_csv, &result.time_grid, &result.ensemble)?;
        }
        if toggles.rmsd {
            write_rmsd_csv(&artifacts.rmsd_csv, &result.time_grid, &result.rmsd)?;
        }
    }

    if toggles.json {
        write_summary_json(
            &artifacts.summary_json,
            &result.metadata,
            &result.time_grid,
            &result.rmsd,
            result.fit.as_ref(),
        )?;
    }

    if toggles.tracks && (toggles.png || toggles.svg) {
        render_tracks(artifacts, &result.ensemble)?;
    }

    if toggles.rmsd && (toggles.png || toggles.svg) {
        render_rmsd(artifacts, &result.time_grid, &result.rmsd, result.fit.as_ref())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn small_params(seed: u64) -> SimulationParams {
        let raw = format!(
            "[simulation]\ntrack_count = 3\ntotal_time = 1.0\ndt = 0.1\ntemperature = 1.0\nseed = {seed}\n"
        );
        parse_config(&raw).unwrap()
    }

    #[test]
    fn from_tracks_places_each_track_in_a_column() {
        let first = Trajectory::from(vec![Position::new(0.0, 0.0), Position::new(1.0, 2.0)]);
        let second = Trajectory::from(vec![Position::new(5.0, 5.0), Position::new(6.0, 4.0)]);
        let ensemble = TrajectoryEnsemble::from_tracks(&[first.clone(), second]).unwrap();

        assert_eq!(ensemble.time_steps(), 2);
        assert_eq!(ensemble.track_count(), 2);
        assert_eq!(ensemble.xs()[[1, 0]], 1.0);
        assert_eq!(ensemble.ys()[[1, 1]], 4.0);
        assert_eq!(ensemble.track(0).unwrap().positions(), first.positions());
        assert!(ensemble.track(2).is_none());
    }

    #[test]
    fn from_tracks_rejects_ragged_input() {
        let short = Trajectory::from(vec![Position::default()]);
        let long = Trajectory::from(vec![Position::default(), Position::default()]);
        assert!(matches!(
            TrajectoryEnsemble::from_tracks(&[long, short]),
            Err(BrownianError::InvalidInput(_))
        ));
    }

    #[test]
    fn from_tracks_rejects_empty_tracks() {
        assert!(matches!(
            TrajectoryEnsemble::from_tracks(&[Trajectory::default()]),
            Err(BrownianError::InvalidInput(_))
        ));
    }

    #[test]
    fn new_rejects_mismatched_grids() {
        let xs = Array2::zeros((3, 2));
        let ys = Array2::zeros((2, 3));
        assert!(TrajectoryEnsemble::new(xs, ys).is_err());
    }

    #[test]
    fn run_ensemble_shapes_follow_parameters() {
        let params = small_params(8);
        let mut rng = seeded_rng(params.seed);
        let result = run_ensemble(&params, &mut rng).unwrap();

        assert_eq!(result.ensemble.time_steps(), 10);
        assert_eq!(result.ensemble.track_count(), 3);
        assert_eq!(result.time_grid.len(), 10);
        assert_eq!(result.rmsd.len(), 10);
        assert_eq!(result.rmsd.values[0], 0.0);
        assert_eq!(result.rmsd.counts[0], 30);
        for track in 0..3 {
            assert_eq!(result.ensemble.xs()[[0, track]], 0.0);
            assert_eq!(result.ensemble.ys()[[0, track]], 0.0);
        }
    }

    #[test]
    fn same_seed_reproduces_ensemble() {
        let params = small_params(17);
        let first = run_ensemble(&params, &mut seeded_rng(params.seed)).unwrap();
        let second = run_ensemble(&params, &mut seeded_rng(params.seed)).unwrap();
        assert_eq!(first.ensemble, second.ensemble);
        assert_eq!(first.rmsd, second.rmsd);
    }

    #[test]
    fn zero_temperature_ensemble_never_moves() {
        let mut params = small_params(1);
        params.temperature = 0.0;
        let result = run_ensemble(&params, &mut seeded_rng(params.seed)).unwrap();
        assert!(result.rmsd.values.iter().all(|&value| value == 0.0));
        assert!(result.fit.is_none());
    }

    #[test]
    fn diffusive_ensemble_has_half_power_exponent() {
        let raw = "[simulation]\ntrack_count = 100\ntotal_time = 10.0\ndt = 0.1\nseed = 2020\n";
        let params = parse_config(raw).unwrap();
        let result = run_ensemble(&params, &mut seeded_rng(params.seed)).unwrap();
        let fit = result.fit.expect("fit available");
        assert!(
            (fit.exponent - 0.5).abs() < 0.15,
            "exponent {}",
            fit.exponent
        );
    }
}
