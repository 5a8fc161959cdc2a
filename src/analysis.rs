use log::debug;
use ndarray::ArrayView2;
use serde::Serialize;

use crate::error::{BrownianError, Result};

/// Per-lag squared displacement sums pooled over every sub-track.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementSums {
    pub sums: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Root-mean-square displacement indexed by lag, with the sample count behind
/// each value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RmsdCurve {
    pub values: Vec<f64>,
    pub counts: Vec<usize>,
}

impl RmsdCurve {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Power law `r = prefactor * t^exponent` fitted in log-log space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerLawFit {
    pub exponent: f64,
    pub prefactor: f64,
    pub log_intercept: f64,
    pub point_count: usize,
}

impl PowerLawFit {
    pub fn evaluate(&self, time: f64) -> f64 {
        self.prefactor * time.powf(self.exponent)
    }
}

/// Treats every suffix of every track (column) as its own sub-track and
/// accumulates the squared displacement from the sub-track origin at each lag.
///
/// Overlapping sub-tracks are pooled, so lag `tau` collects
/// `track_count * (time_steps - tau)` samples.
pub fn accumulate_displacements(
    xs: ArrayView2<'_, f64>,
    ys: ArrayView2<'_, f64>,
) -> Result<DisplacementSums> {
    if xs.dim() != ys.dim() {
        return Err(BrownianError::InvalidInput(format!(
            "x and y grids must share a shape, got {:?} and {:?}",
            xs.dim(),
            ys.dim()
        )));
    }

    let (time_steps, track_count) = xs.dim();
    if time_steps == 0 || track_count == 0 {
        return Err(BrownianError::InvalidInput(format!(
            "ensemble needs at least one timestep and one track, got {} x {}",
            time_steps, track_count
        )));
    }

    let mut sums = vec![0.0; time_steps];
    let mut counts = vec![0usize; time_steps];

    for (track_x, track_y) in xs.columns().into_iter().zip(ys.columns()) {
        for start in 0..time_steps {
            let origin_x = track_x[start];
            let origin_y = track_y[start];
            for lag in 0..time_steps - start {
                let dx = track_x[start + lag] - origin_x;
                let dy = track_y[start + lag] - origin_y;
                sums[lag] += dx * dx + dy * dy;
                counts[lag] += 1;
            }
        }
    }

    debug!(
        "accumulated displacements over {} tracks x {} timesteps",
        track_count, time_steps
    );

    Ok(DisplacementSums { sums, counts })
}

pub fn compute_rmsd(xs: ArrayView2<'_, f64>, ys: ArrayView2<'_, f64>) -> Result<RmsdCurve> {
    let DisplacementSums { sums, counts } = accumulate_displacements(xs, ys)?;

    let values = sums
        .iter()
        .zip(counts.iter())
        .map(|(&sum, &count)| (sum / count as f64).sqrt())
        .collect();

    Ok(RmsdCurve { values, counts })
}

/// Least-squares fit of `ln r` against `ln t`.
///
/// Lag zero and any non-positive time or RMSD sample are skipped, since they
/// have no logarithm. Needs at least two usable points.
pub fn fit_power_law(times: &[f64], rmsd: &[f64]) -> Option<PowerLawFit> {
    if times.len() != rmsd.len() {
        return None;
    }

    let (log_t, log_r): (Vec<f64>, Vec<f64>) = times
        .iter()
        .zip(rmsd.iter())
        .skip(1)
        .filter(|&(&t, &r)| t > 0.0 && r > 0.0 && t.is_finite() && r.is_finite())
        .map(|(&t, &r)| (t.ln(), r.ln()))
        .unzip();

    let (slope, intercept) = linear_regression(&log_t, &log_r)?;
    Some(PowerLawFit {
        exponent: slope,
        prefactor: intercept.exp(),
        log_intercept: intercept,
        point_count: log_t.len(),
    })
}

fn linear_regression(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len() as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_x2: f64 = x.iter().map(|v| v * v).sum();
    let sum_xy: f64 = x.iter().zip(y.iter()).map(|(xi, yi)| xi * yi).sum();

    let denom = n * sum_x2 - sum_x * sum_x;
    if denom.abs() < 1e-12 {
        return None;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    Some((slope, intercept))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    #[test]
    fn all_zero_grids_give_zero_rmsd() {
        let xs = Array2::<f64>::zeros((5, 2));
        let ys = Array2::<f64>::zeros((5, 2));
        let curve = compute_rmsd(xs.view(), ys.view()).unwrap();
        assert_eq!(curve.values, vec![0.0; 5]);
    }

    #[test]
    fn linear_motion_gives_rmsd_equal_to_lag() {
        let xs = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let ys = Array2::<f64>::zeros((5, 1));
        let curve = compute_rmsd(xs.view(), ys.view()).unwrap();
        for (lag, value) in curve.values.iter().enumerate() {
            assert!((value - lag as f64).abs() < 1e-12, "lag {lag}: {value}");
        }
        assert_eq!(curve.counts, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn lag_zero_is_always_zero() {
        let xs = array![[0.3, -1.0, 2.0], [1.7, 0.2, -0.4], [-2.2, 3.1, 0.9]];
        let ys = array![[1.0, 0.0, -0.5], [0.4, -2.5, 1.5], [0.8, 0.6, -1.1]];
        let curve = compute_rmsd(xs.view(), ys.view()).unwrap();
        assert_eq!(curve.values[0], 0.0);
    }

    #[test]
    fn counts_shrink_with_lag() {
        let (time_steps, track_count) = (7, 3);
        let xs = Array2::from_shape_fn((time_steps, track_count), |(t, j)| (t * j) as f64);
        let ys = Array2::from_shape_fn((time_steps, track_count), |(t, j)| (t + j) as f64);
        let sums = accumulate_displacements(xs.view(), ys.view()).unwrap();

        assert_eq!(sums.counts[0], track_count * time_steps);
        for lag in 0..time_steps {
            assert_eq!(sums.counts[lag], track_count * (time_steps - lag));
        }
        assert!(sums.counts.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn output_length_follows_time_dimension() {
        for track_count in [1, 4, 9] {
            let xs = Array2::<f64>::ones((6, track_count));
            let ys = Array2::<f64>::ones((6, track_count));
            let curve = compute_rmsd(xs.view(), ys.view()).unwrap();
            assert_eq!(curve.len(), 6);
        }
    }

    #[test]
    fn overlapping_windows_pool_every_origin() {
        // x = [0, 1, 3]: lag 1 sees 1 and 2, lag 2 sees 3.
        let xs = array![[0.0], [1.0], [3.0]];
        let ys = Array2::<f64>::zeros((3, 1));
        let curve = compute_rmsd(xs.view(), ys.view()).unwrap();
        assert!((curve.values[1] - (2.5f64).sqrt()).abs() < 1e-12);
        assert!((curve.values[2] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_degenerate_or_mismatched_grids() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            compute_rmsd(empty.view(), empty.view()),
            Err(BrownianError::InvalidInput(_))
        ));

        let no_tracks = Array2::<f64>::zeros((4, 0));
        assert!(compute_rmsd(no_tracks.view(), no_tracks.view()).is_err());

        let xs = Array2::<f64>::zeros((4, 2));
        let ys = Array2::<f64>::zeros((4, 3));
        assert!(matches!(
            compute_rmsd(xs.view(), ys.view()),
            Err(BrownianError::InvalidInput(_))
        ));
    }

    #[test]
    fn power_law_fit_recovers_diffusive_exponent() {
        let times: Vec<f64> = (0..50).map(|k| k as f64 * 0.1).collect();
        let rmsd: Vec<f64> = times.iter().map(|t| 2.0 * t.sqrt()).collect();
        let fit = fit_power_law(&times, &rmsd).expect("fit available");
        assert!((fit.exponent - 0.5).abs() < 1e-9);
        assert!((fit.prefactor - 2.0).abs() < 1e-9);
        assert_eq!(fit.point_count, 49);
        assert!((fit.evaluate(4.0) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn power_law_fit_needs_two_positive_points() {
        assert!(fit_power_law(&[0.0, 0.1], &[0.0, 1.0]).is_none());
        assert!(fit_power_law(&[0.0, 0.1, 0.2], &[0.0, 0.0, 0.0]).is_none());
        assert!(fit_power_law(&[0.0, 0.1], &[0.0]).is_none());
    }
}
