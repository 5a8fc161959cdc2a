use log::debug;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{BrownianError, Result};
use crate::state::{Position, Trajectory};

/// Per-axis standard deviation of one Brownian step, `sqrt(2 T dt)`.
///
/// The diffusion coefficient is folded into the temperature, so `T` plays the
/// role of `D` in the Einstein relation `<dx^2> = 2 D dt`.
pub fn displacement_sigma(temperature: f64, dt: f64) -> Result<f64> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(BrownianError::InvalidParameter {
            name: "dt",
            value: dt,
            reason: "time step must be positive and finite",
        });
    }

    if !temperature.is_finite() || temperature < 0.0 {
        return Err(BrownianError::InvalidParameter {
            name: "temperature",
            value: temperature,
            reason: "temperature must be non-negative and finite",
        });
    }

    Ok((2.0 * temperature * dt).sqrt())
}

/// Advances a particle by one timestep of thermal motion.
pub fn step<R: Rng>(
    position: Position,
    temperature: f64,
    dt: f64,
    rng: &mut R,
) -> Result<Position> {
    let sigma = displacement_sigma(temperature, dt)?;
    if sigma == 0.0 {
        return Ok(position);
    }

    let dx: f64 = rng.sample(StandardNormal);
    let dy: f64 = rng.sample(StandardNormal);

    Ok(Position {
        x: position.x + sigma * dx,
        y: position.y + sigma * dy,
    })
}

/// Builds a trajectory of `time_steps` samples starting at `initial`.
pub fn simulate_track<R: Rng>(
    initial: Position,
    temperature: f64,
    dt: f64,
    time_steps: usize,
    rng: &mut R,
) -> Result<Trajectory> {
    if time_steps == 0 {
        return Err(BrownianError::InvalidInput(
            "trajectory must contain at least one timestep".into(),
        ));
    }

    let mut trajectory = Trajectory::with_capacity(time_steps);
    let mut position = initial;
    trajectory.push(position);

    for _ in 1..time_steps {
        position = step(position, temperature, dt, rng)?;
        trajectory.push(position);
    }

    debug!(
        "simulated track of {} steps, final position ({:.4}, {:.4})",
        time_steps, position.x, position.y
    );

    Ok(trajectory)
}

pub fn time_grid(time_steps: usize, dt: f64) -> Vec<f64> {
    (0..time_steps).map(|k| k as f64 * dt).collect()
}
