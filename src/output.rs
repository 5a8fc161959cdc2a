use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::analysis::{PowerLawFit, RmsdCurve};
use crate::config::{OutputPaths, OutputToggles};
use crate::ensemble::{EnsembleMetadata, TrajectoryEnsemble};

#[derive(Debug, Clone)]
pub struct OutputArtifacts {
    pub directory: PathBuf,
    pub tracks_png: PathBuf,
    pub tracks_svg: PathBuf,
    pub rmsd_png: PathBuf,
    pub rmsd_svg: PathBuf,
    pub tracks_csv: PathBuf,
    pub rmsd_csv: PathBuf,
    pub summary_json: PathBuf,
    pub toggles: OutputToggles,
}

pub fn resolve_artifacts(paths: &OutputPaths) -> OutputArtifacts {
    let directory = paths.directory.clone();

    OutputArtifacts {
        directory: directory.clone(),
        tracks_png: resolve_path(&directory, &paths.tracks_png),
        tracks_svg: resolve_path(&directory, &paths.tracks_svg),
        rmsd_png: resolve_path(&directory, &paths.rmsd_png),
        rmsd_svg: resolve_path(&directory, &paths.rmsd_svg),
        tracks_csv: resolve_path(&directory, &paths.tracks_csv),
        rmsd_csv: resolve_path(&directory, &paths.rmsd_csv),
        summary_json: resolve_path(&directory, &paths.summary_json),
        toggles: paths.toggles,
    }
}

fn resolve_path(base: &Path, relative: &Path) -> PathBuf {
    if relative.is_absolute() {
        relative.to_path_buf()
    } else {
        base.join(relative)
    }
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create output directory {}", path.display()))?;
    }
    Ok(())
}

/// Long-format dump with one row per track and timestep.
pub fn write_tracks_csv(path: &Path, time: &[f64], ensemble: &TrajectoryEnsemble) -> Result<()> {
    if time.len() != ensemble.time_steps() {
        return Err(anyhow!(
            "Tracks CSV: time grid has {} entries for {} timesteps",
            time.len(),
            ensemble.time_steps()
        ));
    }

    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Unable to create CSV file {}", path.display()))?;

    writer.write_record(["track", "step", "time", "x", "y"])?;

    let xs = ensemble.xs();
    let ys = ensemble.ys();
    for track in 0..ensemble.track_count() {
        for (step, t) in time.iter().enumerate() {
            writer
                .write_record(&[
                    track.to_string(),
                    step.to_string(),
                    format!("{:.12e}", t),
                    format!("{:.12e}", xs[[step, track]]),
                    format!("{:.12e}", ys[[step, track]]),
                ])
                .with_context(|| format!("Failed to write track {} at step {}", track, step))?;
        }
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush CSV writer for {}", path.display()))
}

pub fn write_rmsd_csv(path: &Path, time: &[f64], rmsd: &RmsdCurve) -> Result<()> {
    if time.len() != rmsd.len() {
        return Err(anyhow!("RMSD CSV: time and value arrays must match"));
    }

    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Unable to create CSV file {}", path.display()))?;

    writer.write_record(["lag", "time", "rmsd", "samples"])?;

    for (lag, ((t, value), count)) in time
        .iter()
        .zip(rmsd.values.iter())
        .zip(rmsd.counts.iter())
        .enumerate()
    {
        writer.write_record(&[
            lag.to_string(),
            format!("{:.12e}", t),
            format!("{:.12e}", value),
            count.to_string(),
        ])?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush CSV writer for {}", path.display()))
}

pub fn write_summary_json(
    path: &Path,
    metadata: &EnsembleMetadata,
    time: &[f64],
    rmsd: &RmsdCurve,
    fit: Option<&PowerLawFit>,
) -> Result<()> {
    if time.len() != rmsd.len() {
        return Err(anyhow!("Summary JSON: time and value arrays must match"));
    }

    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut root = serde_json::Map::new();

    root.insert(
        "metadata".into(),
        serde_json::to_value(metadata).context("Failed to serialize metadata for JSON export")?,
    );

    root.insert(
        "fit".into(),
        match fit {
            Some(fit) => serde_json::json!({
                "exponent": fit.exponent,
                "prefactor": fit.prefactor,
                "log_intercept": fit.log_intercept,
                "point_count": fit.point_count,
                "log_base": "e",
            }),
            None => serde_json::Value::Null,
        },
    );

    let samples: Vec<_> = time
        .iter()
        .zip(rmsd.values.iter())
        .zip(rmsd.counts.iter())
        .enumerate()
        .map(|(lag, ((t, value), count))| {
            serde_json::json!({
                "lag": lag,
                "time": t,
                "rmsd": value,
                "samples": count,
            })
        })
        .collect();
    root.insert("rmsd".into(), serde_json::Value::Array(samples));

    let file = File::create(path)
        .with_context(|| format!("Unable to create JSON file {}", path.display()))?;

    serde_json::to_writer_pretty(file, &serde_json::Value::Object(root))
        .with_context(|| format!("Failed to write JSON payload to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn relative_paths_land_in_output_directory() {
        let mut params = parse_config("[output]\ndirectory = \"runs\"").unwrap();
        params.output.summary_json = PathBuf::from("/tmp/elsewhere/summary.json");
        let artifacts = resolve_artifacts(&params.output);

        assert_eq!(artifacts.tracks_png, PathBuf::from("runs/tracks.png"));
        assert_eq!(artifacts.rmsd_csv, PathBuf::from("runs/rmsd.csv"));
        assert_eq!(
            artifacts.summary_json,
            PathBuf::from("/tmp/elsewhere/summary.json")
        );
    }

    #[test]
    fn rmsd_csv_rejects_length_mismatch() {
        let rmsd = RmsdCurve {
            values: vec![0.0, 1.0],
            counts: vec![2, 1],
        };
        let path = std::env::temp_dir().join("brownian-motion-mismatch.csv");
        assert!(write_rmsd_csv(&path, &[0.0], &rmsd).is_err());
    }
}
