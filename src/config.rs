use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::state::Position;

// The RMSD pass is quadratic in the number of timesteps.
pub const MAX_TIME_STEPS: usize = 100_000;

#[derive(Debug, Deserialize)]
struct ConfigRoot {
    #[serde(default)]
    simulation: SimulationSection,
    #[serde(default)]
    output: OutputSection,
}

#[derive(Debug, Deserialize)]
struct SimulationSection {
    #[serde(default = "default_track_count")]
    track_count: usize,
    #[serde(default = "default_total_time")]
    total_time: f64,
    #[serde(default = "default_dt")]
    dt: f64,
    #[serde(default = "default_temperature")]
    temperature: f64,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    initial_position: InitialPositionSection,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            track_count: default_track_count(),
            total_time: default_total_time(),
            dt: default_dt(),
            temperature: default_temperature(),
            seed: None,
            initial_position: InitialPositionSection::default(),
        }
    }
}

fn default_track_count() -> usize {
    10
}

fn default_total_time() -> f64 {
    100.0
}

fn default_dt() -> f64 {
    0.1
}

fn default_temperature() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Default)]
struct InitialPositionSection {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

#[derive(Debug, Deserialize)]
struct OutputSection {
    #[serde(default = "default_directory")]
    directory: PathBuf,
    #[serde(default = "default_tracks_png")]
    tracks_png: PathBuf,
    #[serde(default = "default_tracks_svg")]
    tracks_svg: PathBuf,
    #[serde(default = "default_rmsd_png")]
    rmsd_png: PathBuf,
    #[serde(default = "default_rmsd_svg")]
    rmsd_svg: PathBuf,
    #[serde(default = "default_tracks_csv")]
    tracks_csv: PathBuf,
    #[serde(default = "default_rmsd_csv")]
    rmsd_csv: PathBuf,
    #[serde(default = "default_summary_json")]
    summary_json: PathBuf,
    #[serde(default)]
    toggles: OutputTogglesSection,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            tracks_png: default_tracks_png(),
            tracks_svg: default_tracks_svg(),
            rmsd_png: default_rmsd_png(),
            rmsd_svg: default_rmsd_svg(),
            tracks_csv: default_tracks_csv(),
            rmsd_csv: default_rmsd_csv(),
            summary_json: default_summary_json(),
            toggles: OutputTogglesSection::default(),
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from("output")
}

fn default_tracks_png() -> PathBuf {
    PathBuf::from("tracks.png")
}

fn default_tracks_svg() -> PathBuf {
    PathBuf::from("tracks.svg")
}

fn default_rmsd_png() -> PathBuf {
    PathBuf::from("rmsd.png")
}

fn default_rmsd_svg() -> PathBuf {
    PathBuf::from("rmsd.svg")
}

fn default_tracks_csv() -> PathBuf {
    PathBuf::from("tracks.csv")
}

fn default_rmsd_csv() -> PathBuf {
    PathBuf::from("rmsd.csv")
}

fn default_summary_json() -> PathBuf {
    PathBuf::from("summary.json")
}

#[derive(Debug, Deserialize, Clone, Copy)]
struct OutputTogglesSection {
    #[serde(default = "default_true")]
    tracks: bool,
    #[serde(default = "default_true")]
    rmsd: bool,
    #[serde(default = "default_true")]
    png: bool,
    #[serde(default = "default_true")]
    svg: bool,
    #[serde(default = "default_true")]
    csv: bool,
    #[serde(default = "default_true")]
    json: bool,
}

impl Default for OutputTogglesSection {
    fn default() -> Self {
        Self {
            tracks: true,
            rmsd: true,
            png: true,
            svg: true,
            csv: true,
            json: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub track_count: usize,
    pub total_time: f64,
    pub dt: f64,
    pub temperature: f64,
    pub initial_position: Position,
    pub seed: Option<u64>,
    pub output: OutputPaths,
}

impl SimulationParams {
    /// Number of sampled timesteps needed to reach `total_time`.
    pub fn time_steps(&self) -> usize {
        let steps = (self.total_time / self.dt).round();
        if steps.is_finite() && steps > 0.0 {
            steps as usize
        } else {
            0
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(anyhow!("Time step dt must be positive"));
        }

        if !self.total_time.is_finite() || self.total_time <= 0.0 {
            return Err(anyhow!("Total time must be positive"));
        }

        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(anyhow!("Temperature must be non-negative"));
        }

        if self.track_count == 0 {
            return Err(anyhow!("At least one track is required"));
        }

        if self.time_steps() == 0 {
            return Err(anyhow!(
                "total_time {} with dt {} yields no timesteps",
                self.total_time,
                self.dt
            ));
        }

        if self.time_steps() > MAX_TIME_STEPS {
            return Err(anyhow!(
                "total_time {} with dt {} yields {} timesteps, more than the limit of {}",
                self.total_time,
                self.dt,
                self.time_steps(),
                MAX_TIME_STEPS
            ));
        }

        if !self.initial_position.x.is_finite() || !self.initial_position.y.is_finite() {
            return Err(anyhow!("Initial position must be finite"));
        }

        Ok(())
    }

    /// Replaces the seed, track count or temperature and re-validates.
    pub fn apply_overrides(
        &mut self,
        seed: Option<u64>,
        track_count: Option<usize>,
        temperature: Option<f64>,
    ) -> Result<()> {
        if let Some(seed) = seed {
            self.seed = Some(seed);
        }
        if let Some(track_count) = track_count {
            self.track_count = track_count;
        }
        if let Some(temperature) = temperature {
            self.temperature = temperature;
        }

        self.validate()
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let toggles = &self.output.toggles;
        vec![
            format!(
                "tracks: {}, time steps: {} (total_time={}, dt={})",
                self.track_count,
                self.time_steps(),
                self.total_time,
                self.dt
            ),
            format!("temperature: {}", self.temperature),
            format!(
                "initial position: ({}, {})",
                self.initial_position.x, self.initial_position.y
            ),
            match self.seed {
                Some(seed) => format!("seed: {seed}"),
                None => "seed: from entropy".to_string(),
            },
            format!(
                "output dir: {} (tracks={}, rmsd={}, png={}, svg={}, csv={}, json={})",
                self.output.directory.display(),
                toggles.tracks,
                toggles.rmsd,
                toggles.png,
                toggles.svg,
                toggles.csv,
                toggles.json
            ),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct OutputPaths {
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

#[derive(Debug, Clone, Copy)]
pub struct OutputToggles {
    pub tracks: bool,
    pub rmsd: bool,
    pub png: bool,
    pub svg: bool,
    pub csv: bool,
    pub json: bool,
}

pub fn load_from_file(path: impl AsRef<Path>) -> Result<SimulationParams> {
    let raw = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<SimulationParams> {
    let parsed: ConfigRoot =
        toml::from_str(raw).context("Failed to parse simulation configuration")?;
    load_from_sections(&parsed.simulation, &parsed.output)
}

fn load_from_sections(
    simulation: &SimulationSection,
    output: &OutputSection,
) -> Result<SimulationParams> {
    let params = SimulationParams {
        track_count: simulation.track_count,
        total_time: simulation.total_time,
        dt: simulation.dt,
        temperature: simulation.temperature,
        initial_position: Position::new(
            simulation.initial_position.x,
            simulation.initial_position.y,
        ),
        seed: simulation.seed,
        output: OutputPaths {
            directory: output.directory.clone(),
            tracks_png: output.tracks_png.clone(),
            tracks_svg: output.tracks_svg.clone(),
            rmsd_png: output.rmsd_png.clone(),
            rmsd_svg: output.rmsd_svg.clone(),
            tracks_csv: output.tracks_csv.clone(),
            rmsd_csv: output.rmsd_csv.clone(),
            summary_json: output.summary_json.clone(),
            toggles: OutputToggles {
                tracks: output.toggles.tracks,
                rmsd: output.toggles.rmsd,
                png: output.toggles.png,
                svg: output.toggles.svg,
                csv: output.toggles.csv,
                json: output.toggles.json,
            },
        },
    };

    params.validate()?;
    Ok(params)
}
