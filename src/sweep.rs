//! Parameter sweeps: one subprocess per grid point, launched in throttled
//! batches.
//!
//! Every point gets its own parameter file and output path (containing a
//! short id derived from the point's values), and is recorded in the
//! `sweeps.csv` index the moment it is launched, so a crash mid-sweep
//! still leaves a complete record of what was attempted.
use chrono::Local;
use log;
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use crate::error::SimError;
use crate::params::Parameters;

/// The parameter values of one sweep point.
#[derive(Debug, Clone, PartialEq)]
pub enum PointValues {
    /// Relative inhibition strength and relative external drive.
    GEta { g: f64, eta: f64 },
    /// Random seed, all other parameters at baseline.
    Seed(u64),
}

impl PointValues {
    /// Patch a baseline configuration with this point's values.
    pub fn apply(&self, params: &mut Parameters) {
        match self {
            PointValues::GEta { g, eta } => {
                params.network.g = *g;
                params.network.eta = *eta;
            }
            PointValues::Seed(seed) => params.experiment.seed = *seed,
        }
    }

    /// The identifying values recorded in the index file.
    pub fn index_fields(&self) -> Vec<String> {
        match self {
            PointValues::GEta { g, eta } => vec![g.to_string(), eta.to_string()],
            PointValues::Seed(seed) => vec![seed.to_string()],
        }
    }
}

/// One point of a sweep: its values and a short deterministic id used in
/// generated file names.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub id: String,
    pub values: PointValues,
}

/// A cross product over (g, eta) or an explicit seed list.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepPlan {
    Grid { g: Vec<f64>, eta: Vec<f64> },
    Seeds(Vec<u64>),
}

impl SweepPlan {
    /// The (g, eta) grid spanning the model's main dynamical regimes:
    /// g in {0, 2, 4, 6, 8} and eta in {0, 1, 2, 3, 4}.
    pub fn default_grid() -> Self {
        SweepPlan::Grid {
            g: (0..9).step_by(2).map(f64::from).collect(),
            eta: (0..5).map(f64::from).collect(),
        }
    }

    /// Every point of the plan, in launch order.
    pub fn points(&self) -> Vec<SweepPoint> {
        let values: Vec<PointValues> = match self {
            SweepPlan::Grid { g, eta } => g
                .iter()
                .flat_map(|&g| eta.iter().map(move |&eta| PointValues::GEta { g, eta }))
                .collect(),
            SweepPlan::Seeds(seeds) => seeds.iter().map(|&s| PointValues::Seed(s)).collect(),
        };
        values
            .into_iter()
            .enumerate()
            .map(|(index, values)| SweepPoint {
                id: short_id(index, &values),
                values,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        match self {
            SweepPlan::Grid { g, eta } => g.len() * eta.len(),
            SweepPlan::Seeds(seeds) => seeds.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First 8 hex digits of the hash of a point's index and values.
fn short_id(index: usize, values: &PointValues) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{} {:?}", index, values));
    let hash = hasher.finalize();
    format!("{:x}", hash)[..8].to_string()
}

/// Launches one single-run subprocess per sweep point, at most `jobs` at a
/// time.
#[derive(Debug, Clone)]
pub struct SweepRunner {
    backend: String,
    /// Number of concurrently running subprocesses.
    pub jobs: usize,
    /// Subprocess argv prefix; the parameter file path is appended.
    command: Vec<OsString>,
}

impl SweepRunner {
    /// A runner re-invoking this executable's single-run entry point.
    pub fn new(backend: &str) -> Result<Self, SimError> {
        let exe = std::env::current_exe()
            .map_err(|e| SimError::ExecutionError(format!("cannot locate executable: {}", e)))?;
        Ok(Self::with_command(
            backend,
            vec![exe.into(), "run".into(), backend.into()],
        ))
    }

    /// A runner spawning an arbitrary command per point.
    pub fn with_command(backend: &str, command: Vec<OsString>) -> Self {
        SweepRunner {
            backend: backend.to_string(),
            jobs: 10,
            command,
        }
    }

    /// Run the sweep under `results_root`. Returns the per-sweep results
    /// directory. A failed job is logged and does not stop later batches.
    pub fn run(
        &self,
        base: &Parameters,
        plan: &SweepPlan,
        results_root: &Path,
    ) -> Result<PathBuf, SimError> {
        let results_dir = results_root.join(format!("{}", Local::now().format("%Y%m%d-%H%M%S")));
        std::fs::create_dir_all(&results_dir).map_err(|e| {
            SimError::IOError(format!("cannot create {}: {}", results_dir.display(), e))
        })?;

        let index_path = results_dir.join("sweeps.csv");
        let index = File::create(&index_path).map_err(|e| {
            SimError::IOError(format!("cannot create {}: {}", index_path.display(), e))
        })?;
        let mut index = BufWriter::new(index);

        let mut parameters = base.clone();
        // every point names its output explicitly
        parameters.experiment.base_filename = None;

        let mut batch: Vec<(String, Child)> = Vec::new();
        for point in plan.points() {
            let output_file = results_dir.join(format!(
                "brunel_network_alpha_{}_{}.json",
                self.backend, point.id
            ));
            point.values.apply(&mut parameters);
            parameters.experiment.full_filename =
                Some(output_file.to_string_lossy().into_owned());

            let parameter_file = results_dir.join(format!("parameters_{}.json", point.id));
            parameters.save_to(&parameter_file)?;

            // record the attempt before waiting on anything
            writeln!(
                index,
                "{} {}",
                point.values.index_fields().join(" "),
                output_file.display()
            )
            .map_err(|e| SimError::IOError(e.to_string()))?;
            index.flush().map_err(|e| SimError::IOError(e.to_string()))?;

            let mut command = Command::new(&self.command[0]);
            command.args(&self.command[1..]).arg(&parameter_file);
            log::info!("Launching {:?}", command);
            let child = command.spawn().map_err(|e| {
                SimError::ExecutionError(format!("cannot launch {:?}: {}", self.command[0], e))
            })?;
            batch.push((point.id.clone(), child));

            if batch.len() == self.jobs {
                wait_batch(&mut batch);
            }
        }
        wait_batch(&mut batch);
        Ok(results_dir)
    }
}

/// Wait for every job of the current batch, capturing each exit status.
/// Failures surface as warnings only; the sweep goes on.
fn wait_batch(batch: &mut Vec<(String, Child)>) {
    for (id, mut child) in batch.drain(..) {
        match child.wait() {
            Ok(status) if status.success() => log::debug!("Job {} finished", id),
            Ok(status) => log::warn!("Job {} exited with {}", id, status),
            Err(e) => log::warn!("Job {} could not be waited on: {}", id, e),
        }
    }
}
