//! Adapter shelling out to the external toolkit executable.
//!
//! The toolkit reads the interchange model file and writes its own output
//! formats: one plain-text spike file for the whole run, plus one analog
//! state file per population. Both are parsed back by the readers in
//! [`crate::recording::toolkit`].
use log;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::backend::{record_args, Backend, Recording};
use crate::error::SimError;
use crate::model::{interchange_path, Model};
use crate::params::ExperimentParameters;
use crate::recording::{toolkit, Segment, SegmentMap};

/// Environment variable overriding the toolkit executable.
pub const PROGRAM_ENV: &str = "NINEML_TOOLKIT";
const DEFAULT_PROGRAM: &str = "9ml-toolkit";

/// Key under which the toolkit's single spike file is returned.
pub const ALL_SPIKES: &str = "all";

#[derive(Debug, Clone)]
pub struct ToolkitBackend {
    program: PathBuf,
}

impl ToolkitBackend {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        ToolkitBackend {
            program: program.into(),
        }
    }

    pub fn from_env() -> Self {
        let program = std::env::var_os(PROGRAM_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM));
        ToolkitBackend { program }
    }
}

impl Backend for ToolkitBackend {
    fn name(&self) -> &'static str {
        "9mltoolkit"
    }

    fn run(
        &self,
        model: &Model,
        experiment: &ExperimentParameters,
        recording: &Recording,
        output: &Path,
    ) -> Result<SegmentMap, SimError> {
        let model_path = interchange_path(output);
        log::info!("Exporting model to {}", model_path.display());
        model.write(&model_path)?;

        let stem = output.with_extension("");
        let mut command = Command::new(&self.program);
        command
            .arg(&model_path)
            .args(["--duration", &experiment.duration.to_string()])
            .args(["--timestep", &experiment.timestep.to_string()])
            .args(["--seed", &experiment.seed.to_string()])
            .args(record_args(&recording.plan(model)))
            .arg("--output")
            .arg(&stem);

        log::info!("Running {:?}", command);
        let status = command.status().map_err(|e| {
            SimError::ExecutionError(format!(
                "cannot launch toolkit {}: {}",
                self.program.display(),
                e
            ))
        })?;
        if !status.success() {
            return Err(SimError::ExecutionError(format!(
                "toolkit {} exited with {}",
                self.program.display(),
                status
            )));
        }

        collect(&stem)
    }
}

/// Gather the toolkit's output files for a run: `<stem>.dat` with the
/// spikes of every recorded unit, and `<stem>_state.<population>.dat`
/// files with per-population analog traces. An unparseable state file is
/// skipped with a warning; a missing spike file is fatal.
pub fn collect(stem: &Path) -> Result<SegmentMap, SimError> {
    let spike_file = PathBuf::from(format!("{}.dat", stem.display()));
    log::info!("Loading data from {}", spike_file.display());
    let mut segments = SegmentMap::new();
    segments.insert(
        ALL_SPIKES.to_string(),
        toolkit::read_spike_file(&spike_file, ALL_SPIKES)?,
    );

    let state_prefix = format!(
        "{}_state.",
        stem.file_name().and_then(|n| n.to_str()).unwrap_or("")
    );
    let dir = stem.parent().filter(|p| !p.as_os_str().is_empty());
    let entries = std::fs::read_dir(dir.unwrap_or_else(|| Path::new(".")))
        .map_err(|e| SimError::IOError(e.to_string()))?;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !name.starts_with(&state_prefix) || !name.ends_with(".dat") {
            continue;
        }
        let population = name[state_prefix.len()..name.len() - 4].to_string();
        log::info!("Loading data from {}", entry.path().display());
        match toolkit::read_state_file(entry.path(), &["v"], &["mV"]) {
            Ok(signals) => {
                let segment = segments
                    .entry(population.clone())
                    .or_insert_with(|| Segment::new(&population));
                segment.signals.extend(signals);
            }
            Err(e) => log::warn!("Couldn't load data from {}: {}", entry.path().display(), e),
        }
    }
    Ok(segments)
}
