//! Adapter for engines that interpret the interchange model file directly.
//!
//! The model graph is serialised next to the run's output file and handed
//! to the interpreter executable together with the run parameters and the
//! recording selection. The interpreter writes its recordings in the
//! persisted-result format, which is loaded back verbatim.
use log;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::backend::{record_args, Backend, Recording};
use crate::error::SimError;
use crate::model::{interchange_path, Model};
use crate::params::ExperimentParameters;
use crate::recording::{load_segments, SegmentMap};

/// Environment variable overriding the interpreter executable.
pub const PROGRAM_ENV: &str = "NINEML_RUN";
const DEFAULT_PROGRAM: &str = "nineml-run";

#[derive(Debug, Clone)]
pub struct InterpreterBackend {
    program: PathBuf,
}

impl InterpreterBackend {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        InterpreterBackend {
            program: program.into(),
        }
    }

    pub fn from_env() -> Self {
        let program = std::env::var_os(PROGRAM_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM));
        InterpreterBackend { program }
    }
}

impl Backend for InterpreterBackend {
    fn name(&self) -> &'static str {
        "nineml"
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

        let raw_path = output.with_extension("raw.json");
        let mut command = Command::new(&self.program);
        command
            .arg(&model_path)
            .args(["--duration", &experiment.duration.to_string()])
            .args(["--timestep", &experiment.timestep.to_string()])
            .args(["--seed", &experiment.seed.to_string()])
            .args(record_args(&recording.plan(model)))
            .arg("--output")
            .arg(&raw_path);

        log::info!("Running {:?}", command);
        let status = command.status().map_err(|e| {
            SimError::ExecutionError(format!(
                "cannot launch interpreter {}: {}",
                self.program.display(),
                e
            ))
        })?;
        if !status.success() {
            return Err(SimError::ExecutionError(format!(
                "interpreter {} exited with {}",
                self.program.display(),
                status
            )));
        }

        log::info!("Collecting data from {}", raw_path.display());
        load_segments(&raw_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Recording;
    use crate::builder::simple_network;
    use crate::params::SimpleParameters;

    fn experiment() -> ExperimentParameters {
        ExperimentParameters {
            duration: 100.0,
            timestep: 0.1,
            seed: 42,
            base_filename: None,
            full_filename: Some("unused".to_string()),
            n_record: 10,
            plot_limits: (0.0, 100.0),
        }
    }

    #[test]
    fn test_missing_executable_is_execution_error() {
        let params = SimpleParameters {
            n: 10,
            weight: 0.1,
            delay: 1.5,
            theta: 20.0,
            tau: 20.0,
            tau_syn: 0.1,
            tau_refrac: 2.0,
            v_reset: 10.0,
            r: 1.5,
            interval: 5.0,
        };
        let model = simple_network(&params).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run.json");
        let backend = InterpreterBackend::new("/no/such/interpreter");
        match backend.run(&model, &experiment(), &Recording::Figure, &output) {
            Err(SimError::ExecutionError(msg)) => assert!(msg.contains("launch")),
            other => panic!("expected execution error, got {:?}", other),
        }
        // the interchange file was still exported before the launch failed
        assert!(dir.path().join("run.model.json").exists());
    }
}
