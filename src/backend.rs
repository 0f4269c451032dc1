//! Simulator backends.
//!
//! Every supported engine sits behind the same capability interface: take a
//! validated model, execute it for the experiment duration, and hand back
//! per-population segments. The concrete adapter is selected once at
//! startup from a runtime token; an unknown token is a configuration
//! error, and any engine failure (missing executable, non-zero exit)
//! propagates as an execution error with no partial results.
pub mod interpreter;
pub mod native;
pub mod toolkit;

use std::path::Path;

use crate::builder::ALL_NEURONS;
use crate::error::SimError;
use crate::model::Model;
use crate::params::ExperimentParameters;
use crate::recording::SegmentMap;

/// The variables a recording selector can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    Spikes,
    Voltage,
}

/// One recording selector: a target population or selection, a variable,
/// and an optional sample size (`None` records every unit).
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSpec {
    pub target: String,
    pub variable: Variable,
    pub sample: Option<usize>,
}

/// What to record during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Recording {
    /// The visualization scheme: a fixed sample of stimulus spike sources,
    /// and per cell population a spike sample plus a few voltage traces.
    Figure,
    /// The statistics scheme: spikes from a fixed total sample drawn from
    /// the union of the cell populations.
    Statistics { n_record: usize },
}

impl Recording {
    /// Expand the scheme into concrete selectors for a model. Populations
    /// without an input port are stimulus sources and get the larger spike
    /// sample and no voltage trace.
    pub fn plan(&self, model: &Model) -> Vec<RecordSpec> {
        match self {
            Recording::Figure => {
                let mut specs = Vec::new();
                for population in &model.populations {
                    let is_stimulus = population.cell.definition.port("i_synaptic").is_none();
                    if is_stimulus {
                        specs.push(RecordSpec {
                            target: population.name.clone(),
                            variable: Variable::Spikes,
                            sample: Some(100.min(population.size)),
                        });
                    } else {
                        specs.push(RecordSpec {
                            target: population.name.clone(),
                            variable: Variable::Spikes,
                            sample: Some(50.min(population.size)),
                        });
                        specs.push(RecordSpec {
                            target: population.name.clone(),
                            variable: Variable::Voltage,
                            sample: Some(3.min(population.size)),
                        });
                    }
                }
                specs
            }
            Recording::Statistics { n_record } => {
                let target = if model.selection(ALL_NEURONS).is_some() {
                    ALL_NEURONS.to_string()
                } else {
                    // fall back to the first cell population
                    model
                        .populations
                        .iter()
                        .find(|p| p.cell.definition.port("i_synaptic").is_some())
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| "Exc".to_string())
                };
                vec![RecordSpec {
                    target,
                    variable: Variable::Spikes,
                    sample: Some(*n_record),
                }]
            }
        }
    }
}

/// Render recording selectors as command-line arguments for engines driven
/// through an external executable.
pub fn record_args(plan: &[RecordSpec]) -> Vec<String> {
    let mut args = Vec::new();
    for spec in plan {
        let variable = match spec.variable {
            Variable::Spikes => "spikes",
            Variable::Voltage => "v",
        };
        let selector = match spec.sample {
            Some(n) => format!("{}:{}:{}", spec.target, variable, n),
            None => format!("{}:{}", spec.target, variable),
        };
        args.push("--record".to_string());
        args.push(selector);
    }
    args
}

/// A file-system friendly form of a target name.
pub fn sanitize(target: &str) -> String {
    target
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// The capability interface every simulator adapter implements.
pub trait Backend {
    /// The backend selector token this adapter answers to.
    fn name(&self) -> &'static str;

    /// Execute a model for the experiment duration with the given
    /// recording selection. `output` is the run's result path; adapters
    /// derive their scratch files (interchange file, native scripts, raw
    /// engine output) from it.
    fn run(
        &self,
        model: &Model,
        experiment: &ExperimentParameters,
        recording: &Recording,
        output: &Path,
    ) -> Result<SegmentMap, SimError>;
}

/// Resolve a backend selector token, once, at startup.
pub fn backend_for(token: &str) -> Result<Box<dyn Backend>, SimError> {
    match token {
        "nineml" => Ok(Box::new(interpreter::InterpreterBackend::from_env())),
        "nest" => Ok(Box::new(native::NativeBackend::from_env())),
        "9mltoolkit" => Ok(Box::new(toolkit::ToolkitBackend::from_env())),
        other => Err(SimError::UnknownBackend(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::brunel_network;
    use crate::params::NetworkParameters;

    fn baseline() -> NetworkParameters {
        NetworkParameters {
            order: 250,
            epsilon: 0.1,
            delay: 1.5,
            j: 0.1,
            theta: 20.0,
            tau: 20.0,
            tau_syn: 0.5,
            tau_refrac: 2.0,
            v_reset: 10.0,
            r: 1.5,
            g: 5.0,
            eta: 2.0,
        }
    }

    #[test]
    fn test_unknown_backend_token() {
        assert!(matches!(
            backend_for("pyNN.imaginary"),
            Err(SimError::UnknownBackend(_))
        ));
        assert!(backend_for("nest").is_ok());
        assert!(backend_for("nineml").is_ok());
        assert!(backend_for("9mltoolkit").is_ok());
    }

    #[test]
    fn test_figure_plan() {
        let model = brunel_network(&baseline()).unwrap();
        let plan = Recording::Figure.plan(&model);
        // spikes for all three populations, voltages for the two cell ones
        assert_eq!(plan.len(), 5);
        let stim = plan.iter().find(|s| s.target == "Ext").unwrap();
        assert_eq!(stim.sample, Some(100));
        assert_eq!(stim.variable, Variable::Spikes);
        let voltages: Vec<_> = plan
            .iter()
            .filter(|s| s.variable == Variable::Voltage)
            .collect();
        assert_eq!(voltages.len(), 2);
        assert!(voltages.iter().all(|s| s.sample == Some(3)));
    }

    #[test]
    fn test_statistics_plan_targets_the_union() {
        let model = brunel_network(&baseline()).unwrap();
        let plan = Recording::Statistics { n_record: 500 }.plan(&model);
        assert_eq!(
            plan,
            vec![RecordSpec {
                target: ALL_NEURONS.to_string(),
                variable: Variable::Spikes,
                sample: Some(500),
            }]
        );
    }

    #[test]
    fn test_record_args() {
        let plan = vec![
            RecordSpec {
                target: "Exc".to_string(),
                variable: Variable::Spikes,
                sample: Some(50),
            },
            RecordSpec {
                target: "Exc".to_string(),
                variable: Variable::Voltage,
                sample: None,
            },
        ];
        assert_eq!(
            record_args(&plan),
            vec!["--record", "Exc:spikes:50", "--record", "Exc:v"]
        );
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("All neurons"), "All_neurons");
        assert_eq!(sanitize("Exc"), "Exc");
    }
}
