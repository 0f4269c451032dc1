//! Adapter reconstructing the model with a simulator's native primitives.
//!
//! Instead of exporting the interchange file, this backend translates the
//! population/projection graph into the engine's own script — built-in cell
//! models, native connection rules, recording devices — runs the engine as
//! a subprocess, and normalises its raw recorder rows into segments.
//! Declarative random initial values are realised here, with the
//! experiment seed, so a run is reproducible across engine versions.
use itertools::Itertools;
use log;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use rand_distr::{Distribution, Uniform};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::backend::{sanitize, Backend, RecordSpec, Recording, Variable};
use crate::error::SimError;
use crate::model::population::{InitialValue, Population, RandomInitial};
use crate::model::projection::Projection;
use crate::model::{connectivity::ConnectivityRule, Model};
use crate::params::ExperimentParameters;
use crate::recording::{native, Segment, SegmentMap};

/// Environment variable overriding the Python executable used to drive the
/// engine.
pub const PROGRAM_ENV: &str = "NEST_PYTHON";
const DEFAULT_PROGRAM: &str = "python3";

#[derive(Debug, Clone)]
pub struct NativeBackend {
    program: PathBuf,
}

impl NativeBackend {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        NativeBackend {
            program: program.into(),
        }
    }

    pub fn from_env() -> Self {
        let program = std::env::var_os(PROGRAM_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM));
        NativeBackend { program }
    }

    fn spike_path(stem: &Path, target: &str) -> PathBuf {
        PathBuf::from(format!("{}_{}.spikes.dat", stem.display(), sanitize(target)))
    }

    fn voltage_path(stem: &Path, target: &str) -> PathBuf {
        PathBuf::from(format!("{}_{}.v.dat", stem.display(), sanitize(target)))
    }

    /// Generate the engine script for a model. Public within the crate for
    /// the benefit of the tests; the script is an implementation detail.
    pub(crate) fn script(
        model: &Model,
        experiment: &ExperimentParameters,
        plan: &[RecordSpec],
        stem: &Path,
    ) -> Result<String, SimError> {
        let mut py = String::new();
        let kernel_seed = (experiment.seed % ((1u64 << 31) - 1)).max(1);
        writeln!(py, "import nest").unwrap();
        writeln!(py, "nest.ResetKernel()").unwrap();
        writeln!(
            py,
            "nest.SetKernelStatus({{\"resolution\": {}, \"rng_seed\": {}}})",
            experiment.timestep, kernel_seed
        )
        .unwrap();
        writeln!(py, "pops = {{}}").unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(experiment.seed);
        for population in &model.populations {
            emit_population(&mut py, model, population, experiment, &mut rng)?;
        }
        for projection in &model.projections {
            emit_projection(&mut py, model, projection)?;
        }

        writeln!(py, "recorders = []").unwrap();
        for spec in plan {
            let nodes = nodes_expr(model, &spec.target)?;
            let sample = match spec.sample {
                Some(n) => format!("({})[:{}]", nodes, n),
                None => nodes,
            };
            match spec.variable {
                Variable::Spikes => {
                    let path = Self::spike_path(stem, &spec.target);
                    writeln!(py, "rec = nest.Create(\"spike_recorder\")").unwrap();
                    // should be a random sample
                    writeln!(py, "nest.Connect({}, rec)", sample).unwrap();
                    writeln!(
                        py,
                        "recorders.append((rec, (\"senders\", \"times\"), \"{}\"))",
                        path.display()
                    )
                    .unwrap();
                }
                Variable::Voltage => {
                    let path = Self::voltage_path(stem, &spec.target);
                    writeln!(
                        py,
                        "vm = nest.Create(\"multimeter\", params={{\"record_from\": [\"V_m\"], \"interval\": {}}})",
                        experiment.timestep
                    )
                    .unwrap();
                    writeln!(py, "nest.Connect(vm, {})", sample).unwrap();
                    writeln!(
                        py,
                        "recorders.append((vm, (\"senders\", \"times\", \"V_m\"), \"{}\"))",
                        path.display()
                    )
                    .unwrap();
                }
            }
        }

        writeln!(py, "nest.Simulate({})", experiment.duration).unwrap();
        writeln!(py, "for device, keys, path in recorders:").unwrap();
        writeln!(py, "    events = device.get(\"events\")").unwrap();
        writeln!(py, "    with open(path, \"w\") as fp:").unwrap();
        writeln!(py, "        for row in zip(*(events[k] for k in keys)):").unwrap();
        writeln!(
            py,
            "            fp.write(\" \".join(str(x) for x in row) + \"\\n\")"
        )
        .unwrap();
        Ok(py)
    }
}

/// The script expression for a projection endpoint: a population handle or
/// the concatenation of a selection's members.
fn nodes_expr(model: &Model, name: &str) -> Result<String, SimError> {
    let members = model.resolve_endpoint(name)?;
    Ok(members
        .iter()
        .map(|p| format!("pops[\"{}\"]", p.name))
        .join(" + "))
}

fn emit_population(
    py: &mut String,
    model: &Model,
    population: &Population,
    experiment: &ExperimentParameters,
    rng: &mut ChaCha8Rng,
) -> Result<(), SimError> {
    let cell = &population.cell;
    match cell.definition.name.as_str() {
        "BrunelIaF" => {
            let tau = property(population, "tau")?;
            let r_m = property(population, "R")?;
            // the engine parameterises by capacitance; tau in ms and R in
            // Mohm give C in pF
            let c_m = 1000.0 * tau / r_m;
            writeln!(
                py,
                "pops[\"{}\"] = nest.Create(\"iaf_psc_alpha\", {}, params={{\
                 \"C_m\": {}, \"tau_m\": {}, \"tau_syn_ex\": {}, \"tau_syn_in\": {}, \
                 \"t_ref\": {}, \"E_L\": 0.0, \"V_reset\": {}, \"V_th\": {}}})",
                population.name,
                population.size,
                c_m,
                tau,
                response_tau(model, population)?,
                response_tau(model, population)?,
                property(population, "refractory_period")?,
                property(population, "v_reset")?,
                property(population, "v_threshold")?,
            )
            .unwrap();
            if let Some(InitialValue::Random(RandomInitial::Uniform { lower, upper, .. })) =
                cell.initial_values.get("v")
            {
                let dist = Uniform::new(*lower, *upper);
                let values: Vec<String> = (0..population.size)
                    .map(|_| format!("{:.6}", dist.sample(rng)))
                    .collect();
                writeln!(
                    py,
                    "pops[\"{}\"].set(V_m=[{}])",
                    population.name,
                    values.join(", ")
                )
                .unwrap();
            } else if let Some(InitialValue::Fixed(p)) = cell.initial_values.get("v") {
                writeln!(py, "pops[\"{}\"].set(V_m={})", population.name, p.value).unwrap();
            }
            Ok(())
        }
        "Poisson" => {
            let rate = cell
                .properties
                .get("rate")
                .map(|p| p.value)
                .unwrap_or(0.0);
            writeln!(
                py,
                "pops[\"{}\"] = nest.Create(\"poisson_generator\", {}, params={{\"rate\": {}}})",
                population.name, population.size, rate
            )
            .unwrap();
            Ok(())
        }
        "Tonic" => {
            let interval = property(population, "interval")?;
            let start = match cell.initial_values.get("t_next") {
                Some(InitialValue::Fixed(p)) => p.value,
                _ => interval,
            };
            let times: Vec<String> = std::iter::successors(Some(start), |t| {
                let next = t + interval;
                (next < experiment.duration).then_some(next)
            })
            .map(|t| format!("{:.3}", t))
            .collect();
            writeln!(
                py,
                "pops[\"{}\"] = nest.Create(\"spike_generator\", {}, params={{\"spike_times\": [{}]}})",
                population.name,
                population.size,
                times.join(", ")
            )
            .unwrap();
            Ok(())
        }
        other => Err(SimError::ExecutionError(format!(
            "the native backend has no template for cell type {}",
            other
        ))),
    }
}

fn emit_projection(
    py: &mut String,
    model: &Model,
    projection: &Projection,
) -> Result<(), SimError> {
    if projection.response.definition.name != "AlphaPSR" {
        return Err(SimError::ExecutionError(format!(
            "the native backend has no template for response type {}",
            projection.response.definition.name
        )));
    }
    let weight = match projection.plasticity.initial_values.get("fixed_weight") {
        Some(InitialValue::Fixed(p)) => p.value,
        _ => {
            return Err(SimError::ExecutionError(format!(
                "projection {} has no fixed weight; the native backend only \
                 supports static synapses",
                projection.name
            )))
        }
    };
    let synapse = sanitize(&projection.name);
    writeln!(
        py,
        "nest.CopyModel(\"static_synapse\", \"{}\", {{\"weight\": {}, \"delay\": {}}})",
        synapse, weight, projection.delay.value
    )
    .unwrap();
    let conn_spec = match projection.rule {
        ConnectivityRule::OneToOne => "{\"rule\": \"one_to_one\"}".to_string(),
        ConnectivityRule::AllToAll => "{\"rule\": \"all_to_all\"}".to_string(),
        ConnectivityRule::FixedFanIn { n } => format!(
            "{{\"rule\": \"fixed_indegree\", \"indegree\": {}, \"allow_multapses\": False}}",
            n
        ),
        ConnectivityRule::RandomFanIn { n } => format!(
            "{{\"rule\": \"fixed_indegree\", \"indegree\": {}, \"allow_multapses\": True}}",
            n
        ),
    };
    writeln!(
        py,
        "nest.Connect({}, {}, {}, \"{}\")",
        nodes_expr(model, &projection.source)?,
        nodes_expr(model, &projection.target)?,
        conn_spec,
        synapse
    )
    .unwrap();
    Ok(())
}

fn property(population: &Population, name: &str) -> Result<f64, SimError> {
    population
        .cell
        .properties
        .get(name)
        .map(|p| p.value)
        .ok_or_else(|| {
            SimError::InvalidModel(format!(
                "population {} is missing the {} parameter",
                population.name, name
            ))
        })
}

/// The synapse time constant a population's cells integrate with, taken
/// from the response component of a projection targeting it.
fn response_tau(model: &Model, population: &Population) -> Result<f64, SimError> {
    for projection in &model.projections {
        let targets = model.resolve_endpoint(&projection.target)?;
        if targets.iter().any(|p| p.name == population.name) {
            if let Some(tau) = projection.response.properties.get("tau") {
                return Ok(tau.value);
            }
        }
    }
    Err(SimError::InvalidModel(format!(
        "no projection targeting {} declares a synapse time constant",
        population.name
    )))
}

impl Backend for NativeBackend {
    fn name(&self) -> &'static str {
        "nest"
    }

    fn run(
        &self,
        model: &Model,
        experiment: &ExperimentParameters,
        recording: &Recording,
        output: &Path,
    ) -> Result<SegmentMap, SimError> {
        let stem = output.with_extension("");
        let plan = recording.plan(model);

        log::info!("Building native script for {}", model.name);
        let script = Self::script(model, experiment, &plan, &stem)?;
        let script_path = output.with_extension("py");
        std::fs::write(&script_path, script).map_err(|e| {
            SimError::IOError(format!("cannot write {}: {}", script_path.display(), e))
        })?;

        let mut command = Command::new(&self.program);
        command.arg(&script_path);
        log::info!("Running {:?}", command);
        let status = command.status().map_err(|e| {
            SimError::ExecutionError(format!(
                "cannot launch engine {}: {}",
                self.program.display(),
                e
            ))
        })?;
        if !status.success() {
            return Err(SimError::ExecutionError(format!(
                "engine {} exited with {}",
                self.program.display(),
                status
            )));
        }

        log::info!("Collecting recorded data");
        let mut segments = SegmentMap::new();
        for spec in &plan {
            let segment = segments
                .entry(spec.target.clone())
                .or_insert_with(|| Segment::new(&spec.target));
            match spec.variable {
                Variable::Spikes => {
                    let path = Self::spike_path(&stem, &spec.target);
                    segment.spiketrains = native::read_spike_rows(&path, experiment.duration)?;
                }
                Variable::Voltage => {
                    let path = Self::voltage_path(&stem, &spec.target);
                    segment
                        .signals
                        .push(native::read_multimeter_rows(&path, "v", "mV")?);
                }
            }
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::brunel_network;
    use crate::params::NetworkParameters;

    fn baseline() -> NetworkParameters {
        NetworkParameters {
            order: 50,
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

    fn experiment() -> ExperimentParameters {
        ExperimentParameters {
            duration: 200.0,
            timestep: 0.1,
            seed: 42,
            base_filename: None,
            full_filename: Some("unused".to_string()),
            n_record: 10,
            plot_limits: (0.0, 200.0),
        }
    }

    #[test]
    fn test_script_translates_the_graph() {
        let model = brunel_network(&baseline()).unwrap();
        let experiment = experiment();
        let plan = Recording::Statistics { n_record: 50 }.plan(&model);
        let script =
            NativeBackend::script(&model, &experiment, &plan, Path::new("out/run")).unwrap();

        assert!(script.contains("nest.Create(\"iaf_psc_alpha\", 200,"));
        assert!(script.contains("nest.Create(\"poisson_generator\", 250,"));
        // fixed fan-in maps onto the engine's indegree rule without multapses
        assert!(script
            .contains("{\"rule\": \"fixed_indegree\", \"indegree\": 20, \"allow_multapses\": False}"));
        assert!(script.contains("{\"rule\": \"one_to_one\"}"));
        // the union selection concatenates its members
        assert!(script.contains("pops[\"Exc\"] + pops[\"Inh\"]"));
        assert!(script.contains("nest.Simulate(200)"));
        assert!(script.contains("out/run_All_neurons.spikes.dat"));
    }

    #[test]
    fn test_script_realises_initial_potentials_from_the_seed() {
        let model = brunel_network(&baseline()).unwrap();
        let experiment = experiment();
        let plan = Recording::Figure.plan(&model);
        let script1 =
            NativeBackend::script(&model, &experiment, &plan, Path::new("run")).unwrap();
        let script2 =
            NativeBackend::script(&model, &experiment, &plan, Path::new("run")).unwrap();
        assert_eq!(script1, script2);
        assert!(script1.contains(".set(V_m=["));

        let mut reseeded = experiment;
        reseeded.seed = 43;
        let script3 =
            NativeBackend::script(&model, &reseeded, &plan, Path::new("run")).unwrap();
        assert_ne!(script1, script3);
    }

    #[test]
    fn test_missing_engine_is_execution_error() {
        let model = brunel_network(&baseline()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run.json");
        let backend = NativeBackend::new("/no/such/python");
        assert!(matches!(
            backend.run(&model, &experiment(), &Recording::Figure, &output),
            Err(SimError::ExecutionError(_))
        ));
    }
}
