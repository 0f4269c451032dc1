//! Experiment parameter files and physical quantities.
//!
//! A parameter file is a JSON document with two groups, `network` and
//! `experiment`. Every key consumed downstream must be present: missing or
//! unknown keys are a configuration error, never silently defaulted.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::SimError;

/// Model parameters of the Brunel (2000) network.
///
/// Units are fixed by convention: times in ms, voltages in mV, resistances
/// in Mohm; `order`, `epsilon`, `g` and `eta` are dimensionless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkParameters {
    /// Scales the size of the network: Ne = 4 * order, Ni = 1 * order.
    pub order: usize,
    /// Connection probability.
    pub epsilon: f64,
    /// Global synaptic delay (ms).
    pub delay: f64,
    /// EPSP amplitude (mV).
    #[serde(rename = "J")]
    pub j: f64,
    /// Firing threshold (mV).
    pub theta: f64,
    /// Membrane time constant (ms).
    pub tau: f64,
    /// Synapse time constant (ms).
    pub tau_syn: f64,
    /// Refractory period (ms).
    pub tau_refrac: f64,
    /// Post-spike reset potential (mV).
    pub v_reset: f64,
    /// Membrane resistance (Mohm).
    #[serde(rename = "R")]
    pub r: f64,
    /// Relative strength of inhibitory synapses.
    pub g: f64,
    /// Relative external drive, nu_ext / nu_thresh.
    pub eta: f64,
}

/// Parameters of a single experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentParameters {
    /// Simulated duration (ms).
    pub duration: f64,
    /// Integration timestep (ms).
    pub timestep: f64,
    /// Seed for all random sampling (initial states, connectivity).
    pub seed: u64,
    /// Base name for generated output files; a timestamp is appended.
    #[serde(default)]
    pub base_filename: Option<String>,
    /// Full output path; takes precedence over `base_filename`.
    #[serde(default)]
    pub full_filename: Option<String>,
    /// Number of units to record, sampled from the union of the excitatory
    /// and inhibitory populations.
    pub n_record: usize,
    /// Time axis limits for figures (ms).
    pub plot_limits: (f64, f64),
}

impl ExperimentParameters {
    /// Resolve the output path for this run: `full_filename` verbatim when
    /// given, otherwise base filename, label and timestamp.
    pub fn output_path(&self, label: &str) -> Result<PathBuf, SimError> {
        match (&self.full_filename, &self.base_filename) {
            (Some(full), _) => Ok(PathBuf::from(full)),
            (None, Some(base)) => {
                let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
                Ok(PathBuf::from(format!("{}_{}_{}.json", base, label, stamp)))
            }
            (None, None) => Err(SimError::InvalidConfig(
                "one of full_filename or base_filename is required".to_string(),
            )),
        }
    }
}

/// One experiment configuration, as loaded from a parameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parameters {
    pub network: NetworkParameters,
    pub experiment: ExperimentParameters,
}

impl Parameters {
    /// Load a parameter file. An unreadable file, a missing key or an
    /// unknown key is a configuration error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Parameters, SimError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            SimError::InvalidConfig(format!("cannot open {}: {}", path.display(), e))
        })?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| {
            SimError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SimError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            SimError::IOError(format!("cannot create {}: {}", path.display(), e))
        })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| SimError::IOError(e.to_string()))
    }
}

/// Parameters of the simple feed-forward network (a periodic stimulus
/// population driving one excitatory population).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimpleParameters {
    /// Size of both populations.
    #[serde(rename = "N")]
    pub n: usize,
    /// Synaptic weight (nA).
    pub weight: f64,
    /// Synaptic delay (ms).
    pub delay: f64,
    /// Firing threshold (mV).
    pub theta: f64,
    /// Membrane time constant (ms).
    pub tau: f64,
    /// Synapse time constant (ms).
    pub tau_syn: f64,
    /// Refractory period (ms).
    pub tau_refrac: f64,
    /// Post-spike reset potential (mV).
    pub v_reset: f64,
    /// Membrane resistance (Mohm).
    #[serde(rename = "R")]
    pub r: f64,
    /// Stimulus firing interval (ms).
    pub interval: f64,
}

/// A physical quantity: a value tagged with its units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub value: f64,
    pub units: String,
}

impl Property {
    pub fn new(value: f64, units: &str) -> Self {
        Property {
            value,
            units: units.to_string(),
        }
    }

    /// The physical dimension of this quantity, if its units are known.
    pub fn dimension(&self) -> Option<Dimension> {
        Dimension::of_units(&self.units)
    }
}

/// An ordered name -> quantity mapping, attached to component instances.
pub type PropertySet = BTreeMap<String, Property>;

/// Physical dimensions used by the dynamics components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    Voltage,
    Current,
    Time,
    Resistance,
    /// Rates, 1/time.
    PerTime,
    Dimensionless,
}

impl Dimension {
    /// Map a unit symbol to its dimension. Unknown symbols yield `None`,
    /// which downstream validation reports as an incompatible unit.
    pub fn of_units(units: &str) -> Option<Dimension> {
        match units {
            "mV" | "V" => Some(Dimension::Voltage),
            "nA" | "pA" => Some(Dimension::Current),
            "ms" | "s" => Some(Dimension::Time),
            "Mohm" | "ohm" => Some(Dimension::Resistance),
            "Hz" | "1/ms" => Some(Dimension::PerTime),
            "" | "dimensionless" => Some(Dimension::Dimensionless),
            _ => None,
        }
    }
}
