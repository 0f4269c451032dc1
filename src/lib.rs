//! This crate defines the Brunel (2000) cortical network model (and a
//! simplified feed-forward variant) as a declarative component graph, and
//! orchestrates its execution through external simulation engines.
//!
//! The numerical work — integrating the neuron and synapse dynamics,
//! delivering spikes, generating connectivity — is done by the engines.
//! This crate builds the model description, dispatches it to a backend
//! selected at runtime, normalises whatever the engine recorded into
//! simulator-independent segments, persists and reloads them, and computes
//! summary statistics and figures. A sweep driver fans single runs out as
//! throttled subprocess batches.
//!
//! # Building a model
//!
//! ```rust
//! use brunel_snn::builder::brunel_network;
//! use brunel_snn::params::NetworkParameters;
//!
//! let params = NetworkParameters {
//!     order: 250,
//!     epsilon: 0.1,
//!     delay: 1.5,
//!     j: 0.1,
//!     theta: 20.0,
//!     tau: 20.0,
//!     tau_syn: 0.5,
//!     tau_refrac: 2.0,
//!     v_reset: 10.0,
//!     r: 1.5,
//!     g: 5.0,
//!     eta: 2.0,
//! };
//!
//! // Three populations: 4:1 excitatory/inhibitory, plus the external drive
//! let model = brunel_network(&params).unwrap();
//! assert_eq!(model.population("Exc").unwrap().size, 1000);
//! assert_eq!(model.population("Inh").unwrap().size, 250);
//! assert_eq!(model.populations.len(), 3);
//! ```
//!
//! # Running an experiment
//!
//! A backend is selected by its token and drives its engine as a
//! subprocess, so executing a model requires the engine to be installed:
//!
//! ```rust,no_run
//! use brunel_snn::backend::{backend_for, Backend, Recording};
//! # use brunel_snn::builder::brunel_network;
//! # use brunel_snn::params::Parameters;
//! # use std::path::Path;
//!
//! let parameters = Parameters::from_file("parameters.json").unwrap();
//! let model = brunel_network(&parameters.network).unwrap();
//! let backend = backend_for("nest").unwrap();
//! let data = backend
//!     .run(
//!         &model,
//!         &parameters.experiment,
//!         &Recording::Statistics { n_record: 50 },
//!         Path::new("results/run.json"),
//!     )
//!     .unwrap();
//! ```

pub mod alpha;
pub mod analysis;
pub mod backend;
pub mod builder;
pub mod error;
pub mod model;
pub mod params;
pub mod plot;
pub mod recording;
pub mod sweep;
