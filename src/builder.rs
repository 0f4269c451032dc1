//! Network builders: parameter sets in, validated model graphs out.
//!
//! Building is deterministic — no sampling happens here. Random initial
//! states and connectivity are declared, and realised later by the
//! executing backend with the experiment seed.
use log;

use crate::alpha::{external_input_rate, psp_height, threshold_rate};
use crate::error::SimError;
use crate::model::catalog;
use crate::model::connectivity::{fan_in_from_probability, ConnectivityRule};
use crate::model::population::{ComponentInstance, Population, RandomInitial};
use crate::model::projection::{PortConnection, Projection, Role};
use crate::model::{Model, Selection};
use crate::params::{NetworkParameters, Property, SimpleParameters};

/// The name of the selection covering the excitatory and inhibitory
/// populations, used as the target of every projection and by recording.
pub const ALL_NEURONS: &str = "All neurons";

fn alpha_response(tau_syn: f64) -> ComponentInstance {
    ComponentInstance::new("syn", catalog::alpha_psr())
        .with_property("tau", tau_syn, "ms")
        .with_initial("a", 0.0, "nA")
        .with_initial("b", 0.0, "nA")
}

fn static_plasticity(weight: f64) -> ComponentInstance {
    ComponentInstance::new("plast", catalog::static_connection())
        .with_initial("fixed_weight", weight, "nA")
}

fn synaptic_wiring() -> Vec<PortConnection> {
    vec![
        PortConnection::new(Role::Plasticity, Role::Response, "fixed_weight", "weight"),
        PortConnection::new(Role::Source, Role::Response, "spike_output", "spike"),
        PortConnection::new(Role::Response, Role::Destination, "i_synaptic", "i_synaptic"),
    ]
}

/// Build the Brunel (2000) network: an excitatory and an inhibitory
/// population of integrate-and-fire cells with alpha synapses, driven by a
/// lumped external Poisson source, with fixed fan-in recurrent
/// connectivity.
pub fn brunel_network(params: &NetworkParameters) -> Result<Model, SimError> {
    let ne = 4 * params.order;
    let ni = params.order;
    if ne == 0 {
        return Err(SimError::InvalidParameter(
            "The network order must be positive".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&params.epsilon) {
        return Err(SimError::InvalidParameter(format!(
            "The connection probability must lie in [0, 1] (got {})",
            params.epsilon
        )));
    }
    let ce = fan_in_from_probability(params.epsilon, ne);
    let ci = fan_in_from_probability(params.epsilon, ni);
    let c_ext = ce;

    // EPSP amplitude (mV) -> synaptic current weight (nA)
    let j_unit = psp_height(params.tau, params.r, params.tau_syn)?;
    let j_exc = params.j / j_unit;
    let j_inh = -params.g * j_exc;
    let j_ext = j_exc;

    let nu_thresh = threshold_rate(params.theta, params.j, ce, params.tau)?;
    let input_rate = external_input_rate(params.eta, nu_thresh, c_ext);
    log::debug!(
        "Derived quantities: Ce = {}, Ci = {}, Je = {:.4} nA, Ji = {:.4} nA, input rate = {:.1} Hz",
        ce,
        ci,
        j_exc,
        j_inh,
        input_rate
    );

    let cell = ComponentInstance::new("nrn", catalog::brunel_iaf())
        .with_property("tau", params.tau, "ms")
        .with_property("v_threshold", params.theta, "mV")
        .with_property("refractory_period", params.tau_refrac, "ms")
        .with_property("v_reset", params.v_reset, "mV")
        .with_property("R", params.r, "Mohm")
        .with_random_initial(
            "v",
            RandomInitial::Uniform {
                lower: 0.0,
                upper: params.theta,
                units: "mV".to_string(),
            },
        )
        .with_initial("refractory_end", 0.0, "ms");

    let mut stim = ComponentInstance::new("stim", catalog::poisson_source())
        .with_property("rate", input_rate, "Hz");
    // eta = 0 leaves the source silent; its first event is pushed past any
    // simulated duration instead of drawn from a degenerate distribution
    stim = if input_rate > 0.0 {
        stim.with_random_initial(
            "t_next",
            RandomInitial::Exponential {
                mean: 1000.0 / input_rate,
                units: "ms".to_string(),
            },
        )
    } else {
        stim.with_initial("t_next", 1e12, "ms")
    };

    let model = Model {
        name: "BrunelCaseC".to_string(),
        populations: vec![
            Population::new("Exc", ne, cell.clone()),
            Population::new("Inh", ni, cell),
            Population::new("Ext", ne + ni, stim),
        ],
        selections: vec![Selection::new(ALL_NEURONS, &["Exc", "Inh"])],
        projections: vec![
            Projection {
                name: "External".to_string(),
                source: "Ext".to_string(),
                target: ALL_NEURONS.to_string(),
                rule: ConnectivityRule::OneToOne,
                response: alpha_response(params.tau_syn),
                plasticity: static_plasticity(j_ext),
                port_connections: synaptic_wiring(),
                delay: Property::new(params.delay, "ms"),
            },
            Projection {
                name: "Excitation".to_string(),
                source: "Exc".to_string(),
                target: ALL_NEURONS.to_string(),
                rule: ConnectivityRule::FixedFanIn { n: ce },
                response: alpha_response(params.tau_syn),
                plasticity: static_plasticity(j_exc),
                port_connections: synaptic_wiring(),
                delay: Property::new(params.delay, "ms"),
            },
            Projection {
                name: "Inhibition".to_string(),
                source: "Inh".to_string(),
                target: ALL_NEURONS.to_string(),
                rule: ConnectivityRule::FixedFanIn { n: ci },
                response: alpha_response(params.tau_syn),
                plasticity: static_plasticity(j_inh),
                port_connections: synaptic_wiring(),
                delay: Property::new(params.delay, "ms"),
            },
        ],
    };
    model.validate()?;
    Ok(model)
}

/// Build the simple feed-forward network: a regular stimulus population
/// driving one excitatory population through alpha synapses.
pub fn simple_network(params: &SimpleParameters) -> Result<Model, SimError> {
    if params.n == 0 {
        return Err(SimError::InvalidParameter(
            "The population size must be positive".to_string(),
        ));
    }
    if params.interval <= 0.0 {
        return Err(SimError::InvalidParameter(format!(
            "The stimulus interval must be positive (got {})",
            params.interval
        )));
    }

    let cell = ComponentInstance::new("nrn", catalog::brunel_iaf())
        .with_property("tau", params.tau, "ms")
        .with_property("v_threshold", params.theta, "mV")
        .with_property("refractory_period", params.tau_refrac, "ms")
        .with_property("v_reset", params.v_reset, "mV")
        .with_property("R", params.r, "Mohm")
        .with_initial("v", params.v_reset, "mV")
        .with_initial("refractory_end", 0.0, "ms");

    let stim = ComponentInstance::new("stim", catalog::tonic_source())
        .with_property("interval", params.interval, "ms")
        .with_initial("t_next", 10.0, "ms");

    let model = Model {
        name: "SimpleNetwork".to_string(),
        populations: vec![
            Population::new("Exc", params.n, cell),
            Population::new("Ext", params.n, stim),
        ],
        selections: vec![],
        projections: vec![Projection {
            name: "External".to_string(),
            source: "Ext".to_string(),
            target: "Exc".to_string(),
            rule: ConnectivityRule::OneToOne,
            response: alpha_response(params.tau_syn),
            plasticity: static_plasticity(params.weight),
            port_connections: synaptic_wiring(),
            delay: Property::new(params.delay, "ms"),
        }],
    };
    model.validate()?;
    Ok(model)
}
