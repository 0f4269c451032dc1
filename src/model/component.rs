//! Declarative descriptions of unit dynamics.
//!
//! A [`Dynamics`] describes a unit's time-evolution rule without executing
//! it: state variables, parameters, named regimes with continuous-time
//! derivatives, event-triggered transitions, and the ports through which the
//! unit exchanges continuous or discrete signals. Expressions are kept as
//! strings; interpreting them is the executing engine's job.
use serde::{Deserialize, Serialize};

use crate::params::Dimension;

/// A named parameter slot of a dynamics component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub dimension: Dimension,
}

/// A state variable of a dynamics component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVariable {
    pub name: String,
    pub dimension: Dimension,
}

/// A named constant of a dynamics component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub value: f64,
    pub units: String,
}

/// A derived read-only quantity, e.g. `i_synaptic := a`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub rhs: String,
}

/// The direction and nature of a port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortKind {
    AnalogSend,
    AnalogReceive,
    /// Receiving port combining multiple incoming signals, e.g. with `+`.
    AnalogReduce { operator: String },
    EventSend,
    EventReceive,
}

impl PortKind {
    pub fn sends(&self) -> bool {
        matches!(self, PortKind::AnalogSend | PortKind::EventSend)
    }

    pub fn receives(&self) -> bool {
        matches!(
            self,
            PortKind::AnalogReceive | PortKind::AnalogReduce { .. } | PortKind::EventReceive
        )
    }

    pub fn is_event(&self) -> bool {
        matches!(self, PortKind::EventSend | PortKind::EventReceive)
    }
}

/// A named port of a dynamics component. Event ports carry no dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub kind: PortKind,
    pub dimension: Option<Dimension>,
}

impl Port {
    pub fn analog_send(name: &str, dimension: Dimension) -> Self {
        Port {
            name: name.to_string(),
            kind: PortKind::AnalogSend,
            dimension: Some(dimension),
        }
    }

    pub fn analog_receive(name: &str, dimension: Dimension) -> Self {
        Port {
            name: name.to_string(),
            kind: PortKind::AnalogReceive,
            dimension: Some(dimension),
        }
    }

    pub fn analog_reduce(name: &str, operator: &str, dimension: Dimension) -> Self {
        Port {
            name: name.to_string(),
            kind: PortKind::AnalogReduce {
                operator: operator.to_string(),
            },
            dimension: Some(dimension),
        }
    }

    pub fn event_send(name: &str) -> Self {
        Port {
            name: name.to_string(),
            kind: PortKind::EventSend,
            dimension: None,
        }
    }

    pub fn event_receive(name: &str) -> Self {
        Port {
            name: name.to_string(),
            kind: PortKind::EventReceive,
            dimension: None,
        }
    }
}

/// What fires a transition: a boolean condition on the state, or an event
/// arriving on a receive port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Trigger {
    Condition(String),
    OnEvent(String),
}

/// A state assignment performed when a transition fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub variable: String,
    pub rhs: String,
}

/// A discrete event-triggered transition: condition, state updates, emitted
/// events, and an optional regime switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub trigger: Trigger,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub output_events: Vec<String>,
    #[serde(default)]
    pub target_regime: Option<String>,
}

/// A time derivative active within one regime, `d<variable>/dt = <rhs>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDerivative {
    pub variable: String,
    pub rhs: String,
}

/// A named mode of continuous evolution, active until one of its
/// transitions fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regime {
    pub name: String,
    #[serde(default)]
    pub time_derivatives: Vec<TimeDerivative>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

/// A complete dynamics description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dynamics {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    #[serde(default)]
    pub state_variables: Vec<StateVariable>,
    pub regimes: Vec<Regime>,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    #[serde(default)]
    pub constants: Vec<Constant>,
    pub ports: Vec<Port>,
}

impl Dynamics {
    /// Look up a port by name.
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Look up a parameter slot by name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Look up a state variable by name.
    pub fn state_variable(&self, name: &str) -> Option<&StateVariable> {
        self.state_variables.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog;

    #[test]
    fn test_port_lookup() {
        let iaf = catalog::brunel_iaf();
        let port = iaf.port("i_synaptic").unwrap();
        assert!(port.kind.receives());
        assert_eq!(port.dimension, Some(Dimension::Current));
        assert!(iaf.port("no_such_port").is_none());
    }

    #[test]
    fn test_regime_switch_is_declared() {
        let iaf = catalog::brunel_iaf();
        let subthreshold = &iaf.regimes[0];
        let spike = &subthreshold.transitions[0];
        assert_eq!(spike.target_regime.as_deref(), Some("refractory"));
        assert!(spike.output_events.contains(&"spike_output".to_string()));
    }
}
