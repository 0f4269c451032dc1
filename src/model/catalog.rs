//! The component catalog used by the network builders.
//!
//! Each constructor returns the declarative description of one dynamics
//! component: the leaky integrate-and-fire cell of the Brunel model, the
//! alpha-shaped synaptic current, the static (fixed-weight) connection, and
//! the stimulus sources.
use crate::model::component::{
    Alias, Assignment, Constant, Dynamics, ParameterDef, Port, Regime, StateVariable,
    TimeDerivative, Transition, Trigger,
};
use crate::params::Dimension;

/// Leaky integrate-and-fire cell with an absolute refractory period.
///
/// Two regimes: subthreshold integration, and a refractory hold entered
/// when `v` crosses `v_threshold` and left once `t` passes `refractory_end`.
pub fn brunel_iaf() -> Dynamics {
    Dynamics {
        name: "BrunelIaF".to_string(),
        parameters: vec![
            ParameterDef {
                name: "tau".to_string(),
                dimension: Dimension::Time,
            },
            ParameterDef {
                name: "v_threshold".to_string(),
                dimension: Dimension::Voltage,
            },
            ParameterDef {
                name: "refractory_period".to_string(),
                dimension: Dimension::Time,
            },
            ParameterDef {
                name: "v_reset".to_string(),
                dimension: Dimension::Voltage,
            },
            ParameterDef {
                name: "R".to_string(),
                dimension: Dimension::Resistance,
            },
        ],
        state_variables: vec![
            StateVariable {
                name: "v".to_string(),
                dimension: Dimension::Voltage,
            },
            StateVariable {
                name: "refractory_end".to_string(),
                dimension: Dimension::Time,
            },
        ],
        regimes: vec![
            Regime {
                name: "subthreshold".to_string(),
                time_derivatives: vec![TimeDerivative {
                    variable: "v".to_string(),
                    rhs: "(-v + R*i_synaptic)/tau".to_string(),
                }],
                transitions: vec![Transition {
                    trigger: Trigger::Condition("v > v_threshold".to_string()),
                    assignments: vec![
                        Assignment {
                            variable: "refractory_end".to_string(),
                            rhs: "t + refractory_period".to_string(),
                        },
                        Assignment {
                            variable: "v".to_string(),
                            rhs: "v_reset".to_string(),
                        },
                    ],
                    output_events: vec!["spike_output".to_string()],
                    target_regime: Some("refractory".to_string()),
                }],
            },
            Regime {
                name: "refractory".to_string(),
                time_derivatives: vec![],
                transitions: vec![Transition {
                    trigger: Trigger::Condition("t > refractory_end".to_string()),
                    assignments: vec![],
                    output_events: vec![],
                    target_regime: Some("subthreshold".to_string()),
                }],
            },
        ],
        aliases: vec![],
        constants: vec![],
        ports: vec![
            Port::analog_send("v", Dimension::Voltage),
            Port::analog_send("refractory_end", Dimension::Time),
            Port::analog_reduce("i_synaptic", "+", Dimension::Current),
            Port::event_send("spike_output"),
        ],
    }
}

/// Alpha-shaped postsynaptic current: a bi-exponential rise and decay
/// driven by incoming spike events.
pub fn alpha_psr() -> Dynamics {
    Dynamics {
        name: "AlphaPSR".to_string(),
        parameters: vec![ParameterDef {
            name: "tau".to_string(),
            dimension: Dimension::Time,
        }],
        state_variables: vec![
            StateVariable {
                name: "a".to_string(),
                dimension: Dimension::Current,
            },
            StateVariable {
                name: "b".to_string(),
                dimension: Dimension::Current,
            },
        ],
        regimes: vec![Regime {
            name: "default".to_string(),
            time_derivatives: vec![
                TimeDerivative {
                    variable: "a".to_string(),
                    rhs: "(b - a)/tau".to_string(),
                },
                TimeDerivative {
                    variable: "b".to_string(),
                    rhs: "-b/tau".to_string(),
                },
            ],
            transitions: vec![Transition {
                trigger: Trigger::OnEvent("spike".to_string()),
                assignments: vec![Assignment {
                    variable: "b".to_string(),
                    rhs: "b + weight".to_string(),
                }],
                output_events: vec![],
                target_regime: None,
            }],
        }],
        aliases: vec![Alias {
            name: "i_synaptic".to_string(),
            rhs: "a".to_string(),
        }],
        constants: vec![],
        ports: vec![
            Port::analog_send("i_synaptic", Dimension::Current),
            Port::analog_send("a", Dimension::Current),
            Port::analog_send("b", Dimension::Current),
            Port::analog_receive("weight", Dimension::Current),
            Port::event_receive("spike"),
        ],
    }
}

/// Fixed synaptic weight, exposed to the response component as a constant
/// analog signal.
pub fn static_connection() -> Dynamics {
    Dynamics {
        name: "StaticConnection".to_string(),
        parameters: vec![],
        state_variables: vec![StateVariable {
            name: "fixed_weight".to_string(),
            dimension: Dimension::Current,
        }],
        regimes: vec![Regime {
            name: "default".to_string(),
            time_derivatives: vec![TimeDerivative {
                variable: "fixed_weight".to_string(),
                rhs: "zero".to_string(),
            }],
            transitions: vec![],
        }],
        aliases: vec![],
        constants: vec![Constant {
            name: "zero".to_string(),
            value: 0.0,
            units: "nA/ms".to_string(),
        }],
        ports: vec![Port::analog_send("fixed_weight", Dimension::Current)],
    }
}

/// Poisson spike source with exponentially distributed inter-event times.
pub fn poisson_source() -> Dynamics {
    Dynamics {
        name: "Poisson".to_string(),
        parameters: vec![ParameterDef {
            name: "rate".to_string(),
            dimension: Dimension::PerTime,
        }],
        state_variables: vec![StateVariable {
            name: "t_next".to_string(),
            dimension: Dimension::Time,
        }],
        regimes: vec![Regime {
            name: "default".to_string(),
            time_derivatives: vec![],
            transitions: vec![Transition {
                trigger: Trigger::Condition("t > t_next".to_string()),
                assignments: vec![Assignment {
                    variable: "t_next".to_string(),
                    rhs: "t + random.exponential(1000/rate)".to_string(),
                }],
                output_events: vec!["spike_output".to_string()],
                target_regime: None,
            }],
        }],
        aliases: vec![],
        constants: vec![],
        ports: vec![Port::event_send("spike_output")],
    }
}

/// Regular spike source firing every `interval` ms, used by the simple
/// feed-forward network.
pub fn tonic_source() -> Dynamics {
    Dynamics {
        name: "Tonic".to_string(),
        parameters: vec![ParameterDef {
            name: "interval".to_string(),
            dimension: Dimension::Time,
        }],
        state_variables: vec![StateVariable {
            name: "t_next".to_string(),
            dimension: Dimension::Time,
        }],
        regimes: vec![Regime {
            name: "default".to_string(),
            time_derivatives: vec![],
            transitions: vec![Transition {
                trigger: Trigger::Condition("t > t_next".to_string()),
                assignments: vec![Assignment {
                    variable: "t_next".to_string(),
                    rhs: "t + interval".to_string(),
                }],
                output_events: vec!["spike_output".to_string()],
                target_regime: None,
            }],
        }],
        aliases: vec![],
        constants: vec![],
        ports: vec![Port::event_send("spike_output")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::component::PortKind;

    #[test]
    fn test_catalog_ports_are_consistent() {
        for dynamics in [
            brunel_iaf(),
            alpha_psr(),
            static_connection(),
            poisson_source(),
            tonic_source(),
        ] {
            for port in &dynamics.ports {
                // analog ports carry a dimension, event ports do not
                assert_eq!(port.dimension.is_none(), port.kind.is_event());
            }
            // every emitted event names a declared send port
            for regime in &dynamics.regimes {
                for transition in &regime.transitions {
                    for event in &transition.output_events {
                        let port = dynamics.port(event).unwrap();
                        assert_eq!(port.kind, PortKind::EventSend);
                    }
                }
            }
        }
    }

    #[test]
    fn test_alpha_psr_receives_weight_and_spikes() {
        let psr = alpha_psr();
        assert!(psr.port("weight").unwrap().kind.receives());
        assert!(psr.port("spike").unwrap().kind.receives());
        assert!(psr.port("i_synaptic").unwrap().kind.sends());
    }
}
