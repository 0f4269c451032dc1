//! Populations: named, sized groups of identical dynamical units.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::component::Dynamics;
use crate::params::{Property, PropertySet};

/// A declarative random initial value, realised by the executing backend
/// with the experiment seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RandomInitial {
    Uniform { lower: f64, upper: f64, units: String },
    Exponential { mean: f64, units: String },
}

/// An initial value of one state variable, either fixed or drawn per unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InitialValue {
    Fixed(Property),
    Random(RandomInitial),
}

/// A parameterised instance of a dynamics component: the description plus
/// concrete property values and per-unit initial state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstance {
    /// Short label used to qualify recorded variable names, e.g. "nrn".
    pub label: String,
    pub definition: Dynamics,
    pub properties: PropertySet,
    pub initial_values: BTreeMap<String, InitialValue>,
}

impl ComponentInstance {
    pub fn new(label: &str, definition: Dynamics) -> Self {
        ComponentInstance {
            label: label.to_string(),
            definition,
            properties: PropertySet::new(),
            initial_values: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: f64, units: &str) -> Self {
        self.properties
            .insert(name.to_string(), Property::new(value, units));
        self
    }

    pub fn with_initial(mut self, name: &str, value: f64, units: &str) -> Self {
        self.initial_values.insert(
            name.to_string(),
            InitialValue::Fixed(Property::new(value, units)),
        );
        self
    }

    pub fn with_random_initial(mut self, name: &str, dist: RandomInitial) -> Self {
        self.initial_values
            .insert(name.to_string(), InitialValue::Random(dist));
        self
    }
}

/// A named, sized group of identical units. Created once during model
/// build, immutable thereafter, referenced by projections and recording
/// selectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    pub name: String,
    pub size: usize,
    pub cell: ComponentInstance,
}

impl Population {
    pub fn new(name: &str, size: usize, cell: ComponentInstance) -> Self {
        Population {
            name: name.to_string(),
            size,
            cell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog;

    #[test]
    fn test_component_instance_builder() {
        let cell = ComponentInstance::new("nrn", catalog::brunel_iaf())
            .with_property("tau", 20.0, "ms")
            .with_initial("refractory_end", 0.0, "ms")
            .with_random_initial(
                "v",
                RandomInitial::Uniform {
                    lower: 0.0,
                    upper: 20.0,
                    units: "mV".to_string(),
                },
            );
        assert_eq!(cell.properties["tau"].value, 20.0);
        assert!(matches!(
            cell.initial_values["v"],
            InitialValue::Random(RandomInitial::Uniform { .. })
        ));
        let population = Population::new("Exc", 4000, cell);
        assert_eq!(population.size, 4000);
    }
}
