//! The declarative model layer.
//!
//! A model is a closed graph of immutable value objects: populations of
//! dynamical units, selections naming groups of populations, and
//! projections wiring populations together through explicit port
//! connections. Nothing here is executed; backends either serialise the
//! graph to the interchange format or translate it into an engine's native
//! primitives.
//!
//! Validity is established by a single post-construction pass
//! ([`Model::validate`]) checking that every reference resolves and every
//! connected pair of ports agrees in direction and dimension.
pub mod catalog;
pub mod component;
pub mod connectivity;
pub mod population;
pub mod projection;

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SimError;
use crate::model::component::Dynamics;
use crate::model::population::{ComponentInstance, InitialValue, Population};
use crate::model::projection::{Projection, Role};
use crate::params::Dimension;

/// A named union of populations, usable as a projection target and as a
/// recording selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub name: String,
    pub members: Vec<String>,
}

impl Selection {
    pub fn new(name: &str, members: &[&str]) -> Self {
        Selection {
            name: name.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// The aggregate of all populations and projections for one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub populations: Vec<Population>,
    pub selections: Vec<Selection>,
    pub projections: Vec<Projection>,
}

impl Model {
    pub fn population(&self, name: &str) -> Option<&Population> {
        self.populations.iter().find(|p| p.name == name)
    }

    pub fn selection(&self, name: &str) -> Option<&Selection> {
        self.selections.iter().find(|s| s.name == name)
    }

    /// The populations a projection endpoint name resolves to: the
    /// population itself, or every member of a selection.
    pub fn resolve_endpoint(&self, name: &str) -> Result<Vec<&Population>, SimError> {
        if let Some(population) = self.population(name) {
            return Ok(vec![population]);
        }
        if let Some(selection) = self.selection(name) {
            return selection
                .members
                .iter()
                .map(|member| {
                    self.population(member).ok_or_else(|| {
                        SimError::InvalidModel(format!(
                            "Selection {} names unknown population {}",
                            selection.name, member
                        ))
                    })
                })
                .collect();
        }
        Err(SimError::InvalidModel(format!(
            "Projection endpoint {} names no population or selection",
            name
        )))
    }

    /// Total number of units an endpoint name covers.
    pub fn endpoint_size(&self, name: &str) -> Result<usize, SimError> {
        Ok(self.resolve_endpoint(name)?.iter().map(|p| p.size).sum())
    }

    /// Validate the whole graph: unique names, resolvable references,
    /// send-to-receive port connections with matching dimensions, property
    /// sets compatible with their component definitions, and connectivity
    /// counts within bounds. Build errors surface here, before any
    /// simulation resource is consumed.
    pub fn validate(&self) -> Result<(), SimError> {
        let mut seen = std::collections::BTreeSet::new();
        for population in &self.populations {
            if !seen.insert(population.name.clone()) {
                return Err(SimError::InvalidModel(format!(
                    "Duplicate population name {}",
                    population.name
                )));
            }
            check_instance(&population.cell, &population.name)?;
        }
        for selection in &self.selections {
            if !seen.insert(selection.name.clone()) {
                return Err(SimError::InvalidModel(format!(
                    "Selection {} clashes with an existing name",
                    selection.name
                )));
            }
            for member in &selection.members {
                if self.population(member).is_none() {
                    return Err(SimError::InvalidModel(format!(
                        "Selection {} names unknown population {}",
                        selection.name, member
                    )));
                }
            }
        }

        for projection in &self.projections {
            self.validate_projection(projection)?;
        }
        Ok(())
    }

    fn validate_projection(&self, projection: &Projection) -> Result<(), SimError> {
        let sources = self.resolve_endpoint(&projection.source)?;
        let targets = self.resolve_endpoint(&projection.target)?;
        let n_source = sources.iter().map(|p| p.size).sum();
        let n_target = targets.iter().map(|p| p.size).sum();
        projection.rule.check(n_source, n_target)?;

        check_instance(&projection.response, &projection.name)?;
        check_instance(&projection.plasticity, &projection.name)?;

        if projection.delay.dimension() != Some(Dimension::Time) || projection.delay.value < 0.0 {
            return Err(SimError::InvalidModel(format!(
                "Projection {} has an invalid delay ({} {})",
                projection.name, projection.delay.value, projection.delay.units
            )));
        }

        for connection in &projection.port_connections {
            let send_definitions = self.role_definitions(projection, connection.sender, &sources, &targets);
            let receive_definitions =
                self.role_definitions(projection, connection.receiver, &sources, &targets);

            let mut send_dimension = None;
            for definition in &send_definitions {
                let port = definition.port(&connection.send_port).ok_or_else(|| {
                    SimError::InvalidModel(format!(
                        "Projection {}: component {} has no port {}",
                        projection.name, definition.name, connection.send_port
                    ))
                })?;
                if !port.kind.sends() {
                    return Err(SimError::InvalidModel(format!(
                        "Projection {}: port {} of {} cannot send",
                        projection.name, connection.send_port, definition.name
                    )));
                }
                send_dimension = Some(port.dimension);
            }
            for definition in &receive_definitions {
                let port = definition.port(&connection.receive_port).ok_or_else(|| {
                    SimError::InvalidModel(format!(
                        "Projection {}: component {} has no port {}",
                        projection.name, definition.name, connection.receive_port
                    ))
                })?;
                if !port.kind.receives() {
                    return Err(SimError::InvalidModel(format!(
                        "Projection {}: port {} of {} cannot receive",
                        projection.name, connection.receive_port, definition.name
                    )));
                }
                if Some(port.dimension) != send_dimension {
                    return Err(SimError::InvalidModel(format!(
                        "Projection {}: dimension mismatch between ports {} and {}",
                        projection.name, connection.send_port, connection.receive_port
                    )));
                }
            }
        }
        Ok(())
    }

    fn role_definitions<'a>(
        &self,
        projection: &'a Projection,
        role: Role,
        sources: &[&'a Population],
        targets: &[&'a Population],
    ) -> Vec<&'a Dynamics> {
        match role {
            Role::Source => sources.iter().map(|p| &p.cell.definition).collect(),
            Role::Destination => targets.iter().map(|p| &p.cell.definition).collect(),
            Role::Response => vec![&projection.response.definition],
            Role::Plasticity => vec![&projection.plasticity.definition],
        }
    }

    /// Write the model graph to the interchange file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), SimError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            SimError::IOError(format!("cannot create {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SimError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SimError::IOError(e.to_string()))
    }

    /// Read a model graph back from an interchange file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Model, SimError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            SimError::IOError(format!("cannot open {}: {}", path.display(), e))
        })?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| {
            SimError::ParseError(format!("cannot parse model {}: {}", path.display(), e))
        })
    }
}

/// The interchange file for a run: the output path with its extension
/// replaced by the model extension.
pub fn interchange_path(output: &Path) -> PathBuf {
    let mut path = output.to_path_buf();
    path.set_extension("model.json");
    path
}

/// Check that every property of an instance names a declared parameter
/// with a compatible unit, and every initial value a declared state
/// variable.
fn check_instance(instance: &ComponentInstance, owner: &str) -> Result<(), SimError> {
    let definition = &instance.definition;
    for (name, property) in &instance.properties {
        let parameter = definition.parameter(name).ok_or_else(|| {
            SimError::InvalidModel(format!(
                "{}: component {} has no parameter {}",
                owner, definition.name, name
            ))
        })?;
        if property.dimension() != Some(parameter.dimension) {
            return Err(SimError::InvalidModel(format!(
                "{}: parameter {} of {} expects {:?}, got units {}",
                owner, name, definition.name, parameter.dimension, property.units
            )));
        }
    }
    for (name, initial) in &instance.initial_values {
        let variable = definition.state_variable(name).ok_or_else(|| {
            SimError::InvalidModel(format!(
                "{}: component {} has no state variable {}",
                owner, definition.name, name
            ))
        })?;
        let units = match initial {
            InitialValue::Fixed(property) => &property.units,
            InitialValue::Random(population::RandomInitial::Uniform { units, .. }) => units,
            InitialValue::Random(population::RandomInitial::Exponential { units, .. }) => units,
        };
        if Dimension::of_units(units) != Some(variable.dimension) {
            return Err(SimError::InvalidModel(format!(
                "{}: initial value of {} in {} has incompatible units {}",
                owner, name, definition.name, units
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::connectivity::ConnectivityRule;
    use crate::model::population::ComponentInstance;
    use crate::model::projection::{PortConnection, Projection};
    use crate::params::Property;

    fn two_population_model() -> Model {
        let cell = ComponentInstance::new("nrn", catalog::brunel_iaf())
            .with_property("tau", 20.0, "ms")
            .with_property("v_threshold", 20.0, "mV")
            .with_property("refractory_period", 2.0, "ms")
            .with_property("v_reset", 10.0, "mV")
            .with_property("R", 1.5, "Mohm");
        let stim = ComponentInstance::new("stim", catalog::poisson_source())
            .with_property("rate", 1000.0, "Hz");
        let response = ComponentInstance::new("syn", catalog::alpha_psr())
            .with_property("tau", 0.5, "ms")
            .with_initial("a", 0.0, "nA")
            .with_initial("b", 0.0, "nA");
        let plasticity = ComponentInstance::new("plast", catalog::static_connection())
            .with_initial("fixed_weight", 3.0, "nA");
        Model {
            name: "test".to_string(),
            populations: vec![
                Population::new("Exc", 10, cell),
                Population::new("Ext", 10, stim),
            ],
            selections: vec![],
            projections: vec![Projection {
                name: "External".to_string(),
                source: "Ext".to_string(),
                target: "Exc".to_string(),
                rule: ConnectivityRule::OneToOne,
                response,
                plasticity,
                port_connections: vec![
                    PortConnection::new(Role::Plasticity, Role::Response, "fixed_weight", "weight"),
                    PortConnection::new(Role::Response, Role::Destination, "i_synaptic", "i_synaptic"),
                    PortConnection::new(Role::Source, Role::Response, "spike_output", "spike"),
                ],
                delay: Property::new(1.5, "ms"),
            }],
        }
    }

    #[test]
    fn test_valid_model_passes() {
        two_population_model().validate().unwrap();
    }

    #[test]
    fn test_dangling_port_is_rejected() {
        let mut model = two_population_model();
        model.projections[0].port_connections[0].send_port = "no_such_port".to_string();
        match model.validate() {
            Err(SimError::InvalidModel(msg)) => assert!(msg.contains("no_such_port")),
            other => panic!("expected model error, got {:?}", other),
        }
    }

    #[test]
    fn test_direction_must_be_send_to_receive() {
        let mut model = two_population_model();
        // i_synaptic on the destination is a receive port; it cannot send
        model.projections[0].port_connections[1] =
            PortConnection::new(Role::Destination, Role::Response, "i_synaptic", "weight");
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut model = two_population_model();
        // voltage send port wired into a current receive port
        model.projections[0].port_connections[0] =
            PortConnection::new(Role::Destination, Role::Response, "v", "weight");
        match model.validate() {
            Err(SimError::InvalidModel(msg)) => assert!(msg.contains("mismatch")),
            other => panic!("expected dimension mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_endpoint_is_rejected() {
        let mut model = two_population_model();
        model.projections[0].target = "Nowhere".to_string();
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_oversized_fan_in_is_rejected() {
        let mut model = two_population_model();
        model.projections[0].rule = ConnectivityRule::FixedFanIn { n: 11 };
        assert!(matches!(
            model.validate(),
            Err(SimError::InvalidConnectivity(_))
        ));
    }

    #[test]
    fn test_incompatible_property_units_are_rejected() {
        let mut model = two_population_model();
        model.populations[0]
            .cell
            .properties
            .insert("tau".to_string(), Property::new(20.0, "mV"));
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_interchange_path_substitutes_extension() {
        assert_eq!(
            interchange_path(Path::new("results/run_ab12.json")),
            PathBuf::from("results/run_ab12.model.json")
        );
        assert_eq!(
            interchange_path(Path::new("brunel_network_alpha")),
            PathBuf::from("brunel_network_alpha.model.json")
        );
    }

    #[test]
    fn test_interchange_round_trip() {
        let model = two_population_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        model.write(&path).unwrap();
        let read_back = Model::from_file(&path).unwrap();
        assert_eq!(read_back, model);
    }
}
