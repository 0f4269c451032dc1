//! Projections: the synaptic pathways between populations.
use serde::{Deserialize, Serialize};

use crate::model::connectivity::ConnectivityRule;
use crate::model::population::ComponentInstance;
use crate::params::Property;

/// The endpoints a port connection can name within a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// The cell dynamics of the source population.
    Source,
    /// The cell dynamics of the destination population (or of every member
    /// of a destination selection).
    Destination,
    /// The synaptic response component of the projection.
    Response,
    /// The weight/delay-determining component of the projection.
    Plasticity,
}

/// One wire of the projection graph: a send port on one endpoint feeding a
/// receive port on another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConnection {
    pub sender: Role,
    pub receiver: Role,
    pub send_port: String,
    pub receive_port: String,
}

impl PortConnection {
    pub fn new(sender: Role, receiver: Role, send_port: &str, receive_port: &str) -> Self {
        PortConnection {
            sender,
            receiver,
            send_port: send_port.to_string(),
            receive_port: receive_port.to_string(),
        }
    }
}

/// A projection binds a source and a destination, a connectivity rule, a
/// synaptic response component, a plasticity component, and the explicit
/// port connections wiring them together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub name: String,
    /// Name of the source population.
    pub source: String,
    /// Name of the destination population or selection.
    pub target: String,
    pub rule: ConnectivityRule,
    pub response: ComponentInstance,
    pub plasticity: ComponentInstance,
    pub port_connections: Vec<PortConnection>,
    /// Spike propagation delay (ms).
    pub delay: Property,
}
