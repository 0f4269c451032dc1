//! Error module for the Brunel network experiment library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum SimError {
    /// Error for an unreadable, incomplete or inconsistent parameter file.
    InvalidConfig(String),
    /// Error for a backend selector token that names no known simulator.
    UnknownBackend(String),
    /// Error for an invalid numeric domain, e.g., non-positive time constants.
    InvalidParameter(String),
    /// Error raised while assembling the model graph, e.g., a port connection
    /// referencing a port that does not exist on either endpoint.
    InvalidModel(String),
    /// Error for an invalid connectivity specification, e.g., a fan-in count
    /// exceeding the source population size.
    InvalidConnectivity(String),
    /// Error propagated from an external simulation engine, e.g., a missing
    /// executable or a non-zero exit status.
    ExecutionError(String),
    /// Error for malformed simulator output that cannot be recovered from.
    ParseError(String),
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::InvalidConfig(e) => write!(f, "Invalid configuration: {}", e),
            SimError::UnknownBackend(e) => write!(f, "Unknown backend: {}", e),
            SimError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            SimError::InvalidModel(e) => write!(f, "Invalid model: {}", e),
            SimError::InvalidConnectivity(e) => write!(f, "Invalid connectivity: {}", e),
            SimError::ExecutionError(e) => write!(f, "Execution error: {}", e),
            SimError::ParseError(e) => write!(f, "Parse error: {}", e),
            SimError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for SimError {}
