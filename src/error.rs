//! Error types for the simulation.
//!
//! The physics hot path has no recoverable error conditions: degenerate
//! geometry is skipped, near-zero divisions are epsilon-guarded, and extreme
//! velocities are clamped. [`SimError`] covers construction-time validation
//! only (bad configuration, malformed lattice parameters).

use thiserror::Error;

/// Errors that can occur when constructing a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration parameter out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Lattice construction parameters are degenerate.
    #[error("Invalid lattice: {0}")]
    InvalidLattice(String),

    /// Index out of bounds.
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),
}

impl SimError {
    /// Create an invalid config error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid lattice error.
    pub fn invalid_lattice(msg: impl Into<String>) -> Self {
        Self::InvalidLattice(msg.into())
    }

    /// Create an index out of bounds error.
    pub fn index_out_of_bounds(msg: impl Into<String>) -> Self {
        Self::IndexOutOfBounds(msg.into())
    }
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
