//! Error types for the DEM engine.
//!
//! Construction and configuration problems are reported through [`DemError`];
//! array-shape preconditions on the hot path are asserted instead (they are
//! programmer errors, fatal and immediate).

use thiserror::Error;

/// Unified error type for the DEM engine.
#[derive(Debug, Error)]
pub enum DemError {
    /// An array does not have the shape the DOF table implies.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The DOF table is malformed (empty, or a DOF index is never referenced).
    #[error("Invalid DOF table: {0}")]
    InvalidDofTable(String),

    /// A pair list references a particle index outside [0, N).
    #[error("Particle index {index} out of range (system has {n} particles)")]
    ParticleOutOfRange { index: usize, n: usize },

    /// A prescribed-DOF index is outside [0, ndof).
    #[error("Prescribed DOF {index} out of range (system has {ndof} DOFs)")]
    DofOutOfRange { index: usize, ndof: usize },

    /// Per-pair parameter vectors do not match the pair list length.
    #[error("Invalid pair parameters: {0}")]
    InvalidPairParameters(String),

    /// Configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, DemError>`.
pub type DemResult<T> = Result<T, DemError>;
