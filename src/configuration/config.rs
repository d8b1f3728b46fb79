//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! simulation scenario. A scenario consists of:
//!
//! - [`EngineConfig`]     – global engine options (driver, residual, threads)
//! - [`ParametersConfig`] – numerical parameters
//! - [`ParticleConfig`]   – initial state and mass for each particle
//! - the DOF table, pair-law tables, and boundary conditions
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//! An example 2D scenario YAML matching these types:
//!
//! ```yaml
//! engine:
//!   driver: "quasistatic"     # or "transient"
//!   residual: "kinetic"       # or "force"
//!   zero_on_converge: false
//!   threads: 4                # optional; omit for serial assembly
//!
//! parameters:
//!   dt: 1.0e-2                # fixed step size
//!   t_end: 10.0               # total time (transient driver)
//!   tol: 1.0e-9               # residual tolerance (quasi-static driver)
//!   ncheck: 20                # residuals retained by the convergence window
//!
//! particles:
//!   - { x: [0.0, 0.0], m: 1.0 }
//!   - { x: [2.0, 0.0], m: 1.0 }
//!
//! dofs:                       # DOF index per (particle, component)
//!   - [0, 1]
//!   - [2, 3]
//!
//! springs:
//!   - { pair: [0, 1], k: 1.0, d0: 1.0 }
//!
//! dashpots:
//!   - { pair: [0, 1], eta: 0.1 }
//!
//! adhesions:
//!   - { pair: [0, 1], k: 1.0, b: 0.5, r0: 1.0, e: 0.1 }
//!
//! boundary:                   # optional prescribed-velocity DOFs
//!   dofs: [0, 1]
//!   velocities: [0.0, 0.0]
//!
//! external_forces:            # optional, [N, ndim]
//!   - [0.0, 0.0]
//!   - [0.1, 0.0]
//! ```
//!
//! The engine then maps this configuration into its internal runtime scenario
//! representation, which may use different structs optimized for performance.

use serde::Deserialize;

/// Which driver loop the engine runs
/// driver: "transient" or "quasistatic"
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverConfig {
    #[serde(rename = "transient")] // fixed number of steps: run until t_end
    Transient,

    #[serde(rename = "quasistatic")] // step until the residual window signals rest
    QuasiStatic,
}

/// Which residual feeds the convergence window
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualConfig {
    #[serde(rename = "kinetic")] // kinetic energy over free DOFs
    Kinetic,

    #[serde(rename = "force")] // |internal force| normalized by |external force|
    Force,
}

/// High-level engine configuration
/// Controls the structure of the simulation
#[derive(Deserialize, Debug)]
pub struct EngineConfig {
    pub driver: DriverConfig, // driver loop advancing the system
    pub residual: ResidualConfig, // residual fed into the convergence check
    #[serde(default)]
    pub zero_on_converge: bool, // re-zero v and a when convergence is declared
    pub threads: Option<usize>, // worker threads for the assembly reduction
}

/// Global numerical parameters for a scenario
#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    pub dt: f64,      // step size
    pub t_end: f64,   // time end (transient driver)
    pub tol: f64,     // residual tolerance (quasi-static driver)
    pub ncheck: usize, // check-window size
}

/// Configuration for a single particle's initial state
#[derive(Deserialize, Debug)]
pub struct ParticleConfig {
    pub x: Vec<f64>, // initial position in simulation units
    pub m: f64,      // mass of the particle
}

/// One spring entry of the pair table
#[derive(Deserialize, Debug)]
pub struct SpringConfig {
    pub pair: [usize; 2], // particle indices
    pub k: f64,           // stiffness
    pub d0: f64,          // relaxed length
}

/// One dashpot entry of the pair table
#[derive(Deserialize, Debug)]
pub struct DashpotConfig {
    pub pair: [usize; 2], // particle indices
    pub eta: f64,         // damping constant
}

/// One adhesion entry of the pair table
#[derive(Deserialize, Debug)]
pub struct AdhesionConfig {
    pub pair: [usize; 2], // particle indices
    pub k: f64,           // tail stiffness
    pub b: f64,           // maximal adhesive force
    pub r0: f64,          // equilibrium length
    pub e: f64,           // well depth
}

/// Prescribed-velocity boundary conditions in DOF space
#[derive(Deserialize, Debug)]
pub struct BoundaryConfig {
    pub dofs: Vec<usize>,       // prescribed DOF indices
    pub velocities: Vec<f64>,   // prescribed velocity per DOF
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug)]
pub struct ScenarioConfig {
    pub engine: EngineConfig, // engine-level configuration (driver, residual, threads)
    pub parameters: ParametersConfig, // global numerical parameters
    pub particles: Vec<ParticleConfig>, // initial state of every particle
    pub dofs: Vec<Vec<usize>>, // DOF table [N, ndim]
    #[serde(default)]
    pub springs: Vec<SpringConfig>, // spring pair table
    #[serde(default)]
    pub dashpots: Vec<DashpotConfig>, // dashpot pair table
    #[serde(default)]
    pub adhesions: Vec<AdhesionConfig>, // adhesion pair table
    pub boundary: Option<BoundaryConfig>, // prescribed velocities, if any
    pub external_forces: Option<Vec<Vec<f64>>>, // external force [N, ndim], if any
}
