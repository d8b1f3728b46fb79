pub mod simulation;
pub mod configuration;
pub mod export;
pub mod benchmark;
pub mod error;

pub use simulation::dofmap::DofMap;
pub use simulation::forces::{AdhesionPotential, Dashpot, ForceSet, PairLaw, Spring};
pub use simulation::states::{ConvergencePolicy, ParticleSystem, ResidualNorm};
pub use simulation::iterate::StopList;
pub use simulation::integrator::{
    quasi_static_velocity_verlet, quasi_static_velocity_verlet_with_window, velocity_verlet,
};
pub use simulation::params::Parameters;
pub use simulation::engine::Engine;
pub use simulation::scenario::Scenario;

pub use configuration::config::{
    AdhesionConfig, BoundaryConfig, DashpotConfig, DriverConfig, EngineConfig, ParametersConfig,
    ParticleConfig, ResidualConfig, ScenarioConfig, SpringConfig,
};

pub use error::{DemError, DemResult};

pub use export::write::{dump_matrix, dump_vector};

pub use benchmark::benchmark::{bench_assemble, bench_verlet, bench_verlet_pooled};
