//! Build fully-initialized simulation scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a runtime bundle
//! containing:
//! - engine settings (`Engine`)
//! - numerical parameters (`Parameters`)
//! - the particle system at t = 0 with its force laws, boundary
//!   conditions, external forces, and convergence policy attached
//!
//! The bundle is consumed by the driver loops in `main` and by the
//! benchmark helpers

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::configuration::config::{ResidualConfig, ScenarioConfig};
use crate::error::{DemError, DemResult};
use crate::simulation::engine::Engine;
use crate::simulation::forces::{AdhesionPotential, Dashpot, Spring};
use crate::simulation::params::Parameters;
use crate::simulation::states::{ConvergencePolicy, ParticleSystem, ResidualNorm};

/// A fully-initialized simulation scenario
///
/// This is the main "runtime bundle" constructed from a `ScenarioConfig`:
/// it contains the engine settings, numerical parameters, and the particle
/// system ready to be advanced by the integrator
pub struct Scenario {
    pub engine: Engine,
    pub parameters: Parameters,
    pub system: ParticleSystem,
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> DemResult<Self> {
        let n = cfg.particles.len();
        if n == 0 {
            return Err(DemError::InvalidConfig("scenario has no particles".into()));
        }

        // spatial dimension from the first particle; everything else must agree
        let ndim = cfg.particles[0].x.len();
        for (i, p) in cfg.particles.iter().enumerate() {
            if p.x.len() != ndim {
                return Err(DemError::InvalidConfig(format!(
                    "particle {i} has {} position components, expected {ndim}",
                    p.x.len()
                )));
            }
        }
        if cfg.dofs.len() != n || cfg.dofs.iter().any(|row| row.len() != ndim) {
            return Err(DemError::InvalidConfig(format!(
                "DOF table must be {n}x{ndim} to match the particles"
            )));
        }

        // particles: map config entries -> position matrix and mass vector
        let x = DMatrix::from_fn(n, ndim, |r, c| cfg.particles[r].x[c]);
        let m = DVector::from_fn(n, |r, _| cfg.particles[r].m);
        let dofs = DMatrix::from_fn(n, ndim, |r, c| cfg.dofs[r][c]);

        // convergence policy from the engine section
        let policy = ConvergencePolicy {
            residual: match cfg.engine.residual {
                ResidualConfig::Kinetic => ResidualNorm::KineticEnergy,
                ResidualConfig::Force => ResidualNorm::ForceBalance,
            },
            zero_on_converge: cfg.engine.zero_on_converge,
        };

        // particle system at t = 0
        let mut system = ParticleSystem::new(m, x, dofs)?.with_policy(policy);

        // caller-supplied assembly pool
        if let Some(threads) = cfg.engine.threads {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| DemError::InvalidConfig(format!("thread pool: {e}")))?;
            system = system.with_pool(Arc::new(pool));
        }

        // force laws: group the per-pair config entries into one law each
        if !cfg.springs.is_empty() {
            let pairs = cfg.springs.iter().map(|s| s.pair).collect();
            let k = cfg.springs.iter().map(|s| s.k).collect();
            let d0 = cfg.springs.iter().map(|s| s.d0).collect();
            system.attach(Spring::new(pairs, k, d0)?)?;
        }
        if !cfg.dashpots.is_empty() {
            let pairs = cfg.dashpots.iter().map(|d| d.pair).collect();
            let eta = cfg.dashpots.iter().map(|d| d.eta).collect();
            system.attach(Dashpot::new(pairs, eta)?)?;
        }
        if !cfg.adhesions.is_empty() {
            let pairs = cfg.adhesions.iter().map(|a| a.pair).collect();
            let k = cfg.adhesions.iter().map(|a| a.k).collect();
            let b = cfg.adhesions.iter().map(|a| a.b).collect();
            let r0 = cfg.adhesions.iter().map(|a| a.r0).collect();
            let e = cfg.adhesions.iter().map(|a| a.e).collect();
            system.attach(AdhesionPotential::new(pairs, k, b, r0, e)?)?;
        }

        // prescribed velocities
        if let Some(bc) = &cfg.boundary {
            system.fix_v(bc.dofs.clone(), DVector::from_vec(bc.velocities.clone()))?;
        }

        // external forces
        if let Some(fext) = &cfg.external_forces {
            if fext.len() != n || fext.iter().any(|row| row.len() != ndim) {
                return Err(DemError::InvalidConfig(format!(
                    "external forces must be {n}x{ndim} to match the particles"
                )));
            }
            system.set_fext(DMatrix::from_fn(n, ndim, |r, c| fext[r][c]))?;
        }

        let parameters = Parameters {
            dt: cfg.parameters.dt,
            t_end: cfg.parameters.t_end,
            tol: cfg.parameters.tol,
            ncheck: cfg.parameters.ncheck,
        };

        let engine = Engine {
            driver: cfg.engine.driver,
            policy,
            threads: cfg.engine.threads,
        };

        Ok(Self {
            engine,
            parameters,
            system,
        })
    }
}
