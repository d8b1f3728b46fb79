//! High-level runtime engine settings
//!
//! Selects the driver (transient or quasi-static), the convergence policy,
//! and the optional assembly thread count used when building and running a
//! `Scenario`

use crate::configuration::config::DriverConfig;
use crate::simulation::states::ConvergencePolicy;

#[derive(Debug, Clone)]
pub struct Engine {
    pub driver: DriverConfig, // transient or quasi-static
    pub policy: ConvergencePolicy, // residual norm + quasi-static reset behavior
    pub threads: Option<usize>, // assembly pool size; None = serial assembly
}
