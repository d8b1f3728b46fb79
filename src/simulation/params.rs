//! Numerical parameters for the simulation
//!
//! `Parameters` holds runtime settings:
//! - integration step size and end time (transient runs),
//! - residual tolerance and check-window size (quasi-static runs)

#[derive(Debug, Clone)]
pub struct Parameters {
    pub dt: f64, // step size
    pub t_end: f64, // time end (transient driver)
    pub tol: f64, // residual tolerance (quasi-static driver)
    pub ncheck: usize, // residuals retained by the convergence window
}
