//! Fixed-step time integration for the particle assembly
//!
//! Provides the explicit predictor-corrector velocity-Verlet step and the
//! quasi-static driver that repeats it until the residual history of a
//! [`ParticleSystem`](crate::simulation::states::ParticleSystem) signals
//! mechanical rest

use crate::simulation::states::ParticleSystem;

/// Advance the system by one step using predictor-corrector velocity-Verlet.
///
/// Because the dashpot force depends on velocity, a single-pass Verlet is
/// not accurate enough: the velocity update is corrected twice, each pass
/// recomputing the acceleration from the freshly estimated velocity. Two
/// passes is a fixed choice, a bounded-error approximation rather than an
/// iteration run to convergence.
///
/// Prescribed velocities are re-imposed by `set_v_dofs`/`set_a_dofs` after
/// every update, before the next force evaluation consumes them.
pub fn velocity_verlet(sys: &mut ParticleSystem, dt: f64) {
    // history at time t_n
    let v_n = sys.dofs_v();
    let a_n = sys.dofs_a();

    // (1) new positions: x_{n+1} = x_n + dt * v_n + 1/2 * dt^2 * a_n
    sys.set_x(sys.x() + sys.v() * dt + sys.a() * (0.5 * dt * dt));

    // (2a) estimate new velocity
    // - predict: v_{n+1} ~ v_n + dt * a_n
    let v = &v_n + &a_n * dt;
    sys.set_v_dofs(&v);
    // - solve for accelerations at the predicted state
    let a = sys.solve();
    // - correct: v_{n+1} = v_n + 1/2 * dt * (a_n + a_{n+1})
    let v = &v_n + (&a_n + &a) * (0.5 * dt);
    sys.set_v_dofs(&v);

    // (2b) new velocity: one more corrector pass with the updated velocity
    let a = sys.solve();
    let v = &v_n + (&a_n + &a) * (0.5 * dt);
    sys.set_v_dofs(&v);

    // (3) new accelerations at the final state
    let a = sys.solve();
    sys.set_a_dofs(&a);

    // process time-step
    sys.timestep(dt);
}

/// Step until all particles have come to rest; returns the iteration count.
///
/// The loop is unbounded by construction: it runs until the convergence
/// window of the system's residual history is satisfied. A caller that needs
/// a safety cap must count iterations externally (e.g. by alternating
/// [`velocity_verlet`] with [`ParticleSystem::stop`] itself).
pub fn quasi_static_velocity_verlet(sys: &mut ParticleSystem, dt: f64, tol: f64) -> u64 {
    // forget residuals from any previous run
    sys.reset();

    let mut iiter: u64 = 0;

    loop {
        iiter += 1;
        velocity_verlet(sys, dt);
        if sys.stop(tol) {
            return iiter;
        }
    }
}

/// Same as [`quasi_static_velocity_verlet`] with a custom check-window size.
///
/// Useful when different physical regimes need different smoothing: the
/// residual history is resized to hold the `ncheck` most recent values
/// before the run starts.
pub fn quasi_static_velocity_verlet_with_window(
    sys: &mut ParticleSystem,
    dt: f64,
    tol: f64,
    ncheck: usize,
) -> u64 {
    sys.reset_with(ncheck.max(1));

    let mut iiter: u64 = 0;

    loop {
        iiter += 1;
        velocity_verlet(sys, dt);
        if sys.stop(tol) {
            return iiter;
        }
    }
}
