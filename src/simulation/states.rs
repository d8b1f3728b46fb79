//! Core state container for the particle assembly.
//!
//! [`ParticleSystem`] owns positions, velocities, accelerations, masses,
//! external forces, the DOF table, the prescribed-velocity boundary
//! conditions, and the attached force laws. It exposes the quantities the
//! integrator needs in both particle space [N, ndim] and DOF space [ndof],
//! and tracks simulation time plus a residual history for the quasi-static
//! convergence check.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::error::{DemError, DemResult};
use crate::simulation::dofmap::DofMap;
use crate::simulation::forces::{ForceSet, PairLaw};
use crate::simulation::iterate::StopList;

/// Which scalar residual feeds the convergence window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResidualNorm {
    /// Kinetic energy over free DOFs: res = sum of 1/2 M_i V_i^2 with
    /// prescribed DOFs zeroed first.
    #[default]
    KineticEnergy,
    /// Sum of absolute assembled internal forces, divided by the sum of
    /// absolute assembled external forces when the latter is nonzero.
    ForceBalance,
}

/// Convergence behavior, injected at construction instead of baked into
/// divergent state-container variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergencePolicy {
    pub residual: ResidualNorm,
    /// Re-zero velocity and acceleration when convergence is declared, so the
    /// next quasi-static loading increment starts from rest.
    pub zero_on_converge: bool,
}

/// Particle assembly state plus the machinery to evaluate it in DOF space.
pub struct ParticleSystem {
    // conversion between particle space and DOF space
    dofmap: DofMap,

    // particles
    x: DMatrix<f64>,    // position       [N, ndim]
    v: DMatrix<f64>,    // velocity       [N, ndim]
    a: DMatrix<f64>,    // acceleration   [N, ndim]
    m: DVector<f64>,    // mass           [N]
    fext: DMatrix<f64>, // external force [N, ndim]

    // prescribed DOFs
    iip: Vec<usize>,  // DOF-numbers         [np]
    vp: DVector<f64>, // prescribed velocity [np]

    // DOF values
    mass_dofs: DVector<f64>, // mass            [ndof]
    mass_inv: DVector<f64>,  // inverse of mass [ndof]

    // constitutive laws
    forces: ForceSet,

    // time & convergence check
    t: f64,
    residuals: StopList,
    policy: ConvergencePolicy,

    // caller-supplied execution context for the assembly reduction
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl ParticleSystem {
    /// Build a system from masses [N], initial positions [N, ndim], and the
    /// DOF table [N, ndim].
    ///
    /// The DOF table is validated (see [`DofMap::new`]); velocity and
    /// acceleration start at zero; DOF-space mass and its inverse are
    /// precomputed once here because the table never changes.
    pub fn new(m: DVector<f64>, x: DMatrix<f64>, dofs: DMatrix<usize>) -> DemResult<Self> {
        let dofmap = DofMap::new(dofs)?;

        if x.nrows() != dofmap.n() || x.ncols() != dofmap.ndim() {
            return Err(DemError::ShapeMismatch(format!(
                "position is {}x{} but the DOF table implies {}x{}",
                x.nrows(),
                x.ncols(),
                dofmap.n(),
                dofmap.ndim()
            )));
        }
        if m.len() != dofmap.n() {
            return Err(DemError::ShapeMismatch(format!(
                "mass has {} entries for {} particles",
                m.len(),
                dofmap.n()
            )));
        }

        let mass_dofs = dofmap.as_dofs_scalar(&m);
        let mass_inv = mass_dofs.map(f64::recip);

        let (n, ndim) = (dofmap.n(), dofmap.ndim());

        Ok(Self {
            dofmap,
            v: DMatrix::zeros(n, ndim),
            a: DMatrix::zeros(n, ndim),
            fext: DMatrix::zeros(n, ndim),
            x,
            m,
            iip: Vec::new(),
            vp: DVector::zeros(0),
            mass_dofs,
            mass_inv,
            forces: ForceSet::new(),
            t: 0.0,
            residuals: StopList::default(),
            policy: ConvergencePolicy::default(),
            pool: None,
        })
    }

    /// Select the convergence policy (kinetic-energy residual without
    /// quasi-static reset is the default).
    pub fn with_policy(mut self, policy: ConvergencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the assembly reduction on `pool` instead of serially.
    pub fn with_pool(mut self, pool: Arc<rayon::ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    // ------------------------------------------------------------------
    // topology mutators
    // ------------------------------------------------------------------

    /// Attach a constitutive law.
    ///
    /// A pair list referencing a particle index >= N is a configuration
    /// error and is rejected here, before the first force evaluation.
    pub fn attach(&mut self, law: impl PairLaw + 'static) -> DemResult<()> {
        if let Some(max) = law.max_particle() {
            if max >= self.dofmap.n() {
                return Err(DemError::ParticleOutOfRange {
                    index: max,
                    n: self.dofmap.n(),
                });
            }
        }
        self.forces.push(Box::new(law));
        Ok(())
    }

    /// Prescribe the velocity of the DOFs `iip` to the values `vp`.
    pub fn fix_v(&mut self, iip: Vec<usize>, vp: DVector<f64>) -> DemResult<()> {
        if iip.len() != vp.len() {
            return Err(DemError::ShapeMismatch(format!(
                "{} prescribed DOFs but {} prescribed values",
                iip.len(),
                vp.len()
            )));
        }
        for &i in &iip {
            if i >= self.dofmap.ndof() {
                return Err(DemError::DofOutOfRange {
                    index: i,
                    ndof: self.dofmap.ndof(),
                });
            }
        }
        self.iip = iip;
        self.vp = vp;
        Ok(())
    }

    /// Set the external force per particle [N, ndim].
    pub fn set_fext(&mut self, pvector: DMatrix<f64>) -> DemResult<()> {
        if pvector.nrows() != self.dofmap.n() || pvector.ncols() != self.dofmap.ndim() {
            return Err(DemError::ShapeMismatch(format!(
                "external force is {}x{} but the system is {}x{}",
                pvector.nrows(),
                pvector.ncols(),
                self.dofmap.n(),
                self.dofmap.ndim()
            )));
        }
        self.fext = pvector;
        Ok(())
    }

    // ------------------------------------------------------------------
    // particle-space views
    // ------------------------------------------------------------------

    pub fn x(&self) -> &DMatrix<f64> {
        &self.x
    }

    pub fn v(&self) -> &DMatrix<f64> {
        &self.v
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn m(&self) -> &DVector<f64> {
        &self.m
    }

    pub fn fext(&self) -> &DMatrix<f64> {
        &self.fext
    }

    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn dofmap(&self) -> &DofMap {
        &self.dofmap
    }

    /// Net internal force per particle [N, ndim]: the sum of all attached
    /// constitutive laws evaluated at the current position and velocity.
    pub fn f(&self) -> DMatrix<f64> {
        let mut f = DMatrix::zeros(self.dofmap.n(), self.dofmap.ndim());
        self.forces.accumulate(&self.x, &self.v, &mut f);
        f
    }

    // ------------------------------------------------------------------
    // DOF-space views
    // ------------------------------------------------------------------

    pub fn dofs_v(&self) -> DVector<f64> {
        self.dofmap.as_dofs(&self.v)
    }

    pub fn dofs_a(&self) -> DVector<f64> {
        self.dofmap.as_dofs(&self.a)
    }

    pub fn dofs_m(&self) -> DVector<f64> {
        self.dofmap.as_dofs_scalar(&self.m)
    }

    /// Assembled net internal force [ndof]; coincident DOFs accumulate the
    /// contributions of every particle sharing them.
    pub fn dofs_f(&self) -> DVector<f64> {
        self.assemble(&self.f())
    }

    // ------------------------------------------------------------------
    // particle-space setters (shape-asserted)
    // ------------------------------------------------------------------

    pub fn set_x(&mut self, pvector: DMatrix<f64>) {
        self.assert_particle_shape(&pvector);
        self.x = pvector;
    }

    pub fn set_v(&mut self, pvector: DMatrix<f64>) {
        self.assert_particle_shape(&pvector);
        self.v = pvector;
    }

    pub fn set_a(&mut self, pvector: DMatrix<f64>) {
        self.assert_particle_shape(&pvector);
        self.a = pvector;
    }

    /// Store velocities from a DOF vector [ndof].
    ///
    /// Prescribed DOFs are overwritten with their boundary values before the
    /// vector is broadcast back to particle space, so a prescribed velocity
    /// survives every integrator sub-step.
    pub fn set_v_dofs(&mut self, dofval: &DVector<f64>) {
        assert_eq!(dofval.len(), self.dofmap.ndof(), "DOF vector must have length ndof");

        let mut vdof = dofval.clone();
        for (&i, &value) in self.iip.iter().zip(self.vp.iter()) {
            vdof[i] = value;
        }
        self.v = self.dofmap.as_particle(&vdof);
    }

    /// Store accelerations from a DOF vector [ndof]; prescribed DOFs are
    /// forced to zero acceleration before broadcasting.
    pub fn set_a_dofs(&mut self, dofval: &DVector<f64>) {
        assert_eq!(dofval.len(), self.dofmap.ndof(), "DOF vector must have length ndof");

        let mut adof = dofval.clone();
        for &i in &self.iip {
            adof[i] = 0.0;
        }
        self.a = self.dofmap.as_particle(&adof);
    }

    // ------------------------------------------------------------------
    // solving, time, convergence
    // ------------------------------------------------------------------

    /// DOF-space acceleration: assembled internal plus external force,
    /// divided component-wise by the DOF-space mass. Prescribed DOFs come
    /// back with zero acceleration.
    pub fn solve(&self) -> DVector<f64> {
        let mut acc = self
            .assemble(&(self.f() + &self.fext))
            .component_mul(&self.mass_inv);
        for &i in &self.iip {
            acc[i] = 0.0;
        }
        acc
    }

    /// Advance the simulation time only.
    pub fn timestep(&mut self, dt: f64) {
        self.t += dt;
    }

    /// Forget the residual history (start of a quasi-static run).
    pub fn reset(&mut self) {
        self.residuals.reset();
    }

    /// Forget the residual history and change the check-window length.
    pub fn reset_with(&mut self, ncheck: usize) {
        self.residuals.reset_with(ncheck);
    }

    /// Feed the policy residual into the convergence window and report
    /// whether the assembly is at rest.
    ///
    /// With `zero_on_converge` set, a converged system also has its velocity
    /// and acceleration cleared for the next loading increment.
    pub fn stop(&mut self, tol: f64) -> bool {
        let res = match self.policy.residual {
            ResidualNorm::KineticEnergy => {
                let mut vdof = self.dofs_v();
                // prescribed DOFs do not count as motion
                for &i in &self.iip {
                    vdof[i] = 0.0;
                }
                0.5 * vdof
                    .iter()
                    .zip(self.mass_dofs.iter())
                    .map(|(v, m)| m * v * v)
                    .sum::<f64>()
            }
            ResidualNorm::ForceBalance => {
                let fint: f64 = self.dofs_f().iter().map(|f| f.abs()).sum();
                let fext: f64 = self.assemble(&self.fext).iter().map(|f| f.abs()).sum();
                if fext != 0.0 { fint / fext } else { fint }
            }
        };

        let converged = self.residuals.stop(res, tol);

        if converged && self.policy.zero_on_converge {
            self.v.fill(0.0);
            self.a.fill(0.0);
        }

        converged
    }

    // assembly, on the installed pool when one was supplied
    fn assemble(&self, pvector: &DMatrix<f64>) -> DVector<f64> {
        match &self.pool {
            Some(pool) => self.dofmap.assemble_dofs_on(pool, pvector),
            None => self.dofmap.assemble_dofs(pvector),
        }
    }

    fn assert_particle_shape(&self, pvector: &DMatrix<f64>) {
        assert_eq!(pvector.nrows(), self.dofmap.n(), "particle vector must have N rows");
        assert_eq!(
            pvector.ncols(),
            self.dofmap.ndim(),
            "particle vector must have ndim columns"
        );
    }
}
