//! Pairwise constitutive force laws
//!
//! Defines the [`PairLaw`] trait plus the concrete laws:
//! - [`Spring`]            – linear elastic, driven by position
//! - [`Dashpot`]           – viscous damping, driven by velocity
//! - [`AdhesionPotential`] – short-range repulsion with an adhesive tail
//!
//! Each law implements [`PairLaw`] and a [`ForceSet`] sums their
//! contributions into a single per-particle force array

use nalgebra::{DMatrix, DVector};

use crate::error::{DemError, DemResult};

/// A pairwise force law operating on particle state.
///
/// Implementations add their contribution into `f` for each particle; the
/// caller supplies both position and velocity so position-driven and
/// velocity-driven laws share one seam.
pub trait PairLaw: Send + Sync {
    /// Accumulate this law's forces into `f` [N, ndim].
    fn accumulate(&self, x: &DMatrix<f64>, v: &DMatrix<f64>, f: &mut DMatrix<f64>);

    /// Per-particle count of pairs referencing it. Independent of geometry,
    /// usable as a structural sanity check.
    fn coordination(&self, n_particles: usize) -> DVector<usize>;

    /// Largest particle index referenced by the pair list, if any.
    fn max_particle(&self) -> Option<usize>;
}

/// Collection of pairwise force laws (springs, dashpots, adhesion)
/// Each law implements [`PairLaw`] and their contributions are summed
/// into a single force array per particle
pub struct ForceSet {
    laws: Vec<Box<dyn PairLaw>>,
}

impl ForceSet {
    /// Create an empty force set
    pub fn new() -> Self {
        Self { laws: Vec::new() }
    }

    /// Add a force law
    pub fn with<T>(mut self, law: T) -> Self
    where
        T: PairLaw + 'static,
    {
        self.laws.push(Box::new(law));
        self
    }

    /// Add a boxed force law
    pub fn push(&mut self, law: Box<dyn PairLaw>) {
        self.laws.push(law);
    }

    /// Compute the net force on all particles
    /// - `out` is zeroed, then every law adds its contribution
    pub fn accumulate(&self, x: &DMatrix<f64>, v: &DMatrix<f64>, out: &mut DMatrix<f64>) {
        out.fill(0.0);
        for law in &self.laws {
            law.accumulate(x, v, out);
        }
    }
}

impl Default for ForceSet {
    fn default() -> Self {
        Self::new()
    }
}

// helpers shared by the concrete laws below
fn pair_histogram(pairs: &[[usize; 2]], n_particles: usize) -> DVector<usize> {
    let mut c = DVector::zeros(n_particles);
    for &[i, j] in pairs {
        c[i] += 1;
        c[j] += 1;
    }
    c
}

fn pair_max(pairs: &[[usize; 2]]) -> Option<usize> {
    pairs.iter().map(|&[i, j]| i.max(j)).max()
}

// =========================================================================================
// Spring
// =========================================================================================

/// Linear elastic spring between particle pairs.
///
/// For pair (i, j) with stiffness `k` and relaxed length `d0`:
/// d = x_j - x_i, D = |d|, and the force k (D - d0) d/D pulls i toward j
/// when the spring is stretched. Singular at D = 0: coincident pair
/// positions are a precondition violation.
pub struct Spring {
    pairs: Vec<[usize; 2]>, // particle-id pairs       [n]
    k: Vec<f64>,            // stiffness               [n]
    d0: Vec<f64>,           // relaxed length          [n]
}

impl Spring {
    pub fn new(pairs: Vec<[usize; 2]>, k: Vec<f64>, d0: Vec<f64>) -> DemResult<Self> {
        if k.len() != pairs.len() || d0.len() != pairs.len() {
            return Err(DemError::InvalidPairParameters(format!(
                "spring has {} pairs but {} stiffnesses and {} relaxed lengths",
                pairs.len(),
                k.len(),
                d0.len()
            )));
        }
        Ok(Self { pairs, k, d0 })
    }
}

impl PairLaw for Spring {
    fn accumulate(&self, x: &DMatrix<f64>, _v: &DMatrix<f64>, f: &mut DMatrix<f64>) {
        let ndim = x.ncols();

        // loop over all springs
        for (p, &[i, j]) in self.pairs.iter().enumerate() {
            // displacement from particle "i" to particle "j" and its length
            let dx = x.row(j) - x.row(i);
            let dist = dx.norm();

            assert!(dist > 0.0, "spring pair ({i}, {j}) has zero length");

            // scalar force from the deviation off the relaxed length
            let s = self.k[p] * (dist - self.d0[p]) / dist;

            // equal and opposite on both particles
            for d in 0..ndim {
                f[(i, d)] += s * dx[d];
                f[(j, d)] -= s * dx[d];
            }
        }
    }

    fn coordination(&self, n_particles: usize) -> DVector<usize> {
        pair_histogram(&self.pairs, n_particles)
    }

    fn max_particle(&self) -> Option<usize> {
        pair_max(&self.pairs)
    }
}

// =========================================================================================
// Dashpot
// =========================================================================================

/// Viscous dashpot between particle pairs: pure damping, no rest length.
///
/// For pair (i, j) with damping constant `eta` the force eta (v_j - v_i)
/// acts on i, the negative on j; it vanishes when both move together.
pub struct Dashpot {
    pairs: Vec<[usize; 2]>, // particle-id pairs       [n]
    eta: Vec<f64>,          // damping constant        [n]
}

impl Dashpot {
    pub fn new(pairs: Vec<[usize; 2]>, eta: Vec<f64>) -> DemResult<Self> {
        if eta.len() != pairs.len() {
            return Err(DemError::InvalidPairParameters(format!(
                "dashpot has {} pairs but {} damping constants",
                pairs.len(),
                eta.len()
            )));
        }
        Ok(Self { pairs, eta })
    }
}

impl PairLaw for Dashpot {
    fn accumulate(&self, _x: &DMatrix<f64>, v: &DMatrix<f64>, f: &mut DMatrix<f64>) {
        let ndim = v.ncols();

        // loop over all dashpots
        for (p, &[i, j]) in self.pairs.iter().enumerate() {
            for d in 0..ndim {
                // velocity difference drives the force
                let dv = v[(j, d)] - v[(i, d)];
                f[(i, d)] += self.eta[p] * dv;
                f[(j, d)] -= self.eta[p] * dv;
            }
        }
    }

    fn coordination(&self, n_particles: usize) -> DVector<usize> {
        pair_histogram(&self.pairs, n_particles)
    }

    fn max_particle(&self) -> Option<usize> {
        pair_max(&self.pairs)
    }
}

// =========================================================================================
// AdhesionPotential
// =========================================================================================

/// Short-range repulsion with an adhesive exponential tail.
///
/// Per pair, with distance D and parameters (k, b, r0, e), a scalar radial
/// force s(D) is applied along the unit vector d/D on particle i and its
/// negative on j (positive s = attraction):
///
/// - D <= r0 (Lennard-Jones-like):  s = (12 e / D) ((r0/D)^6 - (r0/D)^12),
///   repulsive below r0 and exactly zero at r0;
/// - D >  r0 (adhesive tail):       s = b exp(-k (D - r0) / b),
///   maximal attractive force b at contact, initial decay slope -k.
///
/// [`AdhesionPotential::potential`] returns the matching pair energy V(D)
/// with s = dV/dD on each branch and V continuous at r0 (value -e).
pub struct AdhesionPotential {
    pairs: Vec<[usize; 2]>, // particle-id pairs       [n]
    k: Vec<f64>,            // tail stiffness          [n]
    b: Vec<f64>,            // maximal adhesive force  [n]
    r0: Vec<f64>,           // equilibrium length      [n]
    e: Vec<f64>,            // well depth              [n]
}

impl AdhesionPotential {
    pub fn new(
        pairs: Vec<[usize; 2]>,
        k: Vec<f64>,
        b: Vec<f64>,
        r0: Vec<f64>,
        e: Vec<f64>,
    ) -> DemResult<Self> {
        if k.len() != pairs.len()
            || b.len() != pairs.len()
            || r0.len() != pairs.len()
            || e.len() != pairs.len()
        {
            return Err(DemError::InvalidPairParameters(format!(
                "adhesion has {} pairs but parameter lengths k={}, b={}, r0={}, e={}",
                pairs.len(),
                k.len(),
                b.len(),
                r0.len(),
                e.len()
            )));
        }
        Ok(Self { pairs, k, b, r0, e })
    }

    // scalar radial force for pair p at distance `dist`
    fn radial_force(&self, p: usize, dist: f64) -> f64 {
        let r0 = self.r0[p];
        if dist <= r0 {
            let q6 = (r0 / dist).powi(6);
            12.0 * self.e[p] / dist * (q6 - q6 * q6)
        } else {
            self.b[p] * (-self.k[p] * (dist - r0) / self.b[p]).exp()
        }
    }

    /// Potential energy per pair [n].
    ///
    /// Branch-wise antiderivative of the radial force, continuous at r0.
    pub fn potential(&self, x: &DMatrix<f64>) -> DVector<f64> {
        let mut energy = DVector::zeros(self.pairs.len());

        for (p, &[i, j]) in self.pairs.iter().enumerate() {
            let dist = (x.row(j) - x.row(i)).norm();
            assert!(dist > 0.0, "adhesion pair ({i}, {j}) has zero length");

            let r0 = self.r0[p];
            energy[p] = if dist <= r0 {
                let q6 = (r0 / dist).powi(6);
                self.e[p] * (q6 * q6 - 2.0 * q6)
            } else {
                let bk = self.b[p] * self.b[p] / self.k[p];
                bk - self.e[p] - bk * (-self.k[p] * (dist - r0) / self.b[p]).exp()
            };
        }

        energy
    }
}

impl PairLaw for AdhesionPotential {
    fn accumulate(&self, x: &DMatrix<f64>, _v: &DMatrix<f64>, f: &mut DMatrix<f64>) {
        let ndim = x.ncols();

        for (p, &[i, j]) in self.pairs.iter().enumerate() {
            let dx = x.row(j) - x.row(i);
            let dist = dx.norm();

            assert!(dist > 0.0, "adhesion pair ({i}, {j}) has zero length");

            // both branches scale by the unit vector dx/dist
            let s = self.radial_force(p, dist) / dist;

            for d in 0..ndim {
                f[(i, d)] += s * dx[d];
                f[(j, d)] -= s * dx[d];
            }
        }
    }

    fn coordination(&self, n_particles: usize) -> DVector<usize> {
        pair_histogram(&self.pairs, n_particles)
    }

    fn max_particle(&self) -> Option<usize> {
        pair_max(&self.pairs)
    }
}
