//! Mapping between particle space and DOF space
//!
//! A DOF table of shape [N, ndim] assigns every (particle, component) entry
//! a DOF index in [0, ndof). Several entries may share one DOF index; that is
//! how boundary coupling, periodicity, and reduced freedom are expressed.
//! Three conversions exist and they are deliberately distinct:
//!
//! - [`DofMap::as_dofs`]       – overwrite scatter, last visited entry wins
//! - [`DofMap::assemble_dofs`] – additive reduction (forces accumulate)
//! - [`DofMap::as_particle`]   – broadcast gather back to particle space

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::error::{DemError, DemResult};

/// Bidirectional converter between particle arrays [N, ndim] and a flat
/// DOF vector [ndof], driven by an immutable DOF table.
#[derive(Debug, Clone)]
pub struct DofMap {
    dofs: DMatrix<usize>, // DOF-number per (particle, component) [N, ndim]
    n: usize,             // number of particles
    ndim: usize,          // number of spatial dimensions
    ndof: usize,          // number of DOFs
}

impl DofMap {
    /// Build a map from a DOF table; `ndof` is `max(table) + 1`.
    ///
    /// Every DOF index in `[0, ndof)` must be referenced by at least one
    /// table entry: a gap would make the assembled system singular, so it is
    /// rejected here instead of silently computing on garbage.
    pub fn new(dofs: DMatrix<usize>) -> DemResult<Self> {
        let n = dofs.nrows();
        let ndim = dofs.ncols();

        if n == 0 || ndim == 0 {
            return Err(DemError::InvalidDofTable("table is empty".into()));
        }

        let ndof = dofs.iter().max().copied().unwrap_or(0) + 1;

        // every index in [0, ndof) must occur at least once
        let mut seen = vec![false; ndof];
        for &d in dofs.iter() {
            seen[d] = true;
        }
        if let Some(gap) = seen.iter().position(|&s| !s) {
            return Err(DemError::InvalidDofTable(format!(
                "DOF {gap} is never referenced (ndof = {ndof})"
            )));
        }

        Ok(Self { dofs, n, ndim, ndof })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn ndof(&self) -> usize {
        self.ndof
    }

    /// Scatter a per-particle scalar [N] to DOF values [ndof].
    ///
    /// Overwrite semantics: entries sharing a DOF overwrite each other, the
    /// last visited one wins. Traversal is particle-major (n = 0..N outer,
    /// i = 0..ndim inner), so the highest (n, i) referencing a DOF decides.
    pub fn as_dofs_scalar(&self, pscalar: &DVector<f64>) -> DVector<f64> {
        assert_eq!(pscalar.len(), self.n, "particle scalar must have length N");

        let mut dofval = DVector::zeros(self.ndof);

        for n in 0..self.n {
            for i in 0..self.ndim {
                dofval[self.dofs[(n, i)]] = pscalar[n];
            }
        }

        dofval
    }

    /// Scatter a particle vector [N, ndim] to DOF values [ndof].
    ///
    /// Same overwrite rule and traversal order as [`Self::as_dofs_scalar`].
    pub fn as_dofs(&self, pvector: &DMatrix<f64>) -> DVector<f64> {
        assert_eq!(pvector.nrows(), self.n, "particle vector must have N rows");
        assert_eq!(pvector.ncols(), self.ndim, "particle vector must have ndim columns");

        let mut dofval = DVector::zeros(self.ndof);

        for n in 0..self.n {
            for i in 0..self.ndim {
                dofval[self.dofs[(n, i)]] = pvector[(n, i)];
            }
        }

        dofval
    }

    /// Assemble a particle vector [N, ndim] into DOF values [ndof].
    ///
    /// Additive reduction: entries sharing a DOF accumulate. This is the
    /// physically correct gather for forces, so that coincident DOFs receive
    /// the contribution of every particle aliasing them.
    pub fn assemble_dofs(&self, pvector: &DMatrix<f64>) -> DVector<f64> {
        assert_eq!(pvector.nrows(), self.n, "particle vector must have N rows");
        assert_eq!(pvector.ncols(), self.ndim, "particle vector must have ndim columns");

        let mut dofval = DVector::zeros(self.ndof);

        for n in 0..self.n {
            for i in 0..self.ndim {
                dofval[self.dofs[(n, i)]] += pvector[(n, i)];
            }
        }

        dofval
    }

    /// Parallel [`Self::assemble_dofs`] on a caller-supplied thread pool.
    ///
    /// Particles are partitioned over the pool's workers; each worker
    /// accumulates into a private DOF vector and the partial vectors are
    /// summed once at the end. The result equals the serial assembly up to
    /// floating-point reassociation.
    pub fn assemble_dofs_on(&self, pool: &rayon::ThreadPool, pvector: &DMatrix<f64>) -> DVector<f64> {
        assert_eq!(pvector.nrows(), self.n, "particle vector must have N rows");
        assert_eq!(pvector.ncols(), self.ndim, "particle vector must have ndim columns");

        pool.install(|| {
            (0..self.n)
                .into_par_iter()
                .fold(
                    || DVector::<f64>::zeros(self.ndof),
                    |mut local, n| {
                        for i in 0..self.ndim {
                            local[self.dofs[(n, i)]] += pvector[(n, i)];
                        }
                        local
                    },
                )
                .reduce(|| DVector::<f64>::zeros(self.ndof), |a, b| a + b)
        })
    }

    /// Reconstruct a particle vector [N, ndim] from DOF values [ndof].
    ///
    /// Broadcast: every (particle, component) entry reads the value of its
    /// DOF, so entries sharing a DOF come back identical.
    pub fn as_particle(&self, dofval: &DVector<f64>) -> DMatrix<f64> {
        assert_eq!(dofval.len(), self.ndof, "DOF vector must have length ndof");

        let mut pvector = DMatrix::zeros(self.n, self.ndim);

        for n in 0..self.n {
            for i in 0..self.ndim {
                pvector[(n, i)] = dofval[self.dofs[(n, i)]];
            }
        }

        pvector
    }
}
