//! Convergence bookkeeping for the quasi-static loop
//!
//! [`StopList`] keeps the most recent residuals in a fixed-length window and
//! declares convergence only when the whole window is non-increasing and
//! below tolerance. A single transient lull therefore never stops the loop.

/// Sliding window of the most recent scalar residuals.
///
/// Uninitialized slots read as +infinity, so a freshly reset window can never
/// satisfy the stopping rule before it has been filled with real residuals.
#[derive(Debug, Clone)]
pub struct StopList {
    res: Vec<f64>, // residual history, oldest first
}

impl StopList {
    /// Window holding the `n` most recent residuals, all starting at +inf.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "residual window must hold at least one entry");
        Self {
            res: vec![f64::INFINITY; n],
        }
    }

    /// Number of residuals checked per stopping decision.
    pub fn len(&self) -> usize {
        self.res.len()
    }

    pub fn is_empty(&self) -> bool {
        self.res.is_empty()
    }

    /// Forget all residuals (refill the window with +inf).
    pub fn reset(&mut self) {
        self.res.fill(f64::INFINITY);
    }

    /// Forget all residuals and change the window length.
    pub fn reset_with(&mut self, n: usize) {
        assert!(n > 0, "residual window must hold at least one entry");
        self.res = vec![f64::INFINITY; n];
    }

    /// Push a residual and evaluate the stopping rule.
    ///
    /// The oldest residual is evicted, `res` appended, then the window is
    /// scanned in chronological order: converged iff every residual is at
    /// most its predecessor and at most `tol`. One increase or one
    /// above-tolerance value anywhere makes this check fail; the window
    /// itself is kept, not restarted.
    pub fn stop(&mut self, res: f64, tol: f64) -> bool {
        // evict the oldest, append the newest
        self.res.rotate_left(1);
        let last = self.res.len() - 1;
        self.res[last] = res;

        for i in 1..self.res.len() {
            if self.res[i] > self.res[i - 1] || self.res[i] > tol {
                return false;
            }
        }

        // a one-entry window has no pairs to compare: check it directly
        self.res[0] <= tol
    }
}

impl Default for StopList {
    fn default() -> Self {
        Self::new(20)
    }
}
