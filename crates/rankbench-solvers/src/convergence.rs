//! Residual history and rank-vector helpers shared by the iterative solvers

use crate::error::{PageRankError, SolverResult};

/// State of an iterative solve after recording a residual
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// Keep iterating
    Running,
    /// Residual dropped below the tolerance
    Converged,
    /// Iteration budget used up without meeting the tolerance
    Exhausted,
}

/// Append-only residual history with the stopping rule of every iterative solver.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    tol: f64,
    max_iter: usize,
    residuals: Vec<f64>,
    status: ConvergenceStatus,
}

impl ConvergenceTracker {
    pub fn new(tol: f64, max_iter: usize) -> Self {
        let status = if max_iter == 0 {
            ConvergenceStatus::Exhausted
        } else {
            ConvergenceStatus::Running
        };
        Self {
            tol,
            max_iter,
            residuals: Vec::with_capacity(max_iter.min(1024)),
            status,
        }
    }

    /// Record the residual of the iteration that just finished.
    pub fn record(&mut self, residual: f64) -> ConvergenceStatus {
        self.residuals.push(residual);
        self.status = if residual < self.tol {
            ConvergenceStatus::Converged
        } else if self.residuals.len() >= self.max_iter {
            ConvergenceStatus::Exhausted
        } else {
            ConvergenceStatus::Running
        };
        self.status
    }

    pub fn status(&self) -> ConvergenceStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == ConvergenceStatus::Running
    }

    pub fn is_converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }

    /// Number of recorded iterations
    pub fn iterations(&self) -> usize {
        self.residuals.len()
    }

    pub fn last(&self) -> Option<f64> {
        self.residuals.last().copied()
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn tol(&self) -> f64 {
        self.tol
    }

    pub fn into_history(self) -> Vec<f64> {
        self.residuals
    }
}

/// L1 distance between two equally long vectors
pub fn l1_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm
pub fn l2_norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Clamp negative entries to zero and rescale to unit L1 mass.
///
/// Fails with `DegenerateVector` when nothing (or nothing finite) is left to rescale.
pub fn clamp_and_normalize(x: &mut [f64], iteration: usize) -> SolverResult<()> {
    let mut sum = 0.0;
    for v in x.iter_mut() {
        if *v < 0.0 {
            *v = 0.0;
        }
        sum += *v;
    }
    if sum == 0.0 || !sum.is_finite() {
        return Err(PageRankError::DegenerateVector { iteration });
    }
    for v in x.iter_mut() {
        *v /= sum;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_converges() {
        let mut tracker = ConvergenceTracker::new(1e-3, 10);
        assert_eq!(tracker.record(0.5), ConvergenceStatus::Running);
        assert_eq!(tracker.record(1e-4), ConvergenceStatus::Converged);
        assert!(tracker.is_converged());
        assert_eq!(tracker.residuals(), &[0.5, 1e-4]);
    }

    #[test]
    fn test_tracker_exhausts() {
        let mut tracker = ConvergenceTracker::new(1e-9, 2);
        tracker.record(1.0);
        assert_eq!(tracker.record(0.5), ConvergenceStatus::Exhausted);
        assert!(!tracker.is_converged());
        assert_eq!(tracker.iterations(), 2);
        assert_eq!(tracker.last(), Some(0.5));
    }

    #[test]
    fn test_zero_budget_is_exhausted() {
        let tracker = ConvergenceTracker::new(1e-6, 0);
        assert_eq!(tracker.status(), ConvergenceStatus::Exhausted);
    }

    #[test]
    fn test_clamp_and_normalize() {
        let mut x = vec![2.0, -1.0, 2.0];
        clamp_and_normalize(&mut x, 0).unwrap();
        assert_eq!(x, vec![0.5, 0.0, 0.5]);

        let mut zero = vec![0.0, -3.0];
        assert_eq!(
            clamp_and_normalize(&mut zero, 4),
            Err(PageRankError::DegenerateVector { iteration: 4 })
        );
    }
}
