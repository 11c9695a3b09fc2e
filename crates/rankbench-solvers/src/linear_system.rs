//! Linear-system form of PageRank
//!
//! Solving `(I - alpha * P) x = (1 - alpha) * v` for the raw transition
//! matrix `P` and rescaling `x` to unit mass gives the same vector as the
//! fixed-point iteration with dangling mass sent along `v`.

use crate::error::SolverResult;
use crate::google::{teleport_vector, validate_alpha, GoogleMatrix};
use crate::transition::{csr_matvec, Matrix, TransitionMatrix};
use sprs::{CsMat, TriMat};

/// Matrix-free operator `y = A x`
pub trait LinearOperator: Sync {
    fn dim(&self) -> usize;
    fn apply(&self, x: &[f64], y: &mut [f64]);
}

impl LinearOperator for CsMat<f64> {
    fn dim(&self) -> usize {
        self.rows()
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        csr_matvec(self, x, y);
    }
}

impl LinearOperator for GoogleMatrix {
    fn dim(&self) -> usize {
        self.matrix().dim()
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        self.matrix().matvec(x, y);
    }
}

/// `x -> x - alpha * P x` without forming `I - alpha * P`
pub struct PageRankOperator<'a> {
    matrix: &'a Matrix,
    alpha: f64,
}

impl<'a> PageRankOperator<'a> {
    pub fn new(matrix: &'a Matrix, alpha: f64) -> Self {
        Self { matrix, alpha }
    }
}

impl LinearOperator for PageRankOperator<'_> {
    fn dim(&self) -> usize {
        self.matrix.dim()
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        self.matrix.matvec(x, y);
        for (yi, xi) in y.iter_mut().zip(x) {
            *yi = xi - self.alpha * *yi;
        }
    }
}

/// Assembled `I - alpha * P` and its right-hand side
#[derive(Debug, Clone)]
pub struct PageRankSystem {
    pub matrix: CsMat<f64>,
    pub rhs: Vec<f64>,
    pub alpha: f64,
}

impl PageRankSystem {
    pub fn assemble(a: &TransitionMatrix, alpha: f64, teleport: Option<&[f64]>) -> SolverResult<Self> {
        validate_alpha(alpha)?;
        let n = a.dim();
        let v = teleport_vector(teleport, n)?;

        let mut tri = TriMat::with_capacity((n, n), n + a.matrix().nnz());
        for i in 0..n {
            tri.add_triplet(i, i, 1.0);
        }
        a.matrix().for_each_entry(|i, j, x| tri.add_triplet(i, j, -alpha * x));

        Ok(Self {
            matrix: tri.to_csr(),
            rhs: v.iter().map(|vi| (1.0 - alpha) * vi).collect(),
            alpha,
        })
    }

    pub fn dim(&self) -> usize {
        self.rhs.len()
    }

    /// Diagonal of the assembled matrix
    pub fn diagonal(&self) -> Vec<f64> {
        let mut diag = vec![0.0; self.dim()];
        for (&value, (i, j)) in self.matrix.iter() {
            if i == j {
                diag[i] += value;
            }
        }
        diag
    }

    /// `||b - A x||_2`
    pub fn residual_norm(&self, x: &[f64]) -> f64 {
        let mut ax = vec![0.0; self.dim()];
        csr_matvec(&self.matrix, x, &mut ax);
        ax.iter()
            .zip(&self.rhs)
            .map(|(axi, bi)| (bi - axi) * (bi - axi))
            .sum::<f64>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::GraphView;
    use crate::transition::TransitionMatrixBuilder;

    fn transition() -> TransitionMatrix {
        let view = GraphView::from_edges(&[], &[(1, 2), (1, 3), (2, 3), (3, 1), (4, 3)]);
        TransitionMatrixBuilder::new().build(&view).unwrap()
    }

    #[test]
    fn test_operator_matches_assembled_matrix() {
        let a = transition();
        let system = PageRankSystem::assemble(&a, 0.85, None).unwrap();
        let op = PageRankOperator::new(a.matrix(), 0.85);
        let x = [0.1, 0.2, 0.3, 0.4];

        let mut y_free = [0.0; 4];
        let mut y_csr = [0.0; 4];
        op.apply(&x, &mut y_free);
        system.matrix.apply(&x, &mut y_csr);
        for (a, b) in y_free.iter().zip(&y_csr) {
            assert!((a - b).abs() < 1e-15);
        }
        assert_eq!(op.dim(), 4);
    }

    #[test]
    fn test_rhs_and_diagonal() {
        let a = transition();
        let system = PageRankSystem::assemble(&a, 0.8, None).unwrap();
        for b in &system.rhs {
            assert!((b - 0.2 / 4.0).abs() < 1e-15);
        }
        assert_eq!(system.diagonal(), vec![1.0; 4]);
    }

    #[test]
    fn test_self_loop_on_diagonal() {
        let view = GraphView::from_edges(&[], &[(1, 1), (1, 2), (2, 1)]);
        let a = TransitionMatrixBuilder::new().build(&view).unwrap();
        let system = PageRankSystem::assemble(&a, 0.5, None).unwrap();
        assert_eq!(system.diagonal(), vec![0.75, 1.0]);
    }
}
