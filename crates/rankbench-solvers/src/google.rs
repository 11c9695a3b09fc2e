//! Google matrix construction
//!
//! `G = alpha * A + (1 - alpha) * v * 1^T`, with `v` uniform unless a
//! personalised teleport vector is supplied. `A` should have its dangling
//! columns fixed first, otherwise the dangling columns of `G` only carry the
//! teleport share.

use crate::error::{PageRankError, SolverResult};
use crate::transition::{Matrix, Representation, TransitionMatrix};
use ndarray::{Array1, Array2};
use sprs::TriMat;

/// Absolute tolerance on the teleport vector's total mass
pub const TELEPORT_SUM_TOLERANCE: f64 = 1e-8;

/// Reject damping factors outside the open interval (0, 1).
pub fn validate_alpha(alpha: f64) -> SolverResult<()> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(PageRankError::InvalidAlpha(alpha))
    }
}

/// Check a teleport vector: length `n`, non-negative, summing to 1.
pub fn validate_teleport(teleport: &[f64], n: usize) -> SolverResult<()> {
    if teleport.len() != n {
        return Err(PageRankError::InvalidTeleport(format!(
            "expected {} entries, got {}",
            n,
            teleport.len()
        )));
    }
    if let Some(bad) = teleport.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(PageRankError::InvalidTeleport(format!(
            "entries must be non-negative, found {}",
            bad
        )));
    }
    let sum: f64 = teleport.iter().sum();
    if (sum - 1.0).abs() > TELEPORT_SUM_TOLERANCE {
        return Err(PageRankError::InvalidTeleport(format!("entries sum to {}, expected 1", sum)));
    }
    Ok(())
}

/// Validated teleport vector, uniform `1/n` when none is given.
pub fn teleport_vector(teleport: Option<&[f64]>, n: usize) -> SolverResult<Array1<f64>> {
    match teleport {
        Some(v) => {
            validate_teleport(v, n)?;
            Ok(Array1::from(v.to_vec()))
        }
        None if n == 0 => Ok(Array1::zeros(0)),
        None => Ok(Array1::from_elem(n, 1.0 / n as f64)),
    }
}

/// Damped transition matrix
#[derive(Debug, Clone)]
pub struct GoogleMatrix {
    matrix: Matrix,
    alpha: f64,
    teleport: Array1<f64>,
}

impl GoogleMatrix {
    /// Build `G` keeping the storage of `a`.
    pub fn build(a: &TransitionMatrix, alpha: f64, teleport: Option<&[f64]>) -> SolverResult<Self> {
        Self::build_as(a, alpha, teleport, a.matrix().representation())
    }

    /// Build `G` in an explicitly chosen storage. `a` is never modified.
    pub fn build_as(
        a: &TransitionMatrix,
        alpha: f64,
        teleport: Option<&[f64]>,
        representation: Representation,
    ) -> SolverResult<Self> {
        validate_alpha(alpha)?;
        let n = a.dim();
        let v = teleport_vector(teleport, n)?;

        let matrix = match representation {
            Representation::Dense => {
                // Every column starts as the teleport column
                let mut g = Array2::zeros((n, n));
                for i in 0..n {
                    g.row_mut(i).fill((1.0 - alpha) * v[i]);
                }
                a.matrix().for_each_entry(|i, j, x| g[[i, j]] += alpha * x);
                Matrix::Dense(g)
            }
            Representation::Sparse => {
                // The teleport term is rank one and fills every position
                let mut tri = TriMat::with_capacity((n, n), n * n + a.matrix().nnz());
                for j in 0..n {
                    for i in 0..n {
                        tri.add_triplet(i, j, (1.0 - alpha) * v[i]);
                    }
                }
                a.matrix().for_each_entry(|i, j, x| tri.add_triplet(i, j, alpha * x));
                Matrix::Sparse(tri.to_csr())
            }
        };

        Ok(Self { matrix, alpha, teleport: v })
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn teleport(&self) -> &Array1<f64> {
        &self.teleport
    }

    pub fn dim(&self) -> usize {
        self.matrix.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::GraphView;
    use crate::transition::TransitionMatrixBuilder;

    fn fixed_matrix() -> TransitionMatrix {
        let view = GraphView::from_edges(&[], &[(1, 2), (1, 3), (2, 3), (3, 1), (4, 3)]);
        TransitionMatrixBuilder::new().build(&view).unwrap().with_dangling_fixed()
    }

    #[test]
    fn test_google_matrix_is_column_stochastic() {
        let a = fixed_matrix();
        for repr in [Representation::Dense, Representation::Sparse] {
            let g = GoogleMatrix::build_as(&a, 0.85, None, repr).unwrap();
            for s in g.matrix().column_sums() {
                assert!((s - 1.0).abs() < 1e-12);
            }
            // Column of D (index 3) only points to C
            assert!((g.matrix().get(0, 3) - 0.15 / 4.0).abs() < 1e-15);
            assert!((g.matrix().get(2, 3) - (0.85 + 0.15 / 4.0)).abs() < 1e-15);
        }
    }

    #[test]
    fn test_keeps_input_representation() {
        let a = fixed_matrix();
        let g = GoogleMatrix::build(&a, 0.5, None).unwrap();
        assert_eq!(g.matrix().representation(), Representation::Sparse);

        let dense = a.to_representation(Representation::Dense);
        let g = GoogleMatrix::build(&dense, 0.5, None).unwrap();
        assert_eq!(g.matrix().representation(), Representation::Dense);
    }

    #[test]
    fn test_personalized_teleport() {
        let a = fixed_matrix();
        let v = [1.0, 0.0, 0.0, 0.0];
        let g = GoogleMatrix::build(&a, 0.8, Some(&v[..])).unwrap();

        assert!((g.matrix().get(0, 0) - 0.2).abs() < 1e-15);
        assert_eq!(g.matrix().get(1, 2), 0.0);
        assert_eq!(g.teleport().to_vec(), v.to_vec());
    }

    #[test]
    fn test_invalid_alpha() {
        let a = fixed_matrix();
        for alpha in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            assert!(matches!(
                GoogleMatrix::build(&a, alpha, None),
                Err(PageRankError::InvalidAlpha(_))
            ));
        }
    }

    #[test]
    fn test_invalid_teleport() {
        let a = fixed_matrix();
        let short = [0.5, 0.5];
        let negative = [1.5, -0.5, 0.0, 0.0];
        let unnormalized = [0.5, 0.5, 0.5, 0.0];
        for v in [&short[..], &negative[..], &unnormalized[..]] {
            assert!(matches!(
                GoogleMatrix::build(&a, 0.85, Some(v)),
                Err(PageRankError::InvalidTeleport(_))
            ));
        }
    }
}
