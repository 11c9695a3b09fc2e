//! Preconditioners for the Krylov solver
//!
//! All of them are built from the assembled CSR system and applied as
//! `z = M^{-1} r`.

use crate::error::{PageRankError, SolverResult};
use serde::{Deserialize, Serialize};
use sprs::CsMat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

/// Preconditioner choice for GMRES
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Preconditioner {
    None,
    Jacobi,
    #[default]
    Ilu,
}

impl Preconditioner {
    pub fn name(&self) -> &'static str {
        match self {
            Preconditioner::None => "none",
            Preconditioner::Jacobi => "jacobi",
            Preconditioner::Ilu => "ilu",
        }
    }

    /// Build the operator for an assembled system matrix
    pub fn build(&self, system: &CsMat<f64>, ilu: IluParams) -> SolverResult<PreconditionerOp> {
        Ok(match self {
            Preconditioner::None => PreconditionerOp::Identity,
            Preconditioner::Jacobi => PreconditionerOp::Jacobi(JacobiPreconditioner::new(system)),
            Preconditioner::Ilu => PreconditionerOp::Ilu(IlutFactors::factor(system, ilu)?),
        })
    }
}

impl fmt::Display for Preconditioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preconditioner {
    type Err = PageRankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Preconditioner::None),
            "jacobi" | "diagonal" => Ok(Preconditioner::Jacobi),
            "ilu" | "ilut" => Ok(Preconditioner::Ilu),
            _ => Err(PageRankError::UnknownPreconditioner(s.to_string())),
        }
    }
}

/// Approximate inverse applied to a residual
pub trait Precondition: Sync {
    fn apply(&self, r: &[f64], z: &mut [f64]);
}

/// Drop tolerance and fill budget of the incomplete factorization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IluParams {
    /// Entries below `drop_tol * ||row||_2` are discarded
    pub drop_tol: f64,
    /// Each factor row keeps at most `fill_factor` times the row's original entries
    pub fill_factor: f64,
}

impl Default for IluParams {
    fn default() -> Self {
        Self {
            drop_tol: 1e-4,
            fill_factor: 10.0,
        }
    }
}

/// Built preconditioner
#[derive(Debug, Clone)]
pub enum PreconditionerOp {
    Identity,
    Jacobi(JacobiPreconditioner),
    Ilu(IlutFactors),
}

impl Precondition for PreconditionerOp {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        match self {
            PreconditionerOp::Identity => z.copy_from_slice(r),
            PreconditionerOp::Jacobi(p) => p.apply(r, z),
            PreconditionerOp::Ilu(p) => p.apply(r, z),
        }
    }
}

/// Inverse of the system diagonal
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    pub fn new(system: &CsMat<f64>) -> Self {
        let mut diag = vec![0.0; system.rows()];
        for (&value, (i, j)) in system.iter() {
            if i == j {
                diag[i] += value;
            }
        }
        // Zero diagonals are left unscaled
        let inv_diag = diag
            .into_iter()
            .map(|d| if d != 0.0 { 1.0 / d } else { 1.0 })
            .collect();
        Self { inv_diag }
    }
}

impl Precondition for JacobiPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        for ((zi, ri), di) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = ri * di;
        }
    }
}

/// Threshold incomplete LU (ILUT), row oriented.
///
/// `L` is unit lower triangular and stored without its diagonal; `U` keeps
/// its diagonal separately.
#[derive(Debug, Clone)]
pub struct IlutFactors {
    lower: Vec<Vec<(usize, f64)>>,
    upper: Vec<Vec<(usize, f64)>>,
    diag: Vec<f64>,
}

impl IlutFactors {
    pub fn factor(a: &CsMat<f64>, params: IluParams) -> SolverResult<Self> {
        if !a.is_csr() {
            return Err(PageRankError::Shape("ILU expects CSR storage".to_string()));
        }
        if a.rows() != a.cols() {
            return Err(PageRankError::Shape(format!(
                "ILU expects a square matrix, got {}x{}",
                a.rows(),
                a.cols()
            )));
        }
        let n = a.rows();
        let mut lower: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        let mut upper: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        let mut diag: Vec<f64> = Vec::with_capacity(n);

        // Sparse accumulator for the current row
        let mut work = vec![0.0; n];
        let mut present = vec![false; n];
        let mut pattern: Vec<usize> = Vec::new();
        let mut pending: BinaryHeap<Reverse<usize>> = BinaryHeap::new();

        for (i, row) in a.outer_iterator().enumerate() {
            let mut row_norm = 0.0;
            for (j, &value) in row.iter() {
                if !present[j] {
                    present[j] = true;
                    pattern.push(j);
                    if j < i {
                        pending.push(Reverse(j));
                    }
                }
                work[j] += value;
                row_norm += value * value;
            }
            let tau = params.drop_tol * row_norm.sqrt();
            let budget = ((params.fill_factor * row.nnz() as f64).ceil() as usize).max(1);

            // Eliminate lower entries in increasing column order
            while let Some(Reverse(k)) = pending.pop() {
                if work[k] == 0.0 {
                    continue;
                }
                let factor = work[k] / diag[k];
                if factor.abs() < tau {
                    work[k] = 0.0;
                    continue;
                }
                work[k] = factor;
                for &(j, u_kj) in &upper[k] {
                    if !present[j] {
                        present[j] = true;
                        pattern.push(j);
                        if j < i {
                            pending.push(Reverse(j));
                        }
                    }
                    work[j] -= factor * u_kj;
                }
            }

            let mut l_row = Vec::new();
            let mut u_row = Vec::new();
            let mut pivot = 0.0;
            for &j in &pattern {
                let value = work[j];
                if j == i {
                    pivot = value;
                } else if value != 0.0 && value.abs() >= tau {
                    if j < i {
                        l_row.push((j, value));
                    } else {
                        u_row.push((j, value));
                    }
                }
                work[j] = 0.0;
                present[j] = false;
            }
            pattern.clear();

            keep_largest(&mut l_row, budget);
            keep_largest(&mut u_row, budget);
            l_row.sort_unstable_by_key(|&(j, _)| j);
            u_row.sort_unstable_by_key(|&(j, _)| j);

            if pivot == 0.0 || !pivot.is_finite() {
                // Replace a broken pivot instead of failing the factorization
                pivot = if tau > 0.0 { tau } else { 1e-12 };
            }
            lower.push(l_row);
            upper.push(u_row);
            diag.push(pivot);
        }

        Ok(Self { lower, upper, diag })
    }

    pub fn nnz(&self) -> usize {
        self.diag.len()
            + self.lower.iter().map(Vec::len).sum::<usize>()
            + self.upper.iter().map(Vec::len).sum::<usize>()
    }
}

fn keep_largest(entries: &mut Vec<(usize, f64)>, budget: usize) {
    if entries.len() > budget {
        entries.sort_unstable_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        entries.truncate(budget);
    }
}

impl Precondition for IlutFactors {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        let n = self.diag.len();
        // L y = r
        for i in 0..n {
            let mut sum = r[i];
            for &(j, l_ij) in &self.lower[i] {
                sum -= l_ij * z[j];
            }
            z[i] = sum;
        }
        // U z = y
        for i in (0..n).rev() {
            let mut sum = z[i];
            for &(j, u_ij) in &self.upper[i] {
                sum -= u_ij * z[j];
            }
            z[i] = sum / self.diag[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    fn tridiagonal(n: usize) -> CsMat<f64> {
        let mut tri = TriMat::new((n, n));
        for i in 0..n {
            tri.add_triplet(i, i, 4.0);
            if i > 0 {
                tri.add_triplet(i, i - 1, -1.0);
            }
            if i + 1 < n {
                tri.add_triplet(i, i + 1, -1.0);
            }
        }
        tri.to_csr()
    }

    fn matvec(a: &CsMat<f64>, x: &[f64]) -> Vec<f64> {
        let mut y = vec![0.0; a.rows()];
        crate::transition::csr_matvec(a, x, &mut y);
        y
    }

    #[test]
    fn test_parse_preconditioner() {
        assert_eq!("ILU".parse::<Preconditioner>().unwrap(), Preconditioner::Ilu);
        assert_eq!("jacobi".parse::<Preconditioner>().unwrap(), Preconditioner::Jacobi);
        assert_eq!("none".parse::<Preconditioner>().unwrap(), Preconditioner::None);
        assert_eq!(
            "amg".parse::<Preconditioner>(),
            Err(PageRankError::UnknownPreconditioner("amg".into()))
        );
    }

    #[test]
    fn test_jacobi_scales_by_diagonal() {
        let a = tridiagonal(3);
        let op = Preconditioner::Jacobi.build(&a, IluParams::default()).unwrap();
        let mut z = [0.0; 3];
        op.apply(&[4.0, 8.0, 2.0], &mut z);
        assert_eq!(z, [1.0, 2.0, 0.5]);
    }

    #[test]
    fn test_ilu_is_exact_on_tridiagonal() {
        // No fill-in occurs, so ILUT reproduces the full LU
        let a = tridiagonal(6);
        let factors = IlutFactors::factor(&a, IluParams { drop_tol: 0.0, fill_factor: 10.0 }).unwrap();
        let x = [1.0, -2.0, 3.0, 0.5, 0.0, 7.0];
        let b = matvec(&a, &x);

        let mut z = [0.0; 6];
        factors.apply(&b, &mut z);
        for (zi, xi) in z.iter().zip(&x) {
            assert!((zi - xi).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ilu_with_fill_and_drop() {
        // Arrow matrix: dense first row and column
        let n = 8;
        let mut tri = TriMat::new((n, n));
        for i in 0..n {
            tri.add_triplet(i, i, 10.0);
            if i > 0 {
                tri.add_triplet(0, i, 1.0);
                tri.add_triplet(i, 0, 1.0);
            }
        }
        let a: CsMat<f64> = tri.to_csr();
        let exact = IlutFactors::factor(&a, IluParams { drop_tol: 0.0, fill_factor: 100.0 }).unwrap();
        let x: Vec<f64> = (0..n).map(|i| i as f64 + 1.0).collect();
        let b = matvec(&a, &x);
        let mut z = vec![0.0; n];
        exact.apply(&b, &mut z);
        for (zi, xi) in z.iter().zip(&x) {
            assert!((zi - xi).abs() < 1e-10);
        }

        let sparse = IlutFactors::factor(&a, IluParams { drop_tol: 0.5, fill_factor: 1.0 }).unwrap();
        assert!(sparse.nnz() <= exact.nnz());
    }

    #[test]
    fn test_identity() {
        let a = tridiagonal(2);
        let op = Preconditioner::None.build(&a, IluParams::default()).unwrap();
        let mut z = [0.0; 2];
        op.apply(&[3.0, 4.0], &mut z);
        assert_eq!(z, [3.0, 4.0]);
    }
}
