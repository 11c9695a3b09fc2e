//! Direct sparse LU on `(I - alpha * P) x = (1 - alpha) * v`
//!
//! Left-looking factorization `P A Q = L U` with threshold partial pivoting.
//! Each column is a sparse triangular solve against the columns of `L`
//! built so far; its nonzero pattern comes from a depth-first reach.

use crate::common::GraphView;
use crate::convergence::clamp_and_normalize;
use crate::error::{PageRankError, SolverResult};
use crate::linear_system::PageRankSystem;
use crate::observer::{SolveObserver, TracingObserver};
use crate::ordering::{check_permutation, PivotStrategy};
use crate::solver::PageRankResult;
use crate::transition::{EdgeWeight, TransitionMatrix, TransitionMatrixBuilder};
use serde::{Deserialize, Serialize};
use sprs::CsMat;
use std::time::Instant;

const SOLVER: &str = "direct_lu";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectLuConfig {
    pub alpha: f64,
    pub pivot: PivotStrategy,
    /// Pivots at or below this magnitude mark the system as singular
    pub drop_tol: f64,
    /// Keep the diagonal as pivot when it is within this fraction of the
    /// column maximum; 1.0 is plain partial pivoting
    pub diag_pivot_thresh: f64,
    /// Stored edge weights or unit weights
    #[serde(default)]
    pub edge_weight: EdgeWeight,
    pub teleport: Option<Vec<f64>>,
}

impl Default for DirectLuConfig {
    fn default() -> Self {
        Self {
            alpha: 0.85,
            pivot: PivotStrategy::default(),
            drop_tol: 1e-10,
            diag_pivot_thresh: 1.0,
            edge_weight: EdgeWeight::Unit,
            teleport: None,
        }
    }
}

impl DirectLuConfig {
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_pivot(mut self, pivot: PivotStrategy) -> Self {
        self.pivot = pivot;
        self
    }

    pub fn with_drop_tol(mut self, drop_tol: f64) -> Self {
        self.drop_tol = drop_tol;
        self
    }

    pub fn with_edge_weight(mut self, edge_weight: EdgeWeight) -> Self {
        self.edge_weight = edge_weight;
        self
    }

    pub fn with_teleport(mut self, teleport: Vec<f64>) -> Self {
        self.teleport = Some(teleport);
        self
    }
}

/// Factors of `P A Q = L U`
#[derive(Debug, Clone)]
pub struct SparseLu {
    /// Unit lower columns, diagonal entry first
    lower: Vec<Vec<(usize, f64)>>,
    /// Upper columns, diagonal entry last
    upper: Vec<Vec<(usize, f64)>>,
    /// `pinv[row]` is the pivot step of the original row
    pinv: Vec<usize>,
    /// `order[k]` is the original column factored at step `k`
    order: Vec<usize>,
}

const UNSET: usize = usize::MAX;

impl SparseLu {
    /// Factor a square CSC matrix with the given column order.
    pub fn factor(
        a: &CsMat<f64>,
        order: Vec<usize>,
        drop_tol: f64,
        diag_pivot_thresh: f64,
    ) -> SolverResult<Self> {
        if !a.is_csc() {
            return Err(PageRankError::Shape("LU expects CSC storage".to_string()));
        }
        let n = a.cols();
        if a.rows() != n {
            return Err(PageRankError::Shape(format!(
                "LU expects a square matrix, got {}x{}",
                a.rows(),
                n
            )));
        }
        check_permutation(&order, n)?;

        let mut lower: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        let mut upper: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        let mut pinv = vec![UNSET; n];
        let mut x = vec![0.0; n];
        let mut mark = vec![UNSET; n];
        let mut topo: Vec<usize> = Vec::with_capacity(n);
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for (k, &col) in order.iter().enumerate() {
            let column = a
                .outer_view(col)
                .ok_or_else(|| PageRankError::Shape(format!("missing column {}", col)))?;

            // Pattern of L \ A(:, col) in reverse topological order
            topo.clear();
            for (start, _) in column.iter() {
                if mark[start] == k {
                    continue;
                }
                mark[start] = k;
                stack.push((start, 0));
                while let Some(top) = stack.last_mut() {
                    let (j, next) = *top;
                    let children: &[(usize, f64)] = match pinv[j] {
                        UNSET => &[],
                        step => &lower[step],
                    };
                    if next < children.len() {
                        top.1 += 1;
                        let child = children[next].0;
                        if mark[child] != k {
                            mark[child] = k;
                            stack.push((child, 0));
                        }
                    } else {
                        stack.pop();
                        topo.push(j);
                    }
                }
            }

            for (i, &value) in column.iter() {
                x[i] = value;
            }
            // Sparse forward solve with the unit lower columns
            for &j in topo.iter().rev() {
                let step = pinv[j];
                if step == UNSET {
                    continue;
                }
                let xj = x[j];
                for &(i, l) in &lower[step][1..] {
                    x[i] -= l * xj;
                }
            }

            // Pivot among rows not yet used
            let mut pivot_row = UNSET;
            let mut best = -1.0;
            let mut u_col = Vec::new();
            for &i in topo.iter().rev() {
                if pinv[i] == UNSET {
                    if x[i].abs() > best {
                        best = x[i].abs();
                        pivot_row = i;
                    }
                } else {
                    u_col.push((pinv[i], x[i]));
                }
            }
            if pinv[col] == UNSET
                && mark[col] == k
                && x[col].abs() > drop_tol
                && x[col].abs() >= diag_pivot_thresh * best
            {
                pivot_row = col;
            }
            if pivot_row == UNSET || x[pivot_row].abs() <= drop_tol || !x[pivot_row].is_finite() {
                return Err(PageRankError::SingularMatrix { column: col });
            }

            let pivot = x[pivot_row];
            u_col.push((k, pivot));
            pinv[pivot_row] = k;

            let mut l_col = vec![(pivot_row, 1.0)];
            for &i in topo.iter().rev() {
                if pinv[i] == UNSET {
                    l_col.push((i, x[i] / pivot));
                }
                x[i] = 0.0;
            }
            lower.push(l_col);
            upper.push(u_col);
        }

        // Row indices of L in pivot order
        for col in lower.iter_mut() {
            for entry in col.iter_mut() {
                entry.0 = pinv[entry.0];
            }
        }

        Ok(Self { lower, upper, pinv, order })
    }

    pub fn dim(&self) -> usize {
        self.order.len()
    }

    /// Stored entries of `L` and `U`
    pub fn nnz(&self) -> usize {
        self.lower.iter().map(Vec::len).sum::<usize>() + self.upper.iter().map(Vec::len).sum::<usize>()
    }

    /// Solve `A x = b`
    pub fn solve(&self, b: &[f64]) -> SolverResult<Vec<f64>> {
        let n = self.dim();
        if b.len() != n {
            return Err(PageRankError::Shape(format!(
                "right-hand side has {} entries, expected {}",
                b.len(),
                n
            )));
        }
        let mut y = vec![0.0; n];
        for (i, &bi) in b.iter().enumerate() {
            y[self.pinv[i]] = bi;
        }
        for (j, col) in self.lower.iter().enumerate() {
            let yj = y[j];
            for &(i, l) in &col[1..] {
                y[i] -= l * yj;
            }
        }
        for (j, col) in self.upper.iter().enumerate().rev() {
            if let Some((&(_, diag), rest)) = col.split_last() {
                y[j] /= diag;
                let yj = y[j];
                for &(i, u) in rest {
                    y[i] -= u * yj;
                }
            }
        }
        let mut x = vec![0.0; n];
        for (k, &col) in self.order.iter().enumerate() {
            x[col] = y[k];
        }
        Ok(x)
    }
}

pub struct DirectLuSolver {
    pub config: DirectLuConfig,
}

impl DirectLuSolver {
    pub fn new(config: DirectLuConfig) -> Self {
        Self { config }
    }

    pub fn solve(&self, view: &GraphView) -> SolverResult<PageRankResult> {
        self.solve_with_observer(view, &TracingObserver::default())
    }

    pub fn solve_with_observer(
        &self,
        view: &GraphView,
        observer: &dyn SolveObserver,
    ) -> SolverResult<PageRankResult> {
        self.validate()?;
        if view.node_count == 0 {
            return Ok(PageRankResult::empty());
        }
        let t0 = Instant::now();
        let a = TransitionMatrixBuilder::new()
            .with_edge_weight(self.config.edge_weight)
            .build(view)?;
        self.run(&a, observer, t0)
    }

    pub fn solve_matrix(
        &self,
        a: &TransitionMatrix,
        observer: &dyn SolveObserver,
    ) -> SolverResult<PageRankResult> {
        self.validate()?;
        if a.dim() == 0 {
            return Ok(PageRankResult::empty());
        }
        self.run(a, observer, Instant::now())
    }

    fn validate(&self) -> SolverResult<()> {
        crate::google::validate_alpha(self.config.alpha)?;
        if self.config.drop_tol.is_nan() || self.config.drop_tol < 0.0 {
            return Err(PageRankError::InvalidConfig(format!(
                "drop tolerance must be non-negative, got {}",
                self.config.drop_tol
            )));
        }
        if !(0.0..=1.0).contains(&self.config.diag_pivot_thresh) {
            return Err(PageRankError::InvalidConfig(format!(
                "diagonal pivot threshold must lie in [0, 1], got {}",
                self.config.diag_pivot_thresh
            )));
        }
        Ok(())
    }

    fn run(
        &self,
        a: &TransitionMatrix,
        observer: &dyn SolveObserver,
        t0: Instant,
    ) -> SolverResult<PageRankResult> {
        observer.on_start(SOLVER, a.dim());
        let system = PageRankSystem::assemble(a, self.config.alpha, self.config.teleport.as_deref())?;
        let csc = system.matrix.to_csc();
        let order = self.config.pivot.column_order(&csc);
        let lu = SparseLu::factor(&csc, order, self.config.drop_tol, self.config.diag_pivot_thresh)?;
        tracing::debug!(
            pivot = %self.config.pivot,
            nnz = csc.nnz(),
            factor_nnz = lu.nnz(),
            "factorized system"
        );

        let mut x = lu.solve(&system.rhs)?;
        clamp_and_normalize(&mut x, 0)?;

        let elapsed = t0.elapsed();
        observer.on_finish(SOLVER, 0, true, elapsed);
        Ok(PageRankResult::from_ranks(a.nodes(), x, Vec::new(), true, elapsed))
    }
}
