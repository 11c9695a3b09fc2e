//! Dominant eigenvector of the Google matrix
//!
//! PageRank is the right eigenvector of `G` for its largest eigenvalue
//! (1 when every column is stochastic). Small graphs use a dense Schur
//! decomposition for the eigenvalue and an SVD null vector of `G - lambda I`
//! for the vector. Larger graphs run restarted Arnoldi on a matrix-free `G`
//! and take the dominant Ritz pair of each Hessenberg matrix. Either way
//! the vector is taken in absolute value and rescaled to unit L1 mass.

use crate::common::GraphView;
use crate::convergence::{clamp_and_normalize, dot, l2_norm, ConvergenceTracker};
use crate::error::{PageRankError, SolverResult};
use crate::google::{teleport_vector, GoogleMatrix};
use crate::linear_system::LinearOperator;
use crate::observer::{SolveObserver, TracingObserver};
use crate::solver::{validate_params, PageRankResult};
use crate::transition::{EdgeWeight, TransitionMatrix, TransitionMatrixBuilder};
use nalgebra::{DMatrix, DVector, Schur, SVD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

const SOLVER: &str = "eigen";

/// `Auto` switches from the dense decomposition to Arnoldi above this size
pub const DENSE_EIGEN_LIMIT: usize = 500;

/// Sweep budget per dimension for the Schur and SVD iterations
const DECOMPOSITION_SWEEPS: usize = 200;

/// Arnoldi stops early when the new direction is this small
const BREAKDOWN_TOL: f64 = 1e-12;

/// Eigenvalues whose imaginary part is below this share of their modulus count as real
const IMAGINARY_TOL: f64 = 1e-8;

/// How the dominant eigenpair is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EigenMethod {
    /// Dense up to `DENSE_EIGEN_LIMIT` nodes, Arnoldi beyond
    #[default]
    Auto,
    Dense,
    Arnoldi,
}

impl EigenMethod {
    pub fn name(&self) -> &'static str {
        match self {
            EigenMethod::Auto => "auto",
            EigenMethod::Dense => "dense",
            EigenMethod::Arnoldi => "arnoldi",
        }
    }

    fn resolve(self, n: usize) -> EigenMethod {
        match self {
            EigenMethod::Auto if n <= DENSE_EIGEN_LIMIT => EigenMethod::Dense,
            EigenMethod::Auto => EigenMethod::Arnoldi,
            other => other,
        }
    }
}

impl fmt::Display for EigenMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EigenMethod {
    type Err = PageRankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(EigenMethod::Auto),
            "dense" | "eig" => Ok(EigenMethod::Dense),
            "arnoldi" | "sparse" => Ok(EigenMethod::Arnoldi),
            _ => Err(PageRankError::UnknownEigenMethod(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EigenConfig {
    pub alpha: f64,
    /// L1 tolerance on `||G x - lambda x||` (Arnoldi only)
    pub tol: f64,
    /// Maximum number of Arnoldi restarts
    pub max_iter: usize,
    pub method: EigenMethod,
    /// Krylov subspace size per Arnoldi cycle
    pub krylov_dim: usize,
    #[serde(default)]
    pub edge_weight: EdgeWeight,
    pub teleport: Option<Vec<f64>>,
}

impl Default for EigenConfig {
    fn default() -> Self {
        Self {
            alpha: 0.85,
            tol: 1e-6,
            max_iter: 100,
            method: EigenMethod::Auto,
            krylov_dim: 20,
            edge_weight: EdgeWeight::Unit,
            teleport: None,
        }
    }
}

impl EigenConfig {
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_method(mut self, method: EigenMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_krylov_dim(mut self, krylov_dim: usize) -> Self {
        self.krylov_dim = krylov_dim;
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

/// `G x` on the raw transition matrix, with dangling mass sent along `v`
struct DampedOperator<'a> {
    a: &'a TransitionMatrix,
    alpha: f64,
    v: &'a [f64],
}

impl LinearOperator for DampedOperator<'_> {
    fn dim(&self) -> usize {
        self.a.dim()
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        let dangling_mass = self.a.dangling_mass(x);
        let total: f64 = x.iter().sum();
        self.a.matrix().matvec(x, y);
        for (i, value) in y.iter_mut().enumerate() {
            *value = self.alpha * (*value + dangling_mass * self.v[i])
                + (1.0 - self.alpha) * total * self.v[i];
        }
    }
}

fn decomposition_failed(what: &str) -> PageRankError {
    PageRankError::EigenDecomposition(format!("{} did not converge", what))
}

/// Dominant eigenvalue of a small dense matrix and a unit vector spanning
/// the null space of `M - lambda I`. Real eigenvalues are preferred over
/// complex ones of the same or larger modulus.
fn dominant_pair(m: &DMatrix<f64>) -> SolverResult<(f64, DVector<f64>)> {
    let n = m.nrows();
    let sweeps = DECOMPOSITION_SWEEPS * n.max(1);
    let schur = Schur::try_new(m.clone(), f64::EPSILON, sweeps)
        .ok_or_else(|| decomposition_failed("Schur decomposition"))?;
    let eigenvalues = schur.complex_eigenvalues();

    let is_real = |z: &nalgebra::Complex<f64>| z.im.abs() <= IMAGINARY_TOL * z.norm().max(1.0);
    let lambda = eigenvalues
        .iter()
        .filter(|z| is_real(*z))
        .max_by(|a, b| a.norm().total_cmp(&b.norm()))
        .or_else(|| eigenvalues.iter().max_by(|a, b| a.norm().total_cmp(&b.norm())))
        .map(|z| z.re)
        .ok_or_else(|| PageRankError::EigenDecomposition("empty matrix".to_string()))?;

    let mut shifted = m.clone();
    for i in 0..n {
        shifted[(i, i)] -= lambda;
    }
    let svd = SVD::try_new(shifted, false, true, f64::EPSILON, sweeps)
        .ok_or_else(|| decomposition_failed("SVD"))?;
    let v_t = svd.v_t.as_ref().ok_or_else(|| decomposition_failed("SVD"))?;
    let smallest = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(k, _)| k)
        .ok_or_else(|| decomposition_failed("SVD"))?;
    Ok((lambda, v_t.row(smallest).transpose()))
}

/// Absolute values rescaled to unit L1 mass
fn to_distribution(mut x: Vec<f64>, iteration: usize) -> SolverResult<Vec<f64>> {
    x.iter_mut().for_each(|value| *value = value.abs());
    clamp_and_normalize(&mut x, iteration)?;
    Ok(x)
}

/// `||G x - lambda x||_1`
fn eigen_residual(op: &dyn LinearOperator, x: &[f64], lambda: f64) -> f64 {
    let mut gx = vec![0.0; x.len()];
    op.apply(x, &mut gx);
    gx.iter().zip(x).map(|(g, xi)| (g - lambda * xi).abs()).sum()
}

/// Column-by-column dense copy of an operator
fn assemble_dense(op: &dyn LinearOperator) -> DMatrix<f64> {
    let n = op.dim();
    let mut m = DMatrix::zeros(n, n);
    let mut unit = vec![0.0; n];
    let mut column = vec![0.0; n];
    for j in 0..n {
        unit[j] = 1.0;
        op.apply(&unit, &mut column);
        unit[j] = 0.0;
        for (i, value) in column.iter().enumerate() {
            m[(i, j)] = *value;
        }
    }
    m
}

/// Dense dominant eigenvector, returned with `||G x - lambda x||_1`
fn dense_eigenvector(op: &dyn LinearOperator) -> SolverResult<(Vec<f64>, f64)> {
    let (lambda, vector) = dominant_pair(&assemble_dense(op))?;
    let x = to_distribution(vector.iter().copied().collect(), 1)?;
    let residual = eigen_residual(op, &x, lambda);
    Ok((x, residual))
}

/// Restarted Arnoldi from the uniform vector. Each cycle records one residual.
fn arnoldi_eigenvector(
    op: &dyn LinearOperator,
    tol: f64,
    max_iter: usize,
    krylov_dim: usize,
    mut on_cycle: impl FnMut(usize, f64),
) -> SolverResult<(Vec<f64>, ConvergenceTracker)> {
    let n = op.dim();
    let m = krylov_dim.clamp(1, n.max(1));
    let mut x = vec![1.0 / n as f64; n];
    let mut w = vec![0.0; n];
    let mut tracker = ConvergenceTracker::new(tol, max_iter);

    while tracker.is_running() {
        let cycle = tracker.iterations() + 1;
        let beta = l2_norm(&x);
        let mut basis: Vec<Vec<f64>> = vec![x.iter().map(|xi| xi / beta).collect()];
        let mut h = DMatrix::<f64>::zeros(m + 1, m);

        let mut k = 0;
        while k < m {
            op.apply(&basis[k], &mut w);
            for (i, vi) in basis.iter().enumerate() {
                let hik = dot(&w, vi);
                h[(i, k)] = hik;
                for (wj, vj) in w.iter_mut().zip(vi) {
                    *wj -= hik * vj;
                }
            }
            let norm = l2_norm(&w);
            h[(k + 1, k)] = norm;
            k += 1;
            // Invariant subspace reached
            if norm <= BREAKDOWN_TOL {
                break;
            }
            if k < m {
                basis.push(w.iter().map(|wj| wj / norm).collect());
            }
        }

        let hessenberg = h.view((0, 0), (k, k)).into_owned();
        let (theta, y) = dominant_pair(&hessenberg)?;
        let mut ritz = vec![0.0; n];
        for (yj, vj) in y.iter().zip(&basis) {
            for (r, v) in ritz.iter_mut().zip(vj) {
                *r += yj * v;
            }
        }
        x = to_distribution(ritz, cycle)?;

        let residual = eigen_residual(op, &x, theta);
        tracker.record(residual);
        on_cycle(cycle, residual);
    }
    Ok((x, tracker))
}

/// Dominant eigenvector of an explicit Google matrix by dense decomposition
pub fn eig_dense(g: &GoogleMatrix) -> SolverResult<Vec<f64>> {
    if g.dim() == 0 {
        return Ok(Vec::new());
    }
    dense_eigenvector(g).map(|(x, _)| x)
}

/// Dominant eigenvector of an explicit Google matrix by restarted Arnoldi.
/// Returns the vector and one residual per restart cycle.
pub fn eig_arnoldi(
    g: &GoogleMatrix,
    tol: f64,
    max_iter: usize,
    krylov_dim: usize,
) -> SolverResult<(Vec<f64>, Vec<f64>)> {
    if g.dim() == 0 {
        return Ok((Vec::new(), Vec::new()));
    }
    let (x, tracker) = arnoldi_eigenvector(g, tol, max_iter, krylov_dim, |_, _| {})?;
    Ok((x, tracker.into_history()))
}

pub struct EigenSolver {
    pub config: EigenConfig,
}

impl EigenSolver {
    pub fn new(config: EigenConfig) -> Self {
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
        validate_params(self.config.alpha, self.config.tol)?;
        if self.config.krylov_dim == 0 {
            return Err(PageRankError::InvalidConfig(
                "krylov_dim must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn run(
        &self,
        a: &TransitionMatrix,
        observer: &dyn SolveObserver,
        t0: Instant,
    ) -> SolverResult<PageRankResult> {
        let n = a.dim();
        let v = teleport_vector(self.config.teleport.as_deref(), n)?.to_vec();
        let op = DampedOperator { a, alpha: self.config.alpha, v: &v };
        observer.on_start(SOLVER, n);

        let method = self.config.method.resolve(n);
        let (x, residuals, converged) = match method {
            EigenMethod::Arnoldi => {
                let (x, tracker) = arnoldi_eigenvector(
                    &op,
                    self.config.tol,
                    self.config.max_iter,
                    self.config.krylov_dim,
                    |cycle, residual| observer.on_iteration(SOLVER, cycle, residual),
                )?;
                let converged = tracker.is_converged();
                if !converged {
                    observer.on_warning(
                        SOLVER,
                        &format!("Arnoldi did not converge after {} restarts", tracker.iterations()),
                    );
                }
                (x, tracker.into_history(), converged)
            }
            _ => {
                let (x, residual) = dense_eigenvector(&op)?;
                tracing::debug!(residual, "dense eigenvector");
                (x, Vec::new(), true)
            }
        };

        let elapsed = t0.elapsed();
        observer.on_finish(SOLVER, residuals.len(), converged, elapsed);
        Ok(PageRankResult::from_ranks(a.nodes(), x, residuals, converged, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::l1_distance;
    use crate::direct_lu::{DirectLuConfig, DirectLuSolver};
    use crate::observer::NoopObserver;

    fn web() -> GraphView {
        GraphView::from_edges(
            &[],
            &[(1, 2), (1, 3), (2, 3), (3, 1), (3, 4), (4, 5), (5, 1), (5, 3), (6, 5), (2, 7)],
        )
    }

    fn exact(view: &GraphView) -> Vec<f64> {
        DirectLuSolver::new(DirectLuConfig::default())
            .solve_with_observer(view, &NoopObserver)
            .unwrap()
            .ranks
    }

    #[test]
    fn test_dense_matches_direct_solve() {
        let view = web();
        let result = EigenSolver::new(EigenConfig::default().with_method(EigenMethod::Dense))
            .solve_with_observer(&view, &NoopObserver)
            .unwrap();
        assert!(result.converged);
        assert!(result.residuals.is_empty());
        assert!(l1_distance(&result.ranks, &exact(&view)) < 1e-10);
    }

    #[test]
    fn test_arnoldi_matches_direct_solve() {
        let view = web();
        let config = EigenConfig::default()
            .with_method(EigenMethod::Arnoldi)
            .with_tol(1e-12)
            .with_max_iter(200)
            .with_krylov_dim(4);
        let result = EigenSolver::new(config).solve_with_observer(&view, &NoopObserver).unwrap();
        assert!(result.converged);
        assert!(!result.residuals.is_empty());
        assert!(l1_distance(&result.ranks, &exact(&view)) < 1e-9);
        let sum: f64 = result.ranks.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_google_matrix_entry_points() {
        let view = web();
        let a = TransitionMatrixBuilder::new().build(&view).unwrap().with_dangling_fixed();
        let g = GoogleMatrix::build(&a, 0.85, None).unwrap();
        let dense = eig_dense(&g).unwrap();
        let (arnoldi, residuals) = eig_arnoldi(&g, 1e-12, 200, 5).unwrap();
        assert!(l1_distance(&dense, &arnoldi) < 1e-9);
        assert!(residuals.last().unwrap() < &1e-12);
        assert!(dense.iter().all(|x| *x > 0.0));
    }

    #[test]
    fn test_dominant_pair_of_diagonal_matrix() {
        let m = DMatrix::from_row_slice(3, 3, &[0.5, 0.0, 0.0, 0.0, -2.0, 0.0, 0.0, 0.0, 1.0]);
        let (lambda, v) = dominant_pair(&m).unwrap();
        assert!((lambda + 2.0).abs() < 1e-12);
        assert!((v[1].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_method_names() {
        assert_eq!("dense".parse::<EigenMethod>().unwrap(), EigenMethod::Dense);
        assert_eq!("Sparse".parse::<EigenMethod>().unwrap(), EigenMethod::Arnoldi);
        assert_eq!("auto".parse::<EigenMethod>().unwrap(), EigenMethod::Auto);
        assert!(matches!(
            "qr".parse::<EigenMethod>(),
            Err(PageRankError::UnknownEigenMethod(_))
        ));
        assert_eq!(EigenMethod::Auto.resolve(10), EigenMethod::Dense);
        assert_eq!(EigenMethod::Auto.resolve(DENSE_EIGEN_LIMIT + 1), EigenMethod::Arnoldi);
    }

    #[test]
    fn test_rejects_empty_krylov_space() {
        let solver = EigenSolver::new(EigenConfig::default().with_krylov_dim(0));
        assert!(matches!(
            solver.solve_with_observer(&web(), &NoopObserver),
            Err(PageRankError::InvalidConfig(_))
        ));
    }
}
