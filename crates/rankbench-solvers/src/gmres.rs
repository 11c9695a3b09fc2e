//! Restarted GMRES on `(I - alpha * P) x = (1 - alpha) * v`
//!
//! Right preconditioned, so the Arnoldi residual is the residual of the
//! original system whatever preconditioner is used. One relative residual
//! `||b - A x|| / ||b||` is recorded per Arnoldi step; `max_iter` bounds the
//! number of restart cycles.

use crate::common::GraphView;
use crate::convergence::{clamp_and_normalize, dot, l2_norm};
use crate::error::{PageRankError, SolverResult};
use crate::google::teleport_vector;
use crate::linear_system::{LinearOperator, PageRankOperator, PageRankSystem};
use crate::observer::{SolveObserver, TracingObserver};
use crate::preconditioner::{IluParams, Precondition, Preconditioner, PreconditionerOp};
use crate::solver::{validate_params, PageRankResult};
use crate::transition::{EdgeWeight, TransitionMatrix, TransitionMatrixBuilder};
use serde::{Deserialize, Serialize};
use std::time::Instant;

const SOLVER: &str = "gmres";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmresConfig {
    pub alpha: f64,
    /// Relative residual tolerance
    pub tol: f64,
    /// Maximum number of restart cycles. The residual trace has one entry
    /// per Arnoldi step, so it can be up to `max_iter * restart` long.
    pub max_iter: usize,
    /// Krylov subspace size per cycle
    pub restart: usize,
    pub preconditioner: Preconditioner,
    pub ilu: IluParams,
    /// Stored edge weights or unit weights
    #[serde(default)]
    pub edge_weight: EdgeWeight,
    pub teleport: Option<Vec<f64>>,
}

impl Default for GmresConfig {
    fn default() -> Self {
        Self {
            alpha: 0.85,
            tol: 1e-6,
            max_iter: 100,
            restart: 30,
            preconditioner: Preconditioner::default(),
            ilu: IluParams::default(),
            edge_weight: EdgeWeight::Unit,
            teleport: None,
        }
    }
}

impl GmresConfig {
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

    pub fn with_restart(mut self, restart: usize) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_preconditioner(mut self, preconditioner: Preconditioner) -> Self {
        self.preconditioner = preconditioner;
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

/// Raw result of [`gmres`]
#[derive(Debug, Clone)]
pub struct GmresOutcome {
    pub x: Vec<f64>,
    pub residuals: Vec<f64>,
    pub converged: bool,
}

/// Givens rotation zeroing `b` in `(a, b)`
fn givens(a: f64, b: f64) -> (f64, f64) {
    if b == 0.0 {
        (1.0, 0.0)
    } else {
        let r = a.hypot(b);
        (a / r, b / r)
    }
}

/// Restarted, right-preconditioned GMRES.
///
/// `on_step` sees every recorded relative residual in order.
#[allow(clippy::too_many_arguments)]
pub fn gmres(
    a: &dyn LinearOperator,
    m: &dyn Precondition,
    b: &[f64],
    x0: &[f64],
    tol: f64,
    restart: usize,
    max_cycles: usize,
    mut on_step: impl FnMut(usize, f64),
) -> GmresOutcome {
    let n = b.len();
    let restart = restart.clamp(1, n.max(1));
    let mut x = x0.to_vec();
    let mut residuals = Vec::new();
    let b_norm = l2_norm(b);
    if b_norm == 0.0 {
        return GmresOutcome { x: vec![0.0; n], residuals, converged: true };
    }

    let mut r = vec![0.0; n];
    let mut w = vec![0.0; n];
    let mut z = vec![0.0; n];
    let mut converged = false;

    for _ in 0..max_cycles {
        a.apply(&x, &mut r);
        for (ri, bi) in r.iter_mut().zip(b) {
            *ri = bi - *ri;
        }
        let beta = l2_norm(&r);
        if beta / b_norm < tol {
            converged = true;
            break;
        }

        let mut basis: Vec<Vec<f64>> = Vec::with_capacity(restart + 1);
        basis.push(r.iter().map(|ri| ri / beta).collect());
        // Column-major Hessenberg, already rotated to upper triangular
        let mut h: Vec<Vec<f64>> = Vec::with_capacity(restart);
        let mut cs: Vec<(f64, f64)> = Vec::with_capacity(restart);
        let mut g = vec![0.0; restart + 1];
        g[0] = beta;

        let mut steps = 0;
        for j in 0..restart {
            m.apply(&basis[j], &mut z);
            a.apply(&z, &mut w);

            // Modified Gram-Schmidt
            let mut col = vec![0.0; j + 2];
            for (i, v) in basis.iter().enumerate() {
                let hij = dot(&w, v);
                col[i] = hij;
                for (wk, vk) in w.iter_mut().zip(v) {
                    *wk -= hij * vk;
                }
            }
            let h_next = l2_norm(&w);
            col[j + 1] = h_next;

            for (i, &(c, s)) in cs.iter().enumerate() {
                let (hi, hk) = (col[i], col[i + 1]);
                col[i] = c * hi + s * hk;
                col[i + 1] = -s * hi + c * hk;
            }
            let (c, s) = givens(col[j], col[j + 1]);
            col[j] = c * col[j] + s * col[j + 1];
            col[j + 1] = 0.0;
            g[j + 1] = -s * g[j];
            g[j] *= c;
            cs.push((c, s));
            h.push(col);
            steps = j + 1;

            let relative = g[j + 1].abs() / b_norm;
            residuals.push(relative);
            on_step(residuals.len(), relative);

            if relative < tol || h_next == 0.0 {
                converged = relative < tol;
                break;
            }
            basis.push(w.iter().map(|wk| wk / h_next).collect());
        }

        // Back substitution on the triangular system
        let mut y = vec![0.0; steps];
        for i in (0..steps).rev() {
            let mut sum = g[i];
            for k in (i + 1)..steps {
                sum -= h[k][i] * y[k];
            }
            y[i] = if h[i][i] != 0.0 { sum / h[i][i] } else { 0.0 };
        }
        let mut update = vec![0.0; n];
        for (yk, v) in y.iter().zip(&basis) {
            for (ui, vi) in update.iter_mut().zip(v) {
                *ui += yk * vi;
            }
        }
        m.apply(&update, &mut z);
        for (xi, zi) in x.iter_mut().zip(&z) {
            *xi += zi;
        }

        if converged {
            break;
        }
    }

    GmresOutcome { x, residuals, converged }
}

pub struct GmresSolver {
    pub config: GmresConfig,
}

impl GmresSolver {
    pub fn new(config: GmresConfig) -> Self {
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

    /// Solve with a prebuilt (unfixed) transition matrix
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
        if self.config.restart == 0 {
            return Err(PageRankError::InvalidConfig("restart must be at least 1".to_string()));
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
        let alpha = self.config.alpha;
        let v = teleport_vector(self.config.teleport.as_deref(), n)?;
        observer.on_start(SOLVER, n);

        let preconditioner = match self.config.preconditioner {
            Preconditioner::None => PreconditionerOp::Identity,
            kind => {
                let system = PageRankSystem::assemble(a, alpha, self.config.teleport.as_deref())?;
                kind.build(&system.matrix, self.config.ilu)?
            }
        };

        let operator = PageRankOperator::new(a.matrix(), alpha);
        let b: Vec<f64> = v.iter().map(|vi| (1.0 - alpha) * vi).collect();
        // Starting from v keeps the iterate at roughly unit mass
        let x0 = v.to_vec();
        let outcome = gmres(
            &operator,
            &preconditioner,
            &b,
            &x0,
            self.config.tol,
            self.config.restart,
            self.config.max_iter,
            |step, residual| observer.on_iteration(SOLVER, step, residual),
        );

        let mut x = outcome.x;
        let iterations = outcome.residuals.len();
        if !outcome.converged {
            observer.on_warning(
                SOLVER,
                &format!(
                    "did not reach tolerance {} within {} restart cycles",
                    self.config.tol, self.config.max_iter
                ),
            );
        }
        clamp_and_normalize(&mut x, iterations)?;

        let elapsed = t0.elapsed();
        observer.on_finish(SOLVER, iterations, outcome.converged, elapsed);
        Ok(PageRankResult::from_ranks(a.nodes(), x, outcome.residuals, outcome.converged, elapsed))
    }
}
