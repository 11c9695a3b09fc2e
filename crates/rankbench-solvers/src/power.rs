//! Power iteration
//!
//! `p_{k+1} = alpha * (A p_k + (d . p_k) v) + (1 - alpha) v`, where `d . p_k`
//! is the rank mass held by dangling nodes. The Google matrix is never
//! materialised; dangling mass is redistributed along the teleport vector.

use crate::common::GraphView;
use crate::convergence::{clamp_and_normalize, l1_distance, ConvergenceStatus, ConvergenceTracker};
use crate::error::{PageRankError, SolverResult};
use crate::google::{teleport_vector, GoogleMatrix};
use crate::observer::{SolveObserver, TracingObserver};
use crate::solver::{validate_params, PageRankResult};
use crate::transition::{EdgeWeight, TransitionMatrix, TransitionMatrixBuilder};
use serde::{Deserialize, Serialize};
use std::time::Instant;

const SOLVER: &str = "power";

/// Power iteration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerConfig {
    /// Damping factor (usually 0.85)
    pub alpha: f64,
    /// L1 tolerance on successive iterates
    pub tol: f64,
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Stored edge weights or unit weights
    #[serde(default)]
    pub edge_weight: EdgeWeight,
    /// Personalised teleport vector in node-index order (uniform when `None`)
    pub teleport: Option<Vec<f64>>,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.85,
            tol: 1e-6,
            max_iter: 100,
            edge_weight: EdgeWeight::Unit,
            teleport: None,
        }
    }
}

impl PowerConfig {
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

    pub fn with_edge_weight(mut self, edge_weight: EdgeWeight) -> Self {
        self.edge_weight = edge_weight;
        self
    }

    pub fn with_teleport(mut self, teleport: Vec<f64>) -> Self {
        self.teleport = Some(teleport);
        self
    }
}

pub struct PowerIterationSolver {
    pub config: PowerConfig,
}

impl PowerIterationSolver {
    pub fn new(config: PowerConfig) -> Self {
        Self { config }
    }

    /// Calculate PageRank for the graph view
    pub fn solve(&self, view: &GraphView) -> SolverResult<PageRankResult> {
        self.solve_with_observer(view, &TracingObserver::default())
    }

    pub fn solve_with_observer(
        &self,
        view: &GraphView,
        observer: &dyn SolveObserver,
    ) -> SolverResult<PageRankResult> {
        validate_params(self.config.alpha, self.config.tol)?;
        if view.node_count == 0 {
            return Ok(PageRankResult::empty());
        }
        let t0 = Instant::now();
        let a = TransitionMatrixBuilder::new()
            .with_edge_weight(self.config.edge_weight)
            .build(view)?;
        self.run(&a, observer, t0)
    }

    /// Iterate on an already built transition matrix. Dangling mass is handled
    /// explicitly unless the matrix had its dangling columns fixed.
    pub fn solve_matrix(
        &self,
        a: &TransitionMatrix,
        observer: &dyn SolveObserver,
    ) -> SolverResult<PageRankResult> {
        validate_params(self.config.alpha, self.config.tol)?;
        if a.dim() == 0 {
            return Ok(PageRankResult::empty());
        }
        self.run(a, observer, Instant::now())
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

        let mut p = vec![1.0 / n as f64; n];
        let mut next = vec![0.0; n];
        let mut tracker = ConvergenceTracker::new(self.config.tol, self.config.max_iter);

        while tracker.is_running() {
            let iteration = tracker.iterations() + 1;
            let dangling_mass = a.dangling_mass(&p);
            a.matrix().matvec(&p, &mut next);
            for i in 0..n {
                next[i] = alpha * (next[i] + dangling_mass * v[i]) + (1.0 - alpha) * v[i];
            }
            clamp_and_normalize(&mut next, iteration)?;

            let residual = l1_distance(&next, &p);
            std::mem::swap(&mut p, &mut next);
            tracker.record(residual);
            observer.on_iteration(SOLVER, iteration, residual);
        }

        let converged = tracker.is_converged();
        if !converged {
            observer.on_warning(
                SOLVER,
                &format!("did not converge after {} iterations", tracker.iterations()),
            );
        }
        let elapsed = t0.elapsed();
        observer.on_finish(SOLVER, tracker.iterations(), converged, elapsed);
        Ok(PageRankResult::from_ranks(a.nodes(), p, tracker.into_history(), converged, elapsed))
    }
}

/// Power method on an explicit Google matrix.
///
/// Every step takes the absolute value of `G x` and rescales it to unit L1
/// mass. Returns the final vector and the L1 distance between successive
/// iterates.
pub fn power_method(
    g: &GoogleMatrix,
    tol: f64,
    max_iter: usize,
    x0: Option<&[f64]>,
) -> SolverResult<(Vec<f64>, Vec<f64>)> {
    let n = g.dim();
    if n == 0 {
        return Ok((Vec::new(), Vec::new()));
    }
    let mut x = match x0 {
        None => vec![1.0 / n as f64; n],
        Some(x0) => {
            if x0.len() != n {
                return Err(PageRankError::Shape(format!(
                    "initial vector has {} entries, expected {}",
                    x0.len(),
                    n
                )));
            }
            if x0.iter().any(|&v| v < 0.0) {
                return Err(PageRankError::InvalidConfig(
                    "initial vector must be non-negative".to_string(),
                ));
            }
            let mut x = x0.to_vec();
            clamp_and_normalize(&mut x, 0)?;
            x
        }
    };

    let mut y = vec![0.0; n];
    let mut tracker = ConvergenceTracker::new(tol, max_iter);
    while tracker.is_running() {
        g.matrix().matvec(&x, &mut y);
        let mut sum = 0.0;
        for value in y.iter_mut() {
            *value = value.abs();
            sum += *value;
        }
        if sum == 0.0 {
            return Err(PageRankError::DegenerateVector { iteration: tracker.iterations() + 1 });
        }
        y.iter_mut().for_each(|value| *value /= sum);

        let err = l1_distance(&y, &x);
        std::mem::swap(&mut x, &mut y);
        if tracker.record(err) == ConvergenceStatus::Converged {
            break;
        }
    }
    Ok((x, tracker.into_history()))
}
