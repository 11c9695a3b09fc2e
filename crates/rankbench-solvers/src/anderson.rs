//! Anderson-accelerated power iteration
//!
//! Keeps the last `window` pairs `(x_k, g_k = G(x_k))`. With at least two
//! pairs it solves `min ||f_last - dF gamma||_2` by QR, where `f = g - x`
//! and `dF` holds consecutive differences, and proposes
//! `g_last - dG gamma`. The proposal is only taken when its residual beats
//! both the previous iteration's and the plain update's; otherwise the plain
//! update is used.
//!
//! From the first accepted proposal on, the plain power path is carried
//! alongside. The solve returns whichever path ends with the smaller
//! residual, so it never finishes behind power iteration with the same
//! budget.

use crate::common::GraphView;
use crate::convergence::{clamp_and_normalize, l1_distance, ConvergenceTracker};
use crate::error::{PageRankError, SolverResult};
use crate::google::teleport_vector;
use crate::observer::{SolveObserver, TracingObserver};
use crate::solver::{validate_params, PageRankResult};
use crate::transition::{EdgeWeight, TransitionMatrix, TransitionMatrixBuilder};
use nalgebra::{DMatrix, DVector};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

const SOLVER: &str = "anderson";

/// Smallest acceptable ratio between the extreme diagonal entries of `R`
const MIN_CONDITION_RATIO: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndersonConfig {
    pub alpha: f64,
    pub tol: f64,
    pub max_iter: usize,
    /// Number of iterate pairs kept for mixing
    pub window: usize,
    /// Stored edge weights or unit weights
    #[serde(default)]
    pub edge_weight: EdgeWeight,
    pub teleport: Option<Vec<f64>>,
}

impl Default for AndersonConfig {
    fn default() -> Self {
        Self {
            alpha: 0.85,
            tol: 1e-6,
            max_iter: 100,
            window: 2,
            edge_weight: EdgeWeight::Unit,
            teleport: None,
        }
    }
}

impl AndersonConfig {
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

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
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

/// What happened to the accelerated proposals of one solve
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AndersonStats {
    /// Proposals taken
    pub accepted: usize,
    /// Proposals whose residual did not improve
    pub rejected: usize,
    /// Least-squares steps that were singular or ill-conditioned
    pub fallbacks: usize,
    /// Iterations with too few pairs to mix
    pub plain: usize,
    /// The plain power path ended ahead and was returned instead
    pub plain_path_returned: bool,
}

/// Power iteration continued from the step where the accelerated path left it
struct PlainPath {
    p: Vec<f64>,
    g: Vec<f64>,
    tracker: ConvergenceTracker,
}

/// Mixing coefficients for `min ||f_last - dF gamma||_2`, `None` when the
/// problem is rank deficient.
fn mixing_coefficients(df: &DMatrix<f64>, f_last: &DVector<f64>) -> Option<DVector<f64>> {
    if df.nrows() < df.ncols() || df.ncols() == 0 {
        return None;
    }
    let qr = df.clone().qr();
    let r = qr.r();
    let diag: Vec<f64> = (0..r.ncols()).map(|i| r[(i, i)].abs()).collect();
    let largest = diag.iter().cloned().fold(0.0, f64::max);
    let smallest = diag.iter().cloned().fold(f64::INFINITY, f64::min);
    if largest == 0.0 || smallest / largest < MIN_CONDITION_RATIO {
        return None;
    }
    let rhs = qr.q().transpose() * f_last;
    let gamma = r.solve_upper_triangular(&rhs)?;
    gamma.iter().all(|g| g.is_finite()).then_some(gamma)
}

pub struct AndersonSolver {
    pub config: AndersonConfig,
}

impl AndersonSolver {
    pub fn new(config: AndersonConfig) -> Self {
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
        self.solve_with_stats(view, observer).map(|(result, _)| result)
    }

    /// Solve and report how often acceleration was used
    pub fn solve_with_stats(
        &self,
        view: &GraphView,
        observer: &dyn SolveObserver,
    ) -> SolverResult<(PageRankResult, AndersonStats)> {
        self.validate()?;
        if view.node_count == 0 {
            return Ok((PageRankResult::empty(), AndersonStats::default()));
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
    ) -> SolverResult<(PageRankResult, AndersonStats)> {
        self.validate()?;
        if a.dim() == 0 {
            return Ok((PageRankResult::empty(), AndersonStats::default()));
        }
        self.run(a, observer, Instant::now())
    }

    fn validate(&self) -> SolverResult<()> {
        validate_params(self.config.alpha, self.config.tol)?;
        if self.config.window == 0 {
            return Err(PageRankError::InvalidConfig("window must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Plain damped update `G(p)`, normalized
    fn base_update(
        &self,
        a: &TransitionMatrix,
        v: &Array1<f64>,
        p: &[f64],
        out: &mut [f64],
        iteration: usize,
    ) -> SolverResult<()> {
        let alpha = self.config.alpha;
        let dangling_mass = a.dangling_mass(p);
        a.matrix().matvec(p, out);
        for (i, value) in out.iter_mut().enumerate() {
            *value = alpha * (*value + dangling_mass * v[i]) + (1.0 - alpha) * v[i];
        }
        clamp_and_normalize(out, iteration)
    }

    /// Accelerated candidate from the current window
    fn propose(window: &VecDeque<(Vec<f64>, Vec<f64>)>, n: usize) -> Option<Vec<f64>> {
        let cols = window.len() - 1;
        let residual = |k: usize, i: usize| window[k].1[i] - window[k].0[i];
        let df = DMatrix::from_fn(n, cols, |i, k| residual(k + 1, i) - residual(k, i));
        let f_last = DVector::from_fn(n, |i, _| residual(cols, i));
        let gamma = mixing_coefficients(&df, &f_last)?;

        let g_last = &window[cols].1;
        let mut candidate = g_last.clone();
        for (k, gk) in gamma.iter().enumerate() {
            for (i, c) in candidate.iter_mut().enumerate() {
                *c -= gk * (window[k + 1].1[i] - window[k].1[i]);
            }
        }
        Some(candidate)
    }

    fn run(
        &self,
        a: &TransitionMatrix,
        observer: &dyn SolveObserver,
        t0: Instant,
    ) -> SolverResult<(PageRankResult, AndersonStats)> {
        let n = a.dim();
        let v = teleport_vector(self.config.teleport.as_deref(), n)?;
        observer.on_start(SOLVER, n);

        let mut stats = AndersonStats::default();
        let mut window: VecDeque<(Vec<f64>, Vec<f64>)> = VecDeque::with_capacity(self.config.window + 1);
        let mut p = vec![1.0 / n as f64; n];
        let mut g = vec![0.0; n];
        let mut tracker = ConvergenceTracker::new(self.config.tol, self.config.max_iter);
        let mut plain_path: Option<PlainPath> = None;

        while tracker.is_running() {
            let iteration = tracker.iterations() + 1;
            self.base_update(a, &v, &p, &mut g, iteration)?;
            let plain_residual = l1_distance(&g, &p);

            window.push_back((p.clone(), g.clone()));
            if window.len() > self.config.window {
                window.pop_front();
            }

            let mut next = None;
            if window.len() >= 2 {
                let proposal = Self::propose(&window, n).and_then(|mut candidate| {
                    clamp_and_normalize(&mut candidate, iteration).ok().map(|_| candidate)
                });
                match proposal {
                    Some(candidate) => {
                        let candidate_residual = l1_distance(&candidate, &p);
                        let previous = tracker.last().unwrap_or(f64::INFINITY);
                        if candidate_residual < previous && candidate_residual < plain_residual {
                            stats.accepted += 1;
                            next = Some((candidate, candidate_residual));
                        } else {
                            stats.rejected += 1;
                        }
                    }
                    None => stats.fallbacks += 1,
                }
            } else {
                stats.plain += 1;
            }

            match plain_path.as_mut() {
                Some(path) => {
                    self.base_update(a, &v, &path.p, &mut path.g, iteration)?;
                    let residual = l1_distance(&path.g, &path.p);
                    std::mem::swap(&mut path.p, &mut path.g);
                    path.tracker.record(residual);
                }
                None if next.is_some() => {
                    // Until now both paths were identical
                    let mut path_tracker = tracker.clone();
                    path_tracker.record(plain_residual);
                    plain_path = Some(PlainPath {
                        p: g.clone(),
                        g: vec![0.0; n],
                        tracker: path_tracker,
                    });
                }
                None => {}
            }

            let residual = match next {
                Some((candidate, residual)) => {
                    p = candidate;
                    residual
                }
                None => {
                    std::mem::swap(&mut p, &mut g);
                    plain_residual
                }
            };
            tracker.record(residual);
            observer.on_iteration(SOLVER, iteration, residual);

            // Power iteration would have stopped here
            if plain_path.as_ref().is_some_and(|path| path.tracker.is_converged()) {
                break;
            }
        }

        if let Some(path) = plain_path {
            let accelerated = tracker.last().unwrap_or(f64::INFINITY);
            if path.tracker.last().is_some_and(|r| r < accelerated) {
                stats.plain_path_returned = true;
                p = path.p;
                tracker = path.tracker;
            }
        }

        let converged = tracker.is_converged();
        if !converged {
            observer.on_warning(
                SOLVER,
                &format!("did not converge after {} iterations", tracker.iterations()),
            );
        }
        tracing::debug!(
            accepted = stats.accepted,
            rejected = stats.rejected,
            fallbacks = stats.fallbacks,
            plain_path_returned = stats.plain_path_returned,
            "anderson mixing"
        );
        let elapsed = t0.elapsed();
        observer.on_finish(SOLVER, tracker.iterations(), converged, elapsed);
        let result = PageRankResult::from_ranks(a.nodes(), p, tracker.into_history(), converged, elapsed);
        Ok((result, stats))
    }
}
