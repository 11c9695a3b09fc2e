//! Gauss-Seidel / SOR sweeps
//!
//! Each sweep updates the rank vector in place, row by row, so row `i` already
//! sees the new values of rows `< i`. The dangling mass is taken from the
//! vector as it was before the sweep started.

use crate::common::GraphView;
use crate::convergence::{clamp_and_normalize, ConvergenceTracker};
use crate::error::SolverResult;
use crate::google::teleport_vector;
use crate::observer::{SolveObserver, TracingObserver};
use crate::omega::{
    analytic_omega, linspace, DynamicOmega, OmegaStrategy, AUTO_CANDIDATES, AUTO_OMEGA_HIGH,
    AUTO_OMEGA_LOW, AUTO_TRIAL_ITERS,
};
use crate::solver::{validate_params, PageRankResult};
use crate::transition::{EdgeWeight, TransitionMatrix, TransitionMatrixBuilder};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const SOLVER: &str = "gauss_seidel";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussSeidelConfig {
    pub alpha: f64,
    pub tol: f64,
    pub max_iter: usize,
    /// Relaxation factor selection; `Fixed(1.0)` is plain Gauss-Seidel
    pub omega: OmegaStrategy,
    /// Stored edge weights or unit weights
    #[serde(default)]
    pub edge_weight: EdgeWeight,
    pub teleport: Option<Vec<f64>>,
}

impl Default for GaussSeidelConfig {
    fn default() -> Self {
        Self {
            alpha: 0.85,
            tol: 1e-6,
            max_iter: 100,
            omega: OmegaStrategy::default(),
            edge_weight: EdgeWeight::Unit,
            teleport: None,
        }
    }
}

impl GaussSeidelConfig {
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

    pub fn with_omega(mut self, omega: OmegaStrategy) -> Self {
        self.omega = omega;
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

/// Outcome of one bounded trial run during omega calibration
#[derive(Debug, Clone, PartialEq)]
pub struct OmegaTrial {
    pub omega: f64,
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
}

/// Rows of the fixed-point equation, borrowed for the duration of a solve
struct Sweeper<'a> {
    a: &'a TransitionMatrix,
    v: &'a Array1<f64>,
    alpha: f64,
}

impl Sweeper<'_> {
    /// One in-place sweep; returns the L1 norm of the change.
    fn sweep(&self, p: &mut [f64], omega: f64) -> f64 {
        let dangling_mass = self.a.dangling_mass(p);
        let mut diff = 0.0;
        for i in 0..p.len() {
            let sigma = self.a.matrix().row_dot(i, p);
            let new = (1.0 - self.alpha) * self.v[i]
                + self.alpha * dangling_mass * self.v[i]
                + self.alpha * sigma;
            let relaxed = (1.0 - omega) * p[i] + omega * new;
            diff += (relaxed - p[i]).abs();
            p[i] = relaxed;
        }
        diff
    }

    fn trial(&self, omega: f64, tol: f64, budget: usize) -> OmegaTrial {
        let n = self.v.len();
        let mut p = vec![1.0 / n as f64; n];
        let mut tracker = ConvergenceTracker::new(tol, budget);
        while tracker.is_running() {
            let diff = self.sweep(&mut p, omega);
            // Divergent candidates must never win
            tracker.record(if diff.is_finite() { diff } else { f64::INFINITY });
        }
        OmegaTrial {
            omega,
            iterations: tracker.iterations(),
            residual: tracker.last().unwrap_or(f64::INFINITY),
            converged: tracker.is_converged(),
        }
    }
}

/// Fewest iterations wins, ties go to the smaller final residual.
fn best_trial(trials: &[OmegaTrial]) -> Option<&OmegaTrial> {
    trials.iter().min_by(|a, b| {
        a.iterations
            .cmp(&b.iterations)
            .then(a.residual.total_cmp(&b.residual))
    })
}

pub struct GaussSeidelSolver {
    pub config: GaussSeidelConfig,
}

impl GaussSeidelSolver {
    pub fn new(config: GaussSeidelConfig) -> Self {
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
        validate_params(self.config.alpha, self.config.tol)?;
        self.config.omega.validate()?;
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
        validate_params(self.config.alpha, self.config.tol)?;
        self.config.omega.validate()?;
        if a.dim() == 0 {
            return Ok(PageRankResult::empty());
        }
        self.run(a, observer, Instant::now())
    }

    /// Run the bounded trials of the auto strategy, one candidate per task.
    pub fn calibrate(&self, a: &TransitionMatrix) -> SolverResult<Vec<OmegaTrial>> {
        let (low, high, candidates, trial_iters) = match self.config.omega {
            OmegaStrategy::Auto { low, high, candidates, trial_iters } => {
                (low, high, candidates, trial_iters)
            }
            _ => (AUTO_OMEGA_LOW, AUTO_OMEGA_HIGH, AUTO_CANDIDATES, AUTO_TRIAL_ITERS),
        };
        validate_params(self.config.alpha, self.config.tol)?;
        let v = teleport_vector(self.config.teleport.as_deref(), a.dim())?;
        if a.dim() == 0 {
            return Ok(Vec::new());
        }
        let sweeper = Sweeper { a, v: &v, alpha: self.config.alpha };
        let budget = trial_iters.min(self.config.max_iter).max(1);
        let trials: Vec<OmegaTrial> = linspace(low, high, candidates)
            .into_par_iter()
            .map(|omega| sweeper.trial(omega, self.config.tol, budget))
            .collect();
        Ok(trials)
    }

    fn initial_omega(&self, a: &TransitionMatrix) -> SolverResult<f64> {
        Ok(match self.config.omega {
            OmegaStrategy::Fixed(omega) => omega,
            OmegaStrategy::Analytic => analytic_omega(self.config.alpha),
            OmegaStrategy::Dynamic => DynamicOmega::default().omega(),
            OmegaStrategy::Auto { .. } => {
                let trials = self.calibrate(a)?;
                match best_trial(&trials) {
                    Some(best) => {
                        tracing::debug!(
                            omega = best.omega,
                            iterations = best.iterations,
                            residual = best.residual,
                            "selected relaxation factor"
                        );
                        best.omega
                    }
                    None => 1.0,
                }
            }
        })
    }

    fn run(
        &self,
        a: &TransitionMatrix,
        observer: &dyn SolveObserver,
        t0: Instant,
    ) -> SolverResult<PageRankResult> {
        let n = a.dim();
        let v = teleport_vector(self.config.teleport.as_deref(), n)?;
        observer.on_start(SOLVER, n);

        let sweeper = Sweeper { a, v: &v, alpha: self.config.alpha };
        let mut omega = self.initial_omega(a)?;
        let mut dynamic = match self.config.omega {
            OmegaStrategy::Dynamic => Some(DynamicOmega::new(omega)),
            _ => None,
        };

        let mut p = vec![1.0 / n as f64; n];
        let mut tracker = ConvergenceTracker::new(self.config.tol, self.config.max_iter);
        while tracker.is_running() {
            let iteration = tracker.iterations() + 1;
            observer.on_omega(iteration, omega);
            let diff = sweeper.sweep(&mut p, omega);
            tracker.record(diff);
            observer.on_iteration(SOLVER, iteration, diff);
            if let Some(dynamic) = dynamic.as_mut() {
                omega = dynamic.update(diff);
            }
        }

        if let Some(dynamic) = &dynamic {
            if dynamic.is_locked() {
                observer.on_warning(
                    SOLVER,
                    &format!("relaxation factor locked at {:.3} after repeated divergence", dynamic.omega()),
                );
            }
        }
        clamp_and_normalize(&mut p, tracker.iterations())?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::l1_distance;
    use crate::observer::{NoopObserver, RecordingObserver};
    use crate::power::{PowerConfig, PowerIterationSolver};

    fn cycle_with_tail() -> GraphView {
        GraphView::from_edges(&[], &[(1, 2), (1, 3), (2, 3), (3, 1), (4, 3)])
    }

    fn reference(view: &GraphView) -> Vec<f64> {
        PowerIterationSolver::new(PowerConfig::default().with_tol(1e-13).with_max_iter(2000))
            .solve_with_observer(view, &NoopObserver)
            .unwrap()
            .ranks
    }

    #[test]
    fn test_plain_gauss_seidel_matches_power() {
        let view = cycle_with_tail();
        let solver = GaussSeidelSolver::new(GaussSeidelConfig::default().with_tol(1e-12).with_max_iter(500));
        let result = solver.solve_with_observer(&view, &NoopObserver).unwrap();

        assert!(result.converged);
        assert!(l1_distance(&result.ranks, &reference(&view)) < 1e-8);
        let sum: f64 = result.ranks.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unit_omega_first_sweep_identical_across_strategies() {
        let view = cycle_with_tail();
        let fixed = GaussSeidelSolver::new(GaussSeidelConfig::default().with_max_iter(1))
            .solve_with_observer(&view, &NoopObserver)
            .unwrap();
        let dynamic = GaussSeidelSolver::new(
            GaussSeidelConfig::default().with_max_iter(1).with_omega(OmegaStrategy::Dynamic),
        )
        .solve_with_observer(&view, &NoopObserver)
        .unwrap();

        assert_eq!(fixed.ranks, dynamic.ranks);
        assert_eq!(fixed.residuals, dynamic.residuals);
    }

    #[test]
    fn test_over_relaxation_reaches_same_fixed_point() {
        let view = GraphView::from_edges(&[], &[(1, 2), (2, 3), (3, 1), (3, 4), (4, 1), (2, 5)]);
        let expected = reference(&view);
        for omega in [OmegaStrategy::Fixed(1.1), OmegaStrategy::Dynamic] {
            let result = GaussSeidelSolver::new(
                GaussSeidelConfig::default().with_tol(1e-12).with_max_iter(2000).with_omega(omega.clone()),
            )
            .solve_with_observer(&view, &NoopObserver)
            .unwrap();
            assert!(result.converged, "{:?} did not converge", omega);
            assert!(l1_distance(&result.ranks, &expected) < 1e-7, "{:?}", omega);
        }
    }

    #[test]
    fn test_auto_calibration_picks_a_candidate() {
        let view = cycle_with_tail();
        let a = TransitionMatrixBuilder::new().build(&view).unwrap();
        let solver = GaussSeidelSolver::new(
            GaussSeidelConfig::default().with_tol(1e-10).with_omega(OmegaStrategy::auto()),
        );
        let trials = solver.calibrate(&a).unwrap();
        assert_eq!(trials.len(), 10);
        assert!(trials.iter().all(|t| t.iterations <= 50));

        let best = best_trial(&trials).unwrap();
        assert!(trials.iter().all(|t| t.iterations >= best.iterations));

        let observer = RecordingObserver::new();
        let result = solver.solve_with_observer(&view, &observer).unwrap();
        let used = observer.omegas();
        assert!(!used.is_empty());
        assert!(used.iter().all(|w| *w == best.omega));
        assert!(l1_distance(&result.ranks, &reference(&view)) < 1e-7);
    }

    #[test]
    fn test_dynamic_omega_stays_in_bounds() {
        let view = GraphView::from_edges(&[], &[(1, 2), (2, 3), (3, 4), (4, 1), (4, 2), (2, 5)]);
        let observer = RecordingObserver::new();
        GaussSeidelSolver::new(
            GaussSeidelConfig::default().with_tol(1e-12).with_max_iter(300).with_omega(OmegaStrategy::Dynamic),
        )
        .solve_with_observer(&view, &observer)
        .unwrap();

        let omegas = observer.omegas();
        assert_eq!(omegas[0], 1.0);
        assert!(omegas.iter().all(|w| (1.0..=1.3).contains(w)));
    }

    #[test]
    fn test_analytic_omega_is_used() {
        let observer = RecordingObserver::new();
        GaussSeidelSolver::new(
            GaussSeidelConfig::default().with_max_iter(3).with_omega(OmegaStrategy::Analytic),
        )
        .solve_with_observer(&cycle_with_tail(), &observer)
        .unwrap();
        assert!(observer.omegas().iter().all(|w| *w == analytic_omega(0.85)));
    }

    #[test]
    fn test_rejects_bad_omega() {
        let solver = GaussSeidelSolver::new(GaussSeidelConfig::default().with_omega(OmegaStrategy::Fixed(2.5)));
        assert!(solver.solve_with_observer(&cycle_with_tail(), &NoopObserver).is_err());
    }
}
