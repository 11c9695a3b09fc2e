//! Solver comparison and timing

use super::reference::reference_pagerank_with;
use ndarray::Array1;
use rankbench_solvers::{
    EdgeWeight, GraphView, NodeId, NoopObserver, PageRankResult, Solver, SolverResult,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{info, warn};

/// Distances between two rank vectors
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankComparison {
    pub l1: f64,
    pub l2: f64,
    pub max_abs: f64,
}

/// Compare two aligned rank vectors. A shorter vector is padded with zeros.
pub fn compare_ranks(a: &[f64], b: &[f64]) -> RankComparison {
    let n = a.len().max(b.len());
    let pad = |x: &[f64]| {
        let mut v = x.to_vec();
        v.resize(n, 0.0);
        Array1::from(v)
    };
    let diff = pad(a) - &pad(b);
    RankComparison {
        l1: diff.iter().map(|d| d.abs()).sum(),
        l2: diff.dot(&diff).sqrt(),
        max_abs: diff.iter().fold(0.0, |m, d| m.max(d.abs())),
    }
}

/// Compare two score maps aligned on the node order of `a`. Nodes present
/// in only one of them count as 0 on the other side.
pub fn compare_scores(a: &PageRankResult, b: &PageRankResult) -> RankComparison {
    let mut order = a.nodes.clone();
    let known: HashSet<NodeId> = order.iter().copied().collect();
    order.extend(b.nodes.iter().copied().filter(|id| !known.contains(id)));

    let lookup = |r: &PageRankResult| -> Vec<f64> {
        order.iter().map(|id| r.score(*id).unwrap_or(0.0)).collect()
    };
    compare_ranks(&lookup(a), &lookup(b))
}

/// `k` highest scores, descending, ties broken by node id
pub fn top_k(scores: &HashMap<NodeId, f64>, k: usize) -> Vec<(NodeId, f64)> {
    let mut pairs: Vec<(NodeId, f64)> = scores.iter().map(|(&id, &s)| (id, s)).collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    pairs.truncate(k);
    pairs
}

/// Fraction of shared nodes between the two top-`k` sets.
///
/// Empty inputs or `k == 0` agree trivially (1.0).
pub fn rank_agreement(a: &HashMap<NodeId, f64>, b: &HashMap<NodeId, f64>, k: usize) -> f64 {
    let top_a: HashSet<NodeId> = top_k(a, k).into_iter().map(|(id, _)| id).collect();
    let top_b: HashSet<NodeId> = top_k(b, k).into_iter().map(|(id, _)| id).collect();
    let size = top_a.len().max(top_b.len());
    if size == 0 {
        return 1.0;
    }
    top_a.intersection(&top_b).count() as f64 / size as f64
}

/// Wall-clock statistics of repeated runs of one solver
#[derive(Debug, Clone, Serialize)]
pub struct TimingStats {
    pub solver: String,
    pub repeat: usize,
    pub mean_secs: f64,
    pub std_secs: f64,
    pub min_secs: f64,
}

/// Run every solver `repeat` times (at least once) and report mean and
/// population standard deviation of the elapsed time
pub fn timing_benchmark(
    view: &GraphView,
    solvers: &[Solver],
    repeat: usize,
) -> SolverResult<Vec<TimingStats>> {
    let repeat = repeat.max(1);
    let mut stats = Vec::with_capacity(solvers.len());
    for solver in solvers {
        let mut times = Vec::with_capacity(repeat);
        for _ in 0..repeat {
            let t0 = Instant::now();
            solver.solve_with_observer(view, &NoopObserver)?;
            times.push(t0.elapsed().as_secs_f64());
        }
        let mean = times.iter().sum::<f64>() / repeat as f64;
        let var = times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / repeat as f64;
        info!("{}: {:.6}s +/- {:.6}s over {} runs", solver.name(), mean, var.sqrt(), repeat);
        stats.push(TimingStats {
            solver: solver.name().to_string(),
            repeat,
            mean_secs: mean,
            std_secs: var.sqrt(),
            min_secs: times.iter().copied().fold(f64::INFINITY, f64::min),
        });
    }
    Ok(stats)
}

/// Shared parameters for [`run_comparison`]
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSettings {
    pub alpha: f64,
    pub tol: f64,
    pub max_iter: usize,
    pub top_k: usize,
    /// Edge weights used by the reference; match the solvers' setting
    pub edge_weight: EdgeWeight,
}

impl Default for ComparisonSettings {
    fn default() -> Self {
        Self {
            alpha: 0.85,
            tol: 1e-6,
            max_iter: 100,
            top_k: 10,
            edge_weight: EdgeWeight::Unit,
        }
    }
}

/// One solver's outcome against the reference
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRow {
    pub solver: String,
    pub iterations: usize,
    pub final_residual: Option<f64>,
    pub converged: bool,
    pub elapsed_secs: f64,
    pub l1_vs_reference: Option<f64>,
    pub max_abs_vs_reference: Option<f64>,
    pub top_k_overlap: Option<f64>,
    /// Set when the solver failed; the numeric columns are then empty
    pub error: Option<String>,
}

/// Rows for every solver plus the reference run they were measured against
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub nodes: usize,
    pub edges: usize,
    pub settings: ComparisonSettings,
    pub reference_iterations: usize,
    pub reference_elapsed_secs: f64,
    pub rows: Vec<ComparisonRow>,
    #[serde(skip)]
    pub reference: PageRankResult,
    /// Successful results, keyed by solver name
    #[serde(skip)]
    pub results: Vec<(String, PageRankResult)>,
}

impl ComparisonReport {
    pub fn result(&self, solver: &str) -> Option<&PageRankResult> {
        self.results.iter().find(|(name, _)| name == solver).map(|(_, r)| r)
    }

    /// Largest L1 distance to the reference among successful solvers
    pub fn worst_l1(&self) -> f64 {
        self.rows.iter().filter_map(|r| r.l1_vs_reference).fold(0.0, f64::max)
    }
}

/// Run the reference and every solver on `view`.
///
/// A solver error becomes a row with `error` set; only a failing reference
/// aborts the comparison. The reference is converged to `tol * 1e-3` so it
/// stays well below the error of the solvers it is measured against.
pub fn run_comparison(
    view: &GraphView,
    solvers: &[Solver],
    settings: &ComparisonSettings,
) -> SolverResult<ComparisonReport> {
    info!(
        "Comparing {} solvers on {} nodes / {} edges",
        solvers.len(),
        view.node_count,
        view.edge_count()
    );
    let ref_iter = settings.max_iter.max(1000);
    let reference = reference_pagerank_with(
        view,
        settings.alpha,
        settings.tol * 1e-3,
        ref_iter,
        settings.edge_weight,
    )?;

    let mut rows = Vec::with_capacity(solvers.len());
    let mut results = Vec::with_capacity(solvers.len());
    for solver in solvers {
        let name = solver.name().to_string();
        match solver.solve(view) {
            Ok(result) => {
                let cmp = compare_scores(&result, &reference);
                rows.push(ComparisonRow {
                    solver: name.clone(),
                    iterations: result.iterations,
                    final_residual: result.final_residual(),
                    converged: result.converged,
                    elapsed_secs: result.elapsed_secs(),
                    l1_vs_reference: Some(cmp.l1),
                    max_abs_vs_reference: Some(cmp.max_abs),
                    top_k_overlap: Some(rank_agreement(&result.scores, &reference.scores, settings.top_k)),
                    error: None,
                });
                results.push((name, result));
            }
            Err(e) => {
                warn!("Solver {} failed: {}", name, e);
                rows.push(ComparisonRow {
                    solver: name,
                    iterations: 0,
                    final_residual: None,
                    converged: false,
                    elapsed_secs: 0.0,
                    l1_vs_reference: None,
                    max_abs_vs_reference: None,
                    top_k_overlap: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    Ok(ComparisonReport {
        nodes: view.node_count,
        edges: view.edge_count(),
        settings: settings.clone(),
        reference_iterations: reference.iterations,
        reference_elapsed_secs: reference.elapsed_secs(),
        rows,
        reference,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{random_graph, sample_graph};
    use rankbench_solvers::{CommonParams, SolverKind};

    fn all_solvers(tol: f64) -> Vec<Solver> {
        let params = CommonParams { tol, max_iter: 500, ..CommonParams::default() };
        SolverKind::ALL.iter().map(|&k| Solver::from_kind(k, &params)).collect()
    }

    #[test]
    fn test_compare_ranks() {
        let cmp = compare_ranks(&[0.5, 0.5], &[0.25, 0.75]);
        assert!((cmp.l1 - 0.5).abs() < 1e-12);
        assert!((cmp.l2 - (0.125f64).sqrt()).abs() < 1e-12);
        assert!((cmp.max_abs - 0.25).abs() < 1e-12);

        // Padding with zeros
        let cmp = compare_ranks(&[0.5, 0.5], &[1.0]);
        assert!((cmp.l1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_top_k_and_agreement() {
        let a: HashMap<NodeId, f64> = [(1, 0.4), (2, 0.3), (3, 0.3)].into_iter().collect();
        let b: HashMap<NodeId, f64> = [(1, 0.1), (2, 0.3), (3, 0.6)].into_iter().collect();
        assert_eq!(top_k(&a, 2), vec![(1, 0.4), (2, 0.3)]);
        assert_eq!(top_k(&a, 10).len(), 3);
        assert!((rank_agreement(&a, &b, 2) - 0.5).abs() < 1e-12);
        assert_eq!(rank_agreement(&a, &b, 3), 1.0);
        assert_eq!(rank_agreement(&HashMap::new(), &HashMap::new(), 5), 1.0);
    }

    #[test]
    fn test_comparison_on_sample_graph() {
        let g = sample_graph();
        let settings = ComparisonSettings { tol: 1e-10, max_iter: 500, ..Default::default() };
        let report = run_comparison(&g.view, &all_solvers(1e-10), &settings).unwrap();
        assert_eq!(report.rows.len(), SolverKind::ALL.len());
        assert!(report.result("eigen").is_some());
        for row in &report.rows {
            assert!(row.error.is_none(), "{} failed: {:?}", row.solver, row.error);
            assert!(row.converged, "{} did not converge", row.solver);
            assert!(row.l1_vs_reference.unwrap() < 1e-6, "{}: {:?}", row.solver, row.l1_vs_reference);
            assert_eq!(row.top_k_overlap, Some(1.0));
        }
        assert!(report.result("gmres").is_some());
        assert!(report.worst_l1() < 1e-6);
    }

    #[test]
    fn test_timing_benchmark() {
        let view = random_graph(50, 3, 0.1, 3);
        let stats = timing_benchmark(&view, &all_solvers(1e-8)[..2], 3).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].solver, "power");
        assert!(stats.iter().all(|s| s.repeat == 3 && s.mean_secs >= s.min_secs));
    }
}
