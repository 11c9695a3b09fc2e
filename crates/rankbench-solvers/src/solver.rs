//! Solver dispatch and the result shared by every strategy

use crate::anderson::{AndersonConfig, AndersonSolver};
use crate::common::{GraphView, NodeId};
use crate::direct_lu::{DirectLuConfig, DirectLuSolver};
use crate::eigen::{EigenConfig, EigenSolver};
use crate::error::{PageRankError, SolverResult};
use crate::gauss_seidel::{GaussSeidelConfig, GaussSeidelSolver};
use crate::gmres::{GmresConfig, GmresSolver};
use crate::google::validate_alpha;
use crate::observer::{SolveObserver, TracingObserver};
use crate::power::{PowerConfig, PowerIterationSolver};
use crate::transition::EdgeWeight;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Outcome of one solver call
#[derive(Debug, Clone)]
pub struct PageRankResult {
    /// Score per node; non-negative and summing to 1
    pub scores: HashMap<NodeId, f64>,
    /// Scores in node-index order
    pub ranks: Vec<f64>,
    /// Node order used for `ranks`
    pub nodes: Vec<NodeId>,
    /// One residual per iteration; empty for the direct solver
    pub residuals: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub elapsed: Duration,
}

impl PageRankResult {
    /// Result for a graph without nodes
    pub fn empty() -> Self {
        Self {
            scores: HashMap::new(),
            ranks: Vec::new(),
            nodes: Vec::new(),
            residuals: Vec::new(),
            iterations: 0,
            converged: true,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn from_ranks(
        nodes: &[NodeId],
        ranks: Vec<f64>,
        residuals: Vec<f64>,
        converged: bool,
        elapsed: Duration,
    ) -> Self {
        let scores = nodes.iter().copied().zip(ranks.iter().copied()).collect();
        Self {
            scores,
            ranks,
            nodes: nodes.to_vec(),
            iterations: residuals.len(),
            residuals,
            converged,
            elapsed,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn final_residual(&self) -> Option<f64> {
        self.residuals.last().copied()
    }

    pub fn score(&self, node: NodeId) -> Option<f64> {
        self.scores.get(&node).copied()
    }

    /// Nodes sorted by descending score, ties broken by node id
    pub fn ranking(&self) -> Vec<(NodeId, f64)> {
        let mut pairs: Vec<(NodeId, f64)> =
            self.nodes.iter().copied().zip(self.ranks.iter().copied()).collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        pairs
    }
}

/// Common checks for alpha / tol
pub(crate) fn validate_params(alpha: f64, tol: f64) -> SolverResult<()> {
    validate_alpha(alpha)?;
    if !tol.is_finite() || tol < 0.0 {
        return Err(PageRankError::InvalidConfig(format!(
            "tolerance must be a non-negative number, got {}",
            tol
        )));
    }
    Ok(())
}

/// Solver names accepted on the command line and in configs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverKind {
    Power,
    GaussSeidel,
    Gmres,
    DirectLu,
    Anderson,
    Eigen,
}

impl SolverKind {
    pub const ALL: [SolverKind; 6] = [
        SolverKind::Power,
        SolverKind::GaussSeidel,
        SolverKind::Gmres,
        SolverKind::DirectLu,
        SolverKind::Anderson,
        SolverKind::Eigen,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::Power => "power",
            SolverKind::GaussSeidel => "gauss_seidel",
            SolverKind::Gmres => "gmres",
            SolverKind::DirectLu => "direct_lu",
            SolverKind::Anderson => "anderson",
            SolverKind::Eigen => "eigen",
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverKind {
    type Err = PageRankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "power" | "power_iteration" => Ok(SolverKind::Power),
            "gauss_seidel" | "gs" | "sor" => Ok(SolverKind::GaussSeidel),
            "gmres" | "gmres_solver" => Ok(SolverKind::Gmres),
            "direct_lu" | "lu" | "direct" => Ok(SolverKind::DirectLu),
            "anderson" | "anderson_acceleration" => Ok(SolverKind::Anderson),
            "eigen" | "eig" | "eigenvector" => Ok(SolverKind::Eigen),
            _ => Err(PageRankError::UnknownSolver(s.to_string())),
        }
    }
}

/// Parameters every solver understands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonParams {
    pub alpha: f64,
    pub tol: f64,
    pub max_iter: usize,
    #[serde(default)]
    pub edge_weight: EdgeWeight,
    pub teleport: Option<Vec<f64>>,
}

impl Default for CommonParams {
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

/// One configured solver; each variant is self-contained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Solver {
    Power(PowerConfig),
    GaussSeidel(GaussSeidelConfig),
    Gmres(GmresConfig),
    DirectLu(DirectLuConfig),
    Anderson(AndersonConfig),
    Eigen(EigenConfig),
}

impl Solver {
    /// Solver of the given kind with default options and the shared parameters
    pub fn from_kind(kind: SolverKind, params: &CommonParams) -> Self {
        match kind {
            SolverKind::Power => Solver::Power(PowerConfig {
                alpha: params.alpha,
                tol: params.tol,
                max_iter: params.max_iter,
                edge_weight: params.edge_weight,
                teleport: params.teleport.clone(),
            }),
            SolverKind::GaussSeidel => Solver::GaussSeidel(GaussSeidelConfig {
                alpha: params.alpha,
                tol: params.tol,
                max_iter: params.max_iter,
                edge_weight: params.edge_weight,
                teleport: params.teleport.clone(),
                ..GaussSeidelConfig::default()
            }),
            SolverKind::Gmres => Solver::Gmres(GmresConfig {
                alpha: params.alpha,
                tol: params.tol,
                max_iter: params.max_iter,
                edge_weight: params.edge_weight,
                teleport: params.teleport.clone(),
                ..GmresConfig::default()
            }),
            SolverKind::DirectLu => Solver::DirectLu(DirectLuConfig {
                alpha: params.alpha,
                edge_weight: params.edge_weight,
                teleport: params.teleport.clone(),
                ..DirectLuConfig::default()
            }),
            SolverKind::Anderson => Solver::Anderson(AndersonConfig {
                alpha: params.alpha,
                tol: params.tol,
                max_iter: params.max_iter,
                edge_weight: params.edge_weight,
                teleport: params.teleport.clone(),
                ..AndersonConfig::default()
            }),
            SolverKind::Eigen => Solver::Eigen(EigenConfig {
                alpha: params.alpha,
                tol: params.tol,
                max_iter: params.max_iter,
                edge_weight: params.edge_weight,
                teleport: params.teleport.clone(),
                ..EigenConfig::default()
            }),
        }
    }

    pub fn kind(&self) -> SolverKind {
        match self {
            Solver::Power(_) => SolverKind::Power,
            Solver::GaussSeidel(_) => SolverKind::GaussSeidel,
            Solver::Gmres(_) => SolverKind::Gmres,
            Solver::DirectLu(_) => SolverKind::DirectLu,
            Solver::Anderson(_) => SolverKind::Anderson,
            Solver::Eigen(_) => SolverKind::Eigen,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Run with `tracing` output
    pub fn solve(&self, view: &GraphView) -> SolverResult<PageRankResult> {
        self.solve_with_observer(view, &TracingObserver::default())
    }

    pub fn solve_with_observer(
        &self,
        view: &GraphView,
        observer: &dyn SolveObserver,
    ) -> SolverResult<PageRankResult> {
        match self {
            Solver::Power(c) => PowerIterationSolver::new(c.clone()).solve_with_observer(view, observer),
            Solver::GaussSeidel(c) => {
                GaussSeidelSolver::new(c.clone()).solve_with_observer(view, observer)
            }
            Solver::Gmres(c) => GmresSolver::new(c.clone()).solve_with_observer(view, observer),
            Solver::DirectLu(c) => DirectLuSolver::new(c.clone()).solve_with_observer(view, observer),
            Solver::Anderson(c) => AndersonSolver::new(c.clone()).solve_with_observer(view, observer),
            Solver::Eigen(c) => EigenSolver::new(c.clone()).solve_with_observer(view, observer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_kind_parsing() {
        assert_eq!("power".parse::<SolverKind>().unwrap(), SolverKind::Power);
        assert_eq!("Gauss-Seidel".parse::<SolverKind>().unwrap(), SolverKind::GaussSeidel);
        assert_eq!("gmres_solver".parse::<SolverKind>().unwrap(), SolverKind::Gmres);
        assert_eq!("direct-lu".parse::<SolverKind>().unwrap(), SolverKind::DirectLu);
        assert_eq!("anderson".parse::<SolverKind>().unwrap(), SolverKind::Anderson);
        assert_eq!("eigenvector".parse::<SolverKind>().unwrap(), SolverKind::Eigen);
        assert_eq!(
            "jacobi".parse::<SolverKind>(),
            Err(PageRankError::UnknownSolver("jacobi".into()))
        );
    }

    #[test]
    fn test_from_kind_carries_params() {
        let params = CommonParams {
            alpha: 0.9,
            tol: 1e-9,
            max_iter: 7,
            edge_weight: EdgeWeight::Stored,
            teleport: None,
        };
        for kind in SolverKind::ALL {
            let solver = Solver::from_kind(kind, &params);
            assert_eq!(solver.kind(), kind);
        }
        match Solver::from_kind(SolverKind::Gmres, &params) {
            Solver::Gmres(c) => {
                assert_eq!(c.alpha, 0.9);
                assert_eq!(c.max_iter, 7);
                assert_eq!(c.restart, 30);
                assert_eq!(c.edge_weight, EdgeWeight::Stored);
            }
            other => panic!("unexpected solver {:?}", other.kind()),
        }
    }

    #[test]
    fn test_ranking_order() {
        let result = PageRankResult::from_ranks(
            &[5, 3, 9],
            vec![0.25, 0.5, 0.25],
            vec![],
            true,
            Duration::ZERO,
        );
        assert_eq!(result.ranking(), vec![(3, 0.5), (5, 0.25), (9, 0.25)]);
        assert_eq!(result.score(9), Some(0.25));
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_every_solver_handles_empty_graph() {
        let view = GraphView::from_edges(&[], &[]);
        for kind in SolverKind::ALL {
            let result = Solver::from_kind(kind, &CommonParams::default())
                .solve(&view)
                .unwrap();
            assert!(result.scores.is_empty());
            assert!(result.residuals.is_empty());
            assert_eq!(result.elapsed, Duration::ZERO);
        }
    }
}
