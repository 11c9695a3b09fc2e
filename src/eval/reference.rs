//! Reference baseline
//!
//! Dense pipeline used as the oracle in comparisons: dense transition matrix,
//! dangling columns replaced by the uniform column, explicit Google matrix,
//! then the plain power method on `G`.

use rankbench_solvers::{
    power_method, EdgeWeight, GoogleMatrix, GraphView, PageRankResult, Representation,
    SolverResult, TransitionMatrixBuilder,
};
use std::time::Instant;
use tracing::{debug, warn};

/// Reference PageRank with a uniform teleport vector
pub fn reference_pagerank(
    view: &GraphView,
    alpha: f64,
    tol: f64,
    max_iter: usize,
) -> SolverResult<PageRankResult> {
    reference_pagerank_with(view, alpha, tol, max_iter, EdgeWeight::Unit)
}

/// Reference PageRank reading edge weights as selected
pub fn reference_pagerank_with(
    view: &GraphView,
    alpha: f64,
    tol: f64,
    max_iter: usize,
    edge_weight: EdgeWeight,
) -> SolverResult<PageRankResult> {
    let t0 = Instant::now();
    let mut a = TransitionMatrixBuilder::new()
        .with_representation(Representation::Dense)
        .with_edge_weight(edge_weight)
        .build(view)?;
    a.fix_dangling_in_place();
    let g = GoogleMatrix::build(&a, alpha, None)?;
    if g.dim() == 0 {
        return Ok(PageRankResult::empty());
    }

    let (ranks, residuals) = power_method(&g, tol, max_iter, None)?;
    let converged = residuals.last().is_some_and(|&r| r < tol);
    if !converged {
        warn!("Reference power method did not converge after {} iterations", residuals.len());
    }
    debug!("Reference pipeline finished after {} iterations", residuals.len());

    let scores = view.index_to_node.iter().copied().zip(ranks.iter().copied()).collect();
    Ok(PageRankResult {
        scores,
        ranks,
        nodes: view.index_to_node.clone(),
        iterations: residuals.len(),
        residuals,
        converged,
        elapsed: t0.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::sample_graph;

    #[test]
    fn test_reference_on_sample_graph() {
        let g = sample_graph();
        let result = reference_pagerank(&g.view, 0.85, 1e-10, 1000).unwrap();
        assert!(result.converged);
        assert!((result.ranks.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        // C collects from A, B and D
        let c = g.node_id("C").unwrap();
        assert_eq!(result.ranking()[0].0, c);
        // D only receives teleport mass
        let d = result.score(g.node_id("D").unwrap()).unwrap();
        assert!((d - 0.15 / 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_eigenvector_of_reference_google_matrix() {
        let g = sample_graph();
        let mut a = TransitionMatrixBuilder::new()
            .with_representation(Representation::Dense)
            .build(&g.view)
            .unwrap();
        a.fix_dangling_in_place();
        let google = GoogleMatrix::build(&a, 0.85, None).unwrap();
        let eig = rankbench_solvers::eig_dense(&google).unwrap();
        let reference = reference_pagerank(&g.view, 0.85, 1e-12, 1000).unwrap();
        let diff: f64 = eig.iter().zip(&reference.ranks).map(|(x, y)| (x - y).abs()).sum();
        assert!(diff < 1e-9, "{}", diff);
    }

    #[test]
    fn test_weighted_reference_follows_heavy_edge() {
        // 0 -> 1 carries nine times the weight of 0 -> 2
        let view = GraphView::from_weighted_edges(&[], &[(0, 1, 9.0), (0, 2, 1.0), (1, 0, 1.0), (2, 0, 1.0)]);
        let unit = reference_pagerank(&view, 0.85, 1e-12, 1000).unwrap();
        let stored = reference_pagerank_with(&view, 0.85, 1e-12, 1000, EdgeWeight::Stored).unwrap();
        assert!((unit.ranks[1] - unit.ranks[2]).abs() < 1e-12);
        assert!(stored.ranks[1] > 2.0 * stored.ranks[2]);
    }

    #[test]
    fn test_reference_rejects_bad_alpha() {
        let g = sample_graph();
        assert!(reference_pagerank(&g.view, 1.5, 1e-8, 100).is_err());
    }

    #[test]
    fn test_reference_empty_graph() {
        let view = GraphView::from_edges(&[], &[]);
        let result = reference_pagerank(&view, 0.85, 1e-8, 100).unwrap();
        assert!(result.ranks.is_empty());
    }
}
