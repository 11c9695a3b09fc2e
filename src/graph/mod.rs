//! Graph input for the solvers
//!
//! - Edge-list loading with label interning
//! - Sampling (largest SCC, BFS) for large inputs
//! - Seeded random graphs

pub mod generate;
pub mod loader;
pub mod sampling;

pub use generate::random_graph;
pub use loader::{
    load_edge_list, read_edge_list, sample_graph, LabeledGraph, LoadError, LoadOptions, LoadResult,
};
pub use sampling::{bfs_sample, induced_subgraph, largest_scc, limit_graph, strongly_connected_components};

use rankbench_solvers::GraphView;
use serde::Serialize;

/// Size statistics of a graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub density: f64,
    pub dangling: usize,
    pub weighted: bool,
}

impl GraphSummary {
    pub fn of(view: &GraphView) -> Self {
        Self {
            nodes: view.node_count,
            edges: view.edge_count(),
            density: view.density(),
            dangling: view.dangling_count(),
            weighted: view.weights.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_sample_graph() {
        let summary = GraphSummary::of(&sample_graph().view);
        assert_eq!(summary.nodes, 4);
        assert_eq!(summary.edges, 5);
        assert_eq!(summary.dangling, 0);
        assert!((summary.density - 5.0 / 12.0).abs() < 1e-12);
        assert!(!summary.weighted);
    }
}
