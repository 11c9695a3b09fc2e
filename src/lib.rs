//! Rankbench
//!
//! Compares PageRank solvers on real and synthetic graphs.
//!
//! - [`solvers`]: the solver engine (power iteration, Gauss-Seidel/SOR,
//!   GMRES, sparse LU, Anderson acceleration, dominant eigenvector)
//! - [`graph`]: edge-list loading, sampling and synthetic graphs
//! - [`eval`]: dense reference pipeline, comparisons and timings
//! - [`report`]: JSON and CSV export
//!
//! ## Example Usage
//!
//! ```rust
//! use rankbench::graph::sample_graph;
//! use rankbench::solvers::{CommonParams, Solver, SolverKind};
//!
//! fn main() -> anyhow::Result<()> {
//!     let graph = sample_graph();
//!     let solver = Solver::from_kind(SolverKind::Gmres, &CommonParams::default());
//!     let result = solver.solve(&graph.view)?;
//!
//!     let (top, _) = result.ranking()[0];
//!     assert_eq!(graph.label(top), Some("C"));
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub use rankbench_solvers as solvers;

pub mod eval;
pub mod graph;
pub mod report;

pub use eval::{reference_pagerank, run_comparison, ComparisonReport, ComparisonSettings};
pub use graph::{load_edge_list, sample_graph, GraphSummary, LabeledGraph, LoadError, LoadOptions};
pub use report::{ReportError, ReportResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.3.0");
    }
}
