//! Synthetic graphs for tests and benchmarks

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rankbench_solvers::{GraphView, NodeId};

/// Random directed graph without self loops or duplicate edges.
///
/// A `dangling_fraction` share of the nodes get no outgoing edges; every
/// other node gets between 1 and `2 * avg_out_degree - 1` distinct targets.
/// The same seed always produces the same graph.
pub fn random_graph(n: usize, avg_out_degree: usize, dangling_fraction: f64, seed: u64) -> GraphView {
    let mut rng = StdRng::seed_from_u64(seed);
    let nodes: Vec<NodeId> = (0..n as NodeId).collect();
    let mut edges = Vec::with_capacity(n * avg_out_degree);
    if n < 2 {
        return GraphView::from_edges(&nodes, &edges);
    }

    let dangling_fraction = dangling_fraction.clamp(0.0, 1.0);
    let max_degree = (2 * avg_out_degree.max(1) - 1).min(n - 1);
    for u in 0..n {
        if rng.gen_bool(dangling_fraction) {
            continue;
        }
        let degree = rng.gen_range(1..=max_degree);
        // Draw from n - 1 slots and skip over u
        for t in sample(&mut rng, n - 1, degree).into_iter() {
            let v = if t >= u { t + 1 } else { t };
            edges.push((u as NodeId, v as NodeId));
        }
    }
    GraphView::from_edges(&nodes, &edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_graph_is_deterministic() {
        let a = random_graph(200, 5, 0.1, 42);
        let b = random_graph(200, 5, 0.1, 42);
        assert_eq!(a.node_count, 200);
        assert_eq!(a.out_targets, b.out_targets);
        assert_eq!(a.out_offsets, b.out_offsets);
    }

    #[test]
    fn test_random_graph_shape() {
        let g = random_graph(300, 4, 0.2, 7);
        for u in 0..g.node_count {
            let succ = g.successors(u);
            assert!(!succ.contains(&u));
            let mut sorted = succ.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), succ.len());
            assert!(succ.len() <= 7);
        }
        let dangling = g.dangling_count();
        assert!(dangling > 20 && dangling < 120, "dangling = {}", dangling);
    }

    #[test]
    fn test_all_dangling_and_tiny() {
        assert_eq!(random_graph(10, 3, 1.0, 1).edge_count(), 0);
        assert_eq!(random_graph(1, 3, 0.0, 1).node_count, 1);
        assert_eq!(random_graph(0, 3, 0.0, 1).node_count, 0);
    }
}
