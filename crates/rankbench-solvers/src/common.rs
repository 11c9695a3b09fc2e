//! Shared graph input for the solvers
//!
//! Provides a read-only, index-addressed view of a directed graph. The index
//! assigned to each node is its position in the node enumeration and is used
//! for every vector and matrix built from the view.

use std::collections::HashMap;

/// Node Identifier type (u64)
pub type NodeId = u64;

/// A dense, integer-indexed view of the graph topology using Compressed Sparse Row (CSR) format.
#[derive(Debug, Clone)]
pub struct GraphView {
    /// Number of nodes
    pub node_count: usize,
    /// Mapping from dense index (0..N) back to NodeId
    pub index_to_node: Vec<NodeId>,
    /// Mapping from NodeId to dense index
    pub node_to_index: HashMap<NodeId, usize>,

    /// Outgoing edges CSR structure
    /// Offsets into `out_targets`. Size = node_count + 1
    pub out_offsets: Vec<usize>,
    /// Contiguous array of target node indices
    pub out_targets: Vec<usize>,

    /// Incoming edges CSR structure (Compressed Sparse Column effectively)
    /// Offsets into `in_sources`. Size = node_count + 1
    pub in_offsets: Vec<usize>,
    /// Contiguous array of source node indices
    pub in_sources: Vec<usize>,

    /// Edge weights: aligned with `out_targets`
    pub weights: Option<Vec<f64>>,
}

impl GraphView {
    /// Get the out-degree of a node (by index)
    pub fn out_degree(&self, idx: usize) -> usize {
        self.out_offsets[idx + 1] - self.out_offsets[idx]
    }

    /// Get the in-degree of a node (by index)
    pub fn in_degree(&self, idx: usize) -> usize {
        self.in_offsets[idx + 1] - self.in_offsets[idx]
    }

    /// Get outgoing neighbors (successors) of a node
    pub fn successors(&self, idx: usize) -> &[usize] {
        let start = self.out_offsets[idx];
        let end = self.out_offsets[idx + 1];
        &self.out_targets[start..end]
    }

    /// Get incoming neighbors (predecessors) of a node
    pub fn predecessors(&self, idx: usize) -> &[usize] {
        let start = self.in_offsets[idx];
        let end = self.in_offsets[idx + 1];
        &self.in_sources[start..end]
    }

    /// Get weights for outgoing edges of a node
    pub fn weights(&self, idx: usize) -> Option<&[f64]> {
        self.weights.as_ref().map(|w| {
            let start = self.out_offsets[idx];
            let end = self.out_offsets[idx + 1];
            &w[start..end]
        })
    }

    /// Total number of directed edges
    pub fn edge_count(&self) -> usize {
        self.out_targets.len()
    }

    /// Edge density `m / (n * (n - 1))` as reported for directed graphs
    pub fn density(&self) -> f64 {
        let n = self.node_count as f64;
        if self.node_count < 2 {
            return 0.0;
        }
        self.edge_count() as f64 / (n * (n - 1.0))
    }

    /// `true` for every node without outgoing edges.
    pub fn dangling_mask(&self) -> Vec<bool> {
        (0..self.node_count).map(|i| self.out_degree(i) == 0).collect()
    }

    /// Number of nodes without outgoing edges
    pub fn dangling_count(&self) -> usize {
        (0..self.node_count).filter(|&i| self.out_degree(i) == 0).count()
    }

    /// Iterate over `(source_idx, target_idx, stored_weight)` in CSR order.
    /// Unweighted views report `None` for every edge.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, Option<f64>)> + '_ {
        (0..self.node_count).flat_map(move |u| {
            let start = self.out_offsets[u];
            self.successors(u)
                .iter()
                .enumerate()
                .map(move |(k, &v)| (u, v, self.weights.as_ref().map(|w| w[start + k])))
        })
    }

    /// Build a view from an edge list.
    ///
    /// Nodes listed in `nodes` come first, in the given order; endpoints that
    /// only appear in `edges` are appended in first-seen order.
    pub fn from_edges(nodes: &[NodeId], edges: &[(NodeId, NodeId)]) -> Self {
        let (index_to_node, node_to_index) =
            Self::index_nodes(nodes, edges.iter().map(|&(u, v)| (u, v)));
        let n = index_to_node.len();
        let mut outgoing = vec![Vec::new(); n];
        let mut incoming = vec![Vec::new(); n];
        for &(u, v) in edges {
            let (ui, vi) = (node_to_index[&u], node_to_index[&v]);
            outgoing[ui].push(vi);
            incoming[vi].push(ui);
        }
        Self::from_adjacency_list(n, index_to_node, node_to_index, outgoing, incoming, None)
    }

    /// Same as [`GraphView::from_edges`] but every edge carries a weight.
    pub fn from_weighted_edges(nodes: &[NodeId], edges: &[(NodeId, NodeId, f64)]) -> Self {
        let (index_to_node, node_to_index) =
            Self::index_nodes(nodes, edges.iter().map(|&(u, v, _)| (u, v)));
        let n = index_to_node.len();
        let mut outgoing = vec![Vec::new(); n];
        let mut incoming = vec![Vec::new(); n];
        let mut weights = vec![Vec::new(); n];
        for &(u, v, w) in edges {
            let (ui, vi) = (node_to_index[&u], node_to_index[&v]);
            outgoing[ui].push(vi);
            incoming[vi].push(ui);
            weights[ui].push(w);
        }
        Self::from_adjacency_list(n, index_to_node, node_to_index, outgoing, incoming, Some(weights))
    }

    fn index_nodes(
        nodes: &[NodeId],
        endpoints: impl Iterator<Item = (NodeId, NodeId)>,
    ) -> (Vec<NodeId>, HashMap<NodeId, usize>) {
        let mut index_to_node = Vec::with_capacity(nodes.len());
        let mut node_to_index = HashMap::with_capacity(nodes.len());
        let mut intern = |id: NodeId| {
            node_to_index.entry(id).or_insert_with(|| {
                index_to_node.push(id);
                index_to_node.len() - 1
            });
        };
        for &id in nodes {
            intern(id);
        }
        for (u, v) in endpoints {
            intern(u);
            intern(v);
        }
        (index_to_node, node_to_index)
    }

    /// Helper to create GraphView from adjacency lists
    pub fn from_adjacency_list(
        node_count: usize,
        index_to_node: Vec<NodeId>,
        node_to_index: HashMap<NodeId, usize>,
        outgoing: Vec<Vec<usize>>,
        incoming: Vec<Vec<usize>>,
        weights: Option<Vec<Vec<f64>>>,
    ) -> Self {
        let mut out_offsets = Vec::with_capacity(node_count + 1);
        let mut out_targets = Vec::new();
        let mut in_offsets = Vec::with_capacity(node_count + 1);
        let mut in_sources = Vec::new();
        let mut flat_weights = if weights.is_some() { Some(Vec::new()) } else { None };

        out_offsets.push(0);
        for (i, neighbors) in outgoing.into_iter().enumerate() {
            out_targets.extend(neighbors);
            out_offsets.push(out_targets.len());

            if let Some(ref mut w_flat) = flat_weights {
                if let Some(w_row) = weights.as_ref().map(|w| &w[i]) {
                    w_flat.extend(w_row.iter());
                }
            }
        }

        in_offsets.push(0);
        for sources in incoming {
            in_sources.extend(sources);
            in_offsets.push(in_sources.len());
        }

        GraphView {
            node_count,
            index_to_node,
            node_to_index,
            out_offsets,
            out_targets,
            in_offsets,
            in_sources,
            weights: flat_weights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_edges_keeps_node_order() {
        // 10 -> 20, 20 -> 30, 40 isolated and listed first
        let view = GraphView::from_edges(&[40], &[(10, 20), (20, 30)]);

        assert_eq!(view.node_count, 4);
        assert_eq!(view.index_to_node, vec![40, 10, 20, 30]);
        assert_eq!(view.node_to_index[&30], 3);
        assert_eq!(view.successors(1), &[2]);
        assert_eq!(view.predecessors(3), &[2]);
        assert_eq!(view.dangling_mask(), vec![true, false, false, true]);
        assert_eq!(view.dangling_count(), 2);
    }

    #[test]
    fn test_weighted_edges_iteration() {
        let view = GraphView::from_weighted_edges(&[], &[(1, 2, 2.0), (1, 3, 0.5), (3, 1, 1.0)]);
        let edges: Vec<_> = view.edges().collect();

        assert_eq!(edges, vec![(0, 1, Some(2.0)), (0, 2, Some(0.5)), (2, 0, Some(1.0))]);
        assert_eq!(view.weights(0), Some(&[2.0, 0.5][..]));
        assert_eq!(view.edge_count(), 3);
    }

    #[test]
    fn test_density() {
        let view = GraphView::from_edges(&[], &[(1, 2), (2, 1)]);
        assert!((view.density() - 1.0).abs() < 1e-12);

        let single = GraphView::from_edges(&[7], &[]);
        assert_eq!(single.density(), 0.0);
    }
}
