//! Graph sampling
//!
//! Large edge lists are cut down before benchmarking: keep the largest
//! strongly connected component, then a BFS sample when it is still too big.
//! Every function returns a new view; node ids are preserved.

use rankbench_solvers::{GraphView, NodeId};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// View on the nodes at `indices` (in that order) and the edges between them
pub fn induced_subgraph(view: &GraphView, indices: &[usize]) -> GraphView {
    let mut local: HashMap<usize, usize> = HashMap::with_capacity(indices.len());
    for (k, &idx) in indices.iter().enumerate() {
        local.entry(idx).or_insert(k);
    }
    let n = indices.len();
    let index_to_node: Vec<NodeId> = indices.iter().map(|&i| view.index_to_node[i]).collect();
    let node_to_index: HashMap<NodeId, usize> =
        index_to_node.iter().enumerate().map(|(k, &id)| (id, k)).collect();

    let mut outgoing = vec![Vec::new(); n];
    let mut incoming = vec![Vec::new(); n];
    let mut weights = view.weights.as_ref().map(|_| vec![Vec::new(); n]);
    for (k, &u) in indices.iter().enumerate() {
        let row_weights = view.weights(u);
        for (e, &v) in view.successors(u).iter().enumerate() {
            if let Some(&kv) = local.get(&v) {
                outgoing[k].push(kv);
                incoming[kv].push(k);
                if let (Some(w), Some(rw)) = (weights.as_mut(), row_weights) {
                    w[k].push(rw[e]);
                }
            }
        }
    }
    GraphView::from_adjacency_list(n, index_to_node, node_to_index, outgoing, incoming, weights)
}

/// Strongly connected components (Tarjan, iterative).
///
/// Each component lists node indices in ascending order.
pub fn strongly_connected_components(view: &GraphView) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let n = view.node_count;
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut components = Vec::new();
    let mut counter = 0usize;

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        // (node, position in its successor list)
        let mut call_stack: Vec<(usize, usize)> = vec![(root, 0)];
        index[root] = counter;
        lowlink[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;

        while let Some(top) = call_stack.last_mut() {
            let v = top.0;
            let succ = view.successors(v);
            if top.1 < succ.len() {
                let w = succ[top.1];
                top.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = counter;
                    lowlink[w] = counter;
                    counter += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call_stack.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                components.push(component);
            }
        }
    }
    components
}

/// Largest strongly connected component; ties go to the component holding
/// the lowest node index
pub fn largest_scc(view: &GraphView) -> GraphView {
    let best = strongly_connected_components(view)
        .into_iter()
        .max_by(|a, b| a.len().cmp(&b.len()).then(b[0].cmp(&a[0])));
    match best {
        Some(component) => induced_subgraph(view, &component),
        None => view.clone(),
    }
}

/// Breadth-first sample of at most `limit` nodes starting from index 0.
///
/// Nodes keep their original relative order in the returned view.
pub fn bfs_sample(view: &GraphView, limit: usize) -> GraphView {
    if view.node_count == 0 || limit == 0 {
        return induced_subgraph(view, &[]);
    }
    let mut visited = vec![false; view.node_count];
    let mut queue = VecDeque::new();
    let mut kept = Vec::with_capacity(limit.min(view.node_count));

    visited[0] = true;
    queue.push_back(0);
    while let Some(current) = queue.pop_front() {
        kept.push(current);
        if kept.len() == limit {
            break;
        }
        for &next in view.successors(current) {
            if !visited[next] {
                visited[next] = true;
                queue.push_back(next);
            }
        }
    }
    kept.sort_unstable();
    induced_subgraph(view, &kept)
}

/// Reduce a graph for benchmarking: largest SCC, then BFS-sampled down to
/// `limit` nodes. `None` or zero keeps the whole graph.
pub fn limit_graph(view: &GraphView, limit: Option<usize>) -> GraphView {
    let limit = match limit {
        Some(l) if l > 0 => l,
        _ => return view.clone(),
    };
    let scc = largest_scc(view);
    debug!(
        "Largest SCC has {} of {} nodes",
        scc.node_count, view.node_count
    );
    if scc.node_count > limit {
        bfs_sample(&scc, limit)
    } else {
        scc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two 3-cycles joined by one edge, plus a tail node
    fn two_cycles() -> GraphView {
        GraphView::from_edges(
            &[],
            &[(0, 1), (1, 2), (2, 0), (2, 3), (3, 4), (4, 5), (5, 3), (6, 0)],
        )
    }

    #[test]
    fn test_scc() {
        let view = two_cycles();
        let mut comps = strongly_connected_components(&view);
        comps.sort();
        assert_eq!(comps, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
    }

    #[test]
    fn test_largest_scc_tie_goes_to_lowest_index() {
        let scc = largest_scc(&two_cycles());
        assert_eq!(scc.index_to_node, vec![0, 1, 2]);
        assert_eq!(scc.edge_count(), 3);
        assert_eq!(scc.dangling_count(), 0);
    }

    #[test]
    fn test_induced_subgraph_keeps_weights() {
        let view = GraphView::from_weighted_edges(&[], &[(10, 20, 2.0), (20, 30, 3.0), (30, 10, 4.0)]);
        let sub = induced_subgraph(&view, &[0, 2]);
        assert_eq!(sub.index_to_node, vec![10, 30]);
        assert_eq!(sub.edge_count(), 1);
        assert_eq!(sub.successors(1), &[0]);
        assert_eq!(sub.weights(1), Some(&[4.0][..]));
        assert_eq!(sub.predecessors(0), &[1]);
    }

    #[test]
    fn test_bfs_sample() {
        // Path 0 -> 1 -> 2 -> 3 -> 4
        let view = GraphView::from_edges(&[], &[(0, 1), (1, 2), (2, 3), (3, 4)]);
        let sample = bfs_sample(&view, 3);
        assert_eq!(sample.index_to_node, vec![0, 1, 2]);
        assert_eq!(sample.edge_count(), 2);
        assert_eq!(bfs_sample(&view, 0).node_count, 0);
    }

    #[test]
    fn test_limit_graph() {
        let view = two_cycles();
        assert_eq!(limit_graph(&view, None).node_count, 7);
        assert_eq!(limit_graph(&view, Some(0)).node_count, 7);
        assert_eq!(limit_graph(&view, Some(10)).node_count, 3);
        assert_eq!(limit_graph(&view, Some(2)).index_to_node, vec![0, 1]);
    }
}
