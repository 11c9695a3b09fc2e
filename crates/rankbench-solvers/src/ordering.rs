//! Column orderings for the sparse LU factorization

use crate::error::{PageRankError, SolverResult};
use serde::{Deserialize, Serialize};
use sprs::CsMat;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};
use std::fmt;
use std::str::FromStr;

/// Column permutation applied before factorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PivotStrategy {
    /// Keep the natural column order
    Natural,
    /// Sparse columns first (approximate column minimum degree)
    #[default]
    Colamd,
    /// Minimum degree on the structure of `A^T A`
    MmdAta,
    /// Minimum degree on the structure of `A^T + A`
    MmdAtPlusA,
}

impl PivotStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            PivotStrategy::Natural => "NATURAL",
            PivotStrategy::Colamd => "COLAMD",
            PivotStrategy::MmdAta => "MMD_ATA",
            PivotStrategy::MmdAtPlusA => "MMD_AT_PLUS_A",
        }
    }

    /// Column order for a square matrix in CSC storage; `order[k]` is the
    /// original column placed at position `k`.
    pub fn column_order(&self, a: &CsMat<f64>) -> Vec<usize> {
        let n = a.cols();
        match self {
            PivotStrategy::Natural => (0..n).collect(),
            PivotStrategy::Colamd => {
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by_key(|&j| a.outer_view(j).map(|c| c.nnz()).unwrap_or(0));
                order
            }
            PivotStrategy::MmdAta => minimum_degree(ata_structure(a)),
            PivotStrategy::MmdAtPlusA => minimum_degree(at_plus_a_structure(a)),
        }
    }
}

impl fmt::Display for PivotStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PivotStrategy {
    type Err = PageRankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "NATURAL" => Ok(PivotStrategy::Natural),
            "COLAMD" => Ok(PivotStrategy::Colamd),
            "MMD_ATA" => Ok(PivotStrategy::MmdAta),
            "MMD_AT_PLUS_A" => Ok(PivotStrategy::MmdAtPlusA),
            _ => Err(PageRankError::UnknownPivotStrategy(s.to_string())),
        }
    }
}

/// Column adjacency of `A^T A`: two columns touch when they share a row
fn ata_structure(a: &CsMat<f64>) -> Vec<BTreeSet<usize>> {
    let n = a.cols();
    let mut rows: Vec<Vec<usize>> = vec![Vec::new(); a.rows()];
    for (j, col) in a.outer_iterator().enumerate() {
        for (i, _) in col.iter() {
            rows[i].push(j);
        }
    }
    let mut adj = vec![BTreeSet::new(); n];
    for cols in rows {
        for &p in &cols {
            for &q in &cols {
                if p != q {
                    adj[p].insert(q);
                }
            }
        }
    }
    adj
}

/// Symmetrized pattern `A^T + A` without the diagonal
fn at_plus_a_structure(a: &CsMat<f64>) -> Vec<BTreeSet<usize>> {
    let mut adj = vec![BTreeSet::new(); a.cols()];
    for (j, col) in a.outer_iterator().enumerate() {
        for (i, _) in col.iter() {
            if i != j {
                adj[i].insert(j);
                adj[j].insert(i);
            }
        }
    }
    adj
}

/// Greedy minimum degree elimination, ties broken by the smaller index
fn minimum_degree(mut adj: Vec<BTreeSet<usize>>) -> Vec<usize> {
    let n = adj.len();
    let mut eliminated = vec![false; n];
    let mut heap: BinaryHeap<Reverse<(usize, usize)>> =
        (0..n).map(|v| Reverse((adj[v].len(), v))).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse((degree, v))) = heap.pop() {
        if eliminated[v] || degree != adj[v].len() {
            continue;
        }
        eliminated[v] = true;
        order.push(v);

        // Neighbours of v become a clique
        let neighbours: Vec<usize> = std::mem::take(&mut adj[v]).into_iter().collect();
        for &u in &neighbours {
            adj[u].remove(&v);
            for &w in &neighbours {
                if w != u {
                    adj[u].insert(w);
                }
            }
        }
        for &u in &neighbours {
            heap.push(Reverse((adj[u].len(), u)));
        }
    }
    order
}

/// Check that `order` is a permutation of `0..n`
pub(crate) fn check_permutation(order: &[usize], n: usize) -> SolverResult<()> {
    let mut seen = vec![false; n];
    if order.len() != n {
        return Err(PageRankError::Shape(format!(
            "column order has {} entries, expected {}",
            order.len(),
            n
        )));
    }
    for &j in order {
        if j >= n || seen[j] {
            return Err(PageRankError::Shape(format!("column order repeats or exceeds {}", j)));
        }
        seen[j] = true;
    }
    Ok(())
}
