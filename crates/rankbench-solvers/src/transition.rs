//! Column-stochastic transition matrix
//!
//! `A[i, j] = weight(j -> i) / out_weight(j)`. Columns of nodes without
//! outgoing weight stay all-zero ("dangling") until explicitly fixed.

use crate::common::{GraphView, NodeId};
use crate::error::{PageRankError, SolverResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};

/// Storage used for a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Representation {
    Dense,
    #[default]
    Sparse,
}

/// Which weight an edge contributes to the transition matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeWeight {
    /// Every edge counts 1
    #[default]
    Unit,
    /// The weight stored on the view; views without weights fall back to 1
    Stored,
}

/// Square matrix in either dense or CSR storage
#[derive(Debug, Clone)]
pub enum Matrix {
    Dense(Array2<f64>),
    Sparse(CsMat<f64>),
}

impl Matrix {
    pub fn dim(&self) -> usize {
        match self {
            Matrix::Dense(m) => m.nrows(),
            Matrix::Sparse(m) => m.rows(),
        }
    }

    pub fn representation(&self) -> Representation {
        match self {
            Matrix::Dense(_) => Representation::Dense,
            Matrix::Sparse(_) => Representation::Sparse,
        }
    }

    /// Number of stored entries (n * n for dense storage)
    pub fn nnz(&self) -> usize {
        match self {
            Matrix::Dense(m) => m.len(),
            Matrix::Sparse(m) => m.nnz(),
        }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        match self {
            Matrix::Dense(m) => m[[i, j]],
            Matrix::Sparse(m) => m.get(i, j).copied().unwrap_or(0.0),
        }
    }

    /// `y = M x`
    pub fn matvec(&self, x: &[f64], y: &mut [f64]) {
        match self {
            Matrix::Dense(m) => {
                for (i, row) in m.outer_iter().enumerate() {
                    y[i] = row.iter().zip(x).map(|(a, b)| a * b).sum();
                }
            }
            Matrix::Sparse(m) => csr_matvec(m, x, y),
        }
    }

    /// Dot product of row `i` with `x`
    pub fn row_dot(&self, i: usize, x: &[f64]) -> f64 {
        match self {
            Matrix::Dense(m) => m.row(i).iter().zip(x).map(|(a, b)| a * b).sum(),
            Matrix::Sparse(m) => m
                .outer_view(i)
                .map(|row| row.iter().map(|(j, &v)| v * x[j]).sum::<f64>())
                .unwrap_or(0.0),
        }
    }

    /// Visit every stored entry as `(row, col, value)`
    pub fn for_each_entry(&self, mut f: impl FnMut(usize, usize, f64)) {
        match self {
            Matrix::Dense(m) => {
                for ((i, j), &v) in m.indexed_iter() {
                    if v != 0.0 {
                        f(i, j, v);
                    }
                }
            }
            Matrix::Sparse(m) => {
                for (&v, (i, j)) in m.iter() {
                    f(i, j, v);
                }
            }
        }
    }

    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.dim()];
        self.for_each_entry(|_, j, v| sums[j] += v);
        sums
    }

    pub fn to_dense(&self) -> Array2<f64> {
        match self {
            Matrix::Dense(m) => m.clone(),
            Matrix::Sparse(_) => {
                let n = self.dim();
                let mut dense = Array2::zeros((n, n));
                self.for_each_entry(|i, j, v| dense[[i, j]] += v);
                dense
            }
        }
    }

    pub fn to_csr(&self) -> CsMat<f64> {
        match self {
            Matrix::Sparse(m) => m.clone(),
            Matrix::Dense(_) => {
                let n = self.dim();
                let mut tri = TriMat::new((n, n));
                self.for_each_entry(|i, j, v| tri.add_triplet(i, j, v));
                tri.to_csr()
            }
        }
    }

    pub fn to_representation(&self, representation: Representation) -> Matrix {
        match representation {
            Representation::Dense => Matrix::Dense(self.to_dense()),
            Representation::Sparse => Matrix::Sparse(self.to_csr()),
        }
    }
}

/// `y = A x` for a CSR matrix
pub(crate) fn csr_matvec(a: &CsMat<f64>, x: &[f64], y: &mut [f64]) {
    for (i, row) in a.outer_iterator().enumerate() {
        y[i] = row.iter().map(|(j, &v)| v * x[j]).sum();
    }
}

/// Converts a [`GraphView`] into a [`TransitionMatrix`]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TransitionMatrixBuilder {
    pub representation: Representation,
    pub edge_weight: EdgeWeight,
}

impl TransitionMatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_representation(mut self, representation: Representation) -> Self {
        self.representation = representation;
        self
    }

    pub fn with_edge_weight(mut self, edge_weight: EdgeWeight) -> Self {
        self.edge_weight = edge_weight;
        self
    }

    /// Build the raw transition matrix. Dangling columns are left all-zero.
    pub fn build(&self, view: &GraphView) -> SolverResult<TransitionMatrix> {
        check_shape(view)?;
        let n = view.node_count;

        // 1. Accumulate outgoing weight per source node
        let mut out_weight = vec![0.0; n];
        let mut entries = Vec::with_capacity(view.edge_count());
        for (src, dst, stored) in view.edges() {
            let w = match self.edge_weight {
                EdgeWeight::Unit => 1.0,
                EdgeWeight::Stored => stored.unwrap_or(1.0),
            };
            if !w.is_finite() || w < 0.0 {
                return Err(PageRankError::InvalidConfig(format!(
                    "edge {} -> {} has invalid weight {}",
                    view.index_to_node[src], view.index_to_node[dst], w
                )));
            }
            out_weight[src] += w;
            entries.push((dst, src, w));
        }

        // 2. Place normalised weights; column = source, row = destination
        let matrix = match self.representation {
            Representation::Dense => {
                let mut dense = Array2::zeros((n, n));
                for &(i, j, w) in &entries {
                    if out_weight[j] > 0.0 {
                        dense[[i, j]] += w / out_weight[j];
                    }
                }
                Matrix::Dense(dense)
            }
            Representation::Sparse => {
                let mut tri = TriMat::with_capacity((n, n), entries.len());
                for &(i, j, w) in &entries {
                    if out_weight[j] > 0.0 {
                        tri.add_triplet(i, j, w / out_weight[j]);
                    }
                }
                Matrix::Sparse(tri.to_csr())
            }
        };

        let dangling = out_weight.iter().map(|&w| w == 0.0).collect();
        Ok(TransitionMatrix {
            matrix,
            nodes: view.index_to_node.clone(),
            dangling,
            dangling_fixed: false,
        })
    }
}

fn check_shape(view: &GraphView) -> SolverResult<()> {
    let n = view.node_count;
    if view.index_to_node.len() != n || view.out_offsets.len() != n + 1 {
        return Err(PageRankError::Shape(format!(
            "view declares {} nodes but carries {} ids and {} row offsets",
            n,
            view.index_to_node.len(),
            view.out_offsets.len()
        )));
    }
    if let Some(&bad) = view.out_targets.iter().find(|&&t| t >= n) {
        return Err(PageRankError::Shape(format!(
            "edge target index {} outside a {}x{} matrix",
            bad, n, n
        )));
    }
    if let Some(w) = &view.weights {
        if w.len() != view.out_targets.len() {
            return Err(PageRankError::Shape(format!(
                "{} weights for {} edges",
                w.len(),
                view.out_targets.len()
            )));
        }
    }
    Ok(())
}

/// Transition matrix plus the node order and dangling mask it was built with
#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    matrix: Matrix,
    nodes: Vec<NodeId>,
    dangling: Vec<bool>,
    dangling_fixed: bool,
}

impl TransitionMatrix {
    /// Wrap an existing column-stochastic matrix. Columns summing to zero are
    /// treated as dangling.
    pub fn from_matrix(matrix: Matrix, nodes: Vec<NodeId>) -> SolverResult<Self> {
        let n = matrix.dim();
        if nodes.len() != n {
            return Err(PageRankError::Shape(format!(
                "{} node ids for a {}x{} matrix",
                nodes.len(),
                n,
                n
            )));
        }
        if let Matrix::Sparse(m) = &matrix {
            if m.cols() != n {
                return Err(PageRankError::Shape(format!(
                    "matrix is {}x{}, expected a square matrix",
                    m.rows(),
                    m.cols()
                )));
            }
        }
        if let Matrix::Dense(m) = &matrix {
            if m.ncols() != n {
                return Err(PageRankError::Shape(format!(
                    "matrix is {}x{}, expected a square matrix",
                    m.nrows(),
                    m.ncols()
                )));
            }
        }
        let dangling = matrix.column_sums().iter().map(|&s| s == 0.0).collect();
        Ok(Self { matrix, nodes, dangling, dangling_fixed: false })
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn dim(&self) -> usize {
        self.nodes.len()
    }

    /// Dangling mask of the original graph; unchanged by the dangling fix.
    pub fn dangling_mask(&self) -> &[bool] {
        &self.dangling
    }

    pub fn dangling_count(&self) -> usize {
        self.dangling.iter().filter(|&&d| d).count()
    }

    pub fn is_dangling_fixed(&self) -> bool {
        self.dangling_fixed
    }

    /// Rank mass sitting on dangling nodes that still has to be redistributed.
    /// Zero once the dangling columns were fixed in the matrix itself.
    pub fn dangling_mass(&self, p: &[f64]) -> f64 {
        if self.dangling_fixed {
            return 0.0;
        }
        self.dangling
            .iter()
            .zip(p)
            .filter(|(&d, _)| d)
            .map(|(_, &x)| x)
            .sum()
    }

    /// Copy with every dangling column replaced by the uniform vector `1/n`.
    pub fn with_dangling_fixed(&self) -> TransitionMatrix {
        let mut fixed = self.clone();
        fixed.fix_dangling_in_place();
        fixed
    }

    /// Replace dangling columns by `1/n` in place. Applying it twice is a no-op.
    pub fn fix_dangling_in_place(&mut self) {
        if self.dangling_fixed {
            return;
        }
        let n = self.dim();
        if n == 0 || self.dangling_count() == 0 {
            self.dangling_fixed = true;
            return;
        }
        let uniform = 1.0 / n as f64;
        let columns: Vec<usize> = (0..n).filter(|&j| self.dangling[j]).collect();

        match &mut self.matrix {
            Matrix::Dense(m) => {
                for &j in &columns {
                    m.column_mut(j).fill(uniform);
                }
            }
            Matrix::Sparse(m) => {
                let mut tri = TriMat::with_capacity((n, n), m.nnz() + columns.len() * n);
                for (&v, (i, j)) in m.iter() {
                    tri.add_triplet(i, j, v);
                }
                for &j in &columns {
                    for i in 0..n {
                        tri.add_triplet(i, j, uniform);
                    }
                }
                *m = tri.to_csr();
            }
        }
        self.dangling_fixed = true;
    }

    /// Same matrix in another storage
    pub fn to_representation(&self, representation: Representation) -> TransitionMatrix {
        TransitionMatrix {
            matrix: self.matrix.to_representation(representation),
            nodes: self.nodes.clone(),
            dangling: self.dangling.clone(),
            dangling_fixed: self.dangling_fixed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view() -> GraphView {
        // A(1)->B(2), A->C(3), B->C, C->A, D(4)->C, E(5) dangling
        GraphView::from_edges(&[1, 2, 3, 4, 5], &[(1, 2), (1, 3), (2, 3), (3, 1), (4, 3)])
    }

    #[test]
    fn test_columns_are_stochastic() {
        let t = TransitionMatrixBuilder::new().build(&sample_view()).unwrap();
        let sums = t.matrix().column_sums();

        for (j, s) in sums.iter().enumerate() {
            if t.dangling_mask()[j] {
                assert_eq!(*s, 0.0);
            } else {
                assert!((s - 1.0).abs() < 1e-12);
            }
        }
        assert_eq!(t.matrix().get(1, 0), 0.5);
        assert_eq!(t.matrix().get(2, 3), 1.0);
        assert_eq!(t.dangling_count(), 1);
    }

    #[test]
    fn test_dense_and_sparse_agree() {
        let view = GraphView::from_weighted_edges(
            &[],
            &[(1, 2, 3.0), (1, 3, 1.0), (2, 3, 2.0), (3, 1, 0.5), (3, 2, 0.5)],
        );
        let builder = TransitionMatrixBuilder::new().with_edge_weight(EdgeWeight::Stored);
        let sparse = builder.build(&view).unwrap();
        let dense = builder.with_representation(Representation::Dense).build(&view).unwrap();

        let a = sparse.matrix().to_dense();
        let b = dense.matrix().to_dense();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-15);
        }
        assert_eq!(a[[1, 0]], 0.75);
    }

    #[test]
    fn test_dangling_fix_is_copy_on_write_and_idempotent() {
        let t = TransitionMatrixBuilder::new().build(&sample_view()).unwrap();
        let fixed = t.with_dangling_fixed();
        let twice = fixed.with_dangling_fixed();

        // Original untouched
        assert_eq!(t.matrix().column_sums()[4], 0.0);
        assert!(!t.is_dangling_fixed());

        let sums = fixed.matrix().column_sums();
        assert!((sums[4] - 1.0).abs() < 1e-12);
        assert_eq!(fixed.matrix().get(0, 4), 0.2);
        assert_eq!(fixed.matrix().to_dense(), twice.matrix().to_dense());
        assert_eq!(fixed.dangling_mass(&[0.2; 5]), 0.0);
        assert!((t.dangling_mass(&[0.2; 5]) - 0.2).abs() < 1e-15);
    }

    #[test]
    fn test_shape_error_on_inconsistent_view() {
        let mut view = sample_view();
        view.out_targets[0] = 42;
        let err = TransitionMatrixBuilder::new().build(&view).unwrap_err();
        assert!(matches!(err, PageRankError::Shape(_)));
    }

    #[test]
    fn test_from_matrix_rejects_mismatched_nodes() {
        let m = Matrix::Dense(Array2::zeros((2, 2)));
        assert!(matches!(
            TransitionMatrix::from_matrix(m, vec![1]),
            Err(PageRankError::Shape(_))
        ));
    }
}
