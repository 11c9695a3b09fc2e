//! Edge-list loading
//!
//! Reads SNAP-style text files: one `src dst [weight]` edge per line, `#`
//! comments. Node tokens are interned in first-seen order, so the NodeId of
//! a node is its position in the label table.

use indexmap::IndexSet;
use rankbench_solvers::{GraphView, NodeId};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Edge-list loading errors
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Edge list file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type LoadResult<T> = Result<T, LoadError>;

/// How an edge list is parsed
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Add the reverse of every edge
    pub undirected: bool,
    /// Column delimiter; `None` splits on any whitespace
    pub delimiter: Option<char>,
    /// Lines starting with this prefix are skipped
    pub comment_prefix: String,
    /// Read the third column as the edge weight
    pub weighted: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            undirected: false,
            delimiter: None,
            comment_prefix: "#".to_string(),
            weighted: false,
        }
    }
}

impl LoadOptions {
    pub fn undirected(mut self) -> Self {
        self.undirected = true;
        self
    }

    pub fn weighted(mut self) -> Self {
        self.weighted = true;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_comment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.comment_prefix = prefix.into();
        self
    }
}

/// A graph view together with the text label of every node
#[derive(Debug, Clone)]
pub struct LabeledGraph {
    pub view: GraphView,
    labels: IndexSet<String>,
}

impl LabeledGraph {
    /// Use the numeric node ids as labels
    pub fn from_view(view: GraphView) -> Self {
        let max_id = view.index_to_node.iter().copied().max().map_or(0, |m| m + 1);
        let labels = (0..max_id).map(|id| id.to_string()).collect();
        Self { view, labels }
    }

    pub fn label(&self, node: NodeId) -> Option<&str> {
        self.labels.get_index(node as usize).map(String::as_str)
    }

    pub fn node_id(&self, label: &str) -> Option<NodeId> {
        self.labels.get_index_of(label).map(|i| i as NodeId)
    }

    /// Label, falling back to the numeric id
    pub fn display(&self, node: NodeId) -> String {
        self.label(node).map_or_else(|| node.to_string(), str::to_string)
    }

    /// Same labels, different view (for sampled subgraphs)
    pub fn with_view(&self, view: GraphView) -> Self {
        Self { view, labels: self.labels.clone() }
    }
}

/// Accumulates edges with label interning and duplicate removal.
///
/// A repeated `(src, dst)` pair keeps its first position and its latest weight.
#[derive(Debug, Default)]
struct EdgeCollector {
    labels: IndexSet<String>,
    edges: Vec<(NodeId, NodeId, f64)>,
    seen: FxHashMap<(NodeId, NodeId), usize>,
}

impl EdgeCollector {
    fn intern(&mut self, label: &str) -> NodeId {
        match self.labels.get_index_of(label) {
            Some(i) => i as NodeId,
            None => self.labels.insert_full(label.to_string()).0 as NodeId,
        }
    }

    fn add(&mut self, src: NodeId, dst: NodeId, weight: f64) {
        match self.seen.get(&(src, dst)) {
            Some(&pos) => self.edges[pos].2 = weight,
            None => {
                self.seen.insert((src, dst), self.edges.len());
                self.edges.push((src, dst, weight));
            }
        }
    }

    fn finish(self, weighted: bool) -> LabeledGraph {
        let nodes: Vec<NodeId> = (0..self.labels.len() as NodeId).collect();
        let view = if weighted {
            GraphView::from_weighted_edges(&nodes, &self.edges)
        } else {
            let pairs: Vec<(NodeId, NodeId)> = self.edges.iter().map(|&(u, v, _)| (u, v)).collect();
            GraphView::from_edges(&nodes, &pairs)
        };
        LabeledGraph { view, labels: self.labels }
    }
}

/// Parse one line into `(src, dst, weight)` tokens
fn parse_line<'a>(line: &'a str, options: &LoadOptions) -> Option<(&'a str, &'a str, f64)> {
    let line = line.trim();
    if line.is_empty() || (!options.comment_prefix.is_empty() && line.starts_with(&options.comment_prefix)) {
        return None;
    }
    let parts: Vec<&str> = match options.delimiter {
        Some(d) => line.split(d).map(str::trim).collect(),
        None => line.split_whitespace().collect(),
    };
    if parts.len() < 2 {
        return None;
    }
    let weight = if options.weighted {
        parts.get(2).and_then(|w| w.parse::<f64>().ok()).unwrap_or(1.0)
    } else {
        1.0
    };
    Some((parts[0], parts[1], weight))
}

/// Read an edge list from any buffered reader
pub fn read_edge_list(reader: impl BufRead, options: &LoadOptions) -> std::io::Result<LabeledGraph> {
    let mut collector = EdgeCollector::default();
    let mut skipped = 0usize;
    for line in reader.lines() {
        let line = line?;
        match parse_line(&line, options) {
            Some((src, dst, weight)) => {
                let (u, v) = (collector.intern(src), collector.intern(dst));
                collector.add(u, v, weight);
                if options.undirected && u != v {
                    collector.add(v, u, weight);
                }
            }
            None => skipped += 1,
        }
    }
    debug!("Skipped {} comment, blank or malformed lines", skipped);
    Ok(collector.finish(options.weighted))
}

/// Load an edge-list file
pub fn load_edge_list(path: impl AsRef<Path>, options: &LoadOptions) -> LoadResult<LabeledGraph> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    info!("Reading edge list from {:?}", path);
    let io_err = |source| LoadError::Io { path: path.to_path_buf(), source };
    let file = File::open(path).map_err(io_err)?;
    let graph = read_edge_list(BufReader::new(file), options).map_err(io_err)?;
    info!(
        "Loaded graph with {} nodes and {} edges",
        graph.view.node_count,
        graph.view.edge_count()
    );
    Ok(graph)
}

/// Small demo graph: A->B, A->C, B->C, C->A, D->C
pub fn sample_graph() -> LabeledGraph {
    let mut collector = EdgeCollector::default();
    for (src, dst) in [("A", "B"), ("A", "C"), ("B", "C"), ("C", "A"), ("D", "C")] {
        let (u, v) = (collector.intern(src), collector.intern(dst));
        collector.add(u, v, 1.0);
    }
    collector.finish(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_sample_graph() {
        let g = sample_graph();
        assert_eq!(g.view.node_count, 4);
        assert_eq!(g.view.edge_count(), 5);
        assert_eq!(g.label(0), Some("A"));
        assert_eq!(g.node_id("D"), Some(3));
        // D has no incoming edges, nothing is dangling
        assert_eq!(g.view.in_degree(3), 0);
        assert_eq!(g.view.dangling_count(), 0);
    }

    #[test]
    fn test_comments_blank_and_short_lines() {
        let text = "# header\n\n1 2\n2\t3\n% not a comment by default\n3 1 extra columns\n";
        let g = read_edge_list(Cursor::new(text), &LoadOptions::default()).unwrap();
        // "%" line has tokens "%", "not" and is read as an edge
        assert_eq!(g.view.node_count, 5);
        assert_eq!(g.view.edge_count(), 4);

        let opts = LoadOptions::default().with_comment_prefix("%");
        let g = read_edge_list(Cursor::new("% c\n1 2\n"), &opts).unwrap();
        assert_eq!(g.view.edge_count(), 1);
    }

    #[test]
    fn test_weights_and_duplicates() {
        let text = "a b 2.5\na c oops\na b 4.0\n";
        let g = read_edge_list(Cursor::new(text), &LoadOptions::default().weighted()).unwrap();
        assert_eq!(g.view.edge_count(), 2);
        let a = g.view.node_to_index[&g.node_id("a").unwrap()];
        // Latest weight wins; unparsable weight falls back to 1.0
        assert_eq!(g.view.weights(a), Some(&[4.0, 1.0][..]));
    }

    #[test]
    fn test_undirected_and_delimiter() {
        let text = "x,y\ny,z\nz,z\n";
        let opts = LoadOptions::default().undirected().with_delimiter(',');
        let g = read_edge_list(Cursor::new(text), &opts).unwrap();
        // x<->y, y<->z, z->z
        assert_eq!(g.view.edge_count(), 5);
        assert_eq!(g.view.dangling_count(), 0);
    }

    #[test]
    fn test_missing_file() {
        let err = load_edge_list("/definitely/not/here.txt", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }
}
