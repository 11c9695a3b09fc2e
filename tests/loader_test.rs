use rankbench::graph::{limit_graph, load_edge_list, LoadError, LoadOptions};
use rankbench::eval::{run_comparison, ComparisonSettings};
use rankbench::solvers::{CommonParams, EdgeWeight, Solver, SolverKind};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_edges(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_snap_style_file() {
    let file = write_edges(
        "# Directed graph: toy.txt\n# FromNodeId\tToNodeId\n10\t20\n10\t30\n20\t30\n30\t10\n40\t30\n",
    );
    let graph = load_edge_list(file.path(), &LoadOptions::default()).unwrap();
    assert_eq!(graph.view.node_count, 4);
    assert_eq!(graph.view.edge_count(), 5);
    assert_eq!(graph.label(0), Some("10"));
    assert_eq!(graph.node_id("40"), Some(3));

    let result = Solver::from_kind(SolverKind::Power, &CommonParams::default())
        .solve(&graph.view)
        .unwrap();
    let (top, _) = result.ranking()[0];
    assert_eq!(graph.display(top), "30");
}

#[test]
fn test_load_weighted_csv() {
    let file = write_edges("a,b,3\na,c,1\nb,c\nc,a,2.5\n");
    let options = LoadOptions::default().weighted().with_delimiter(',');
    let graph = load_edge_list(file.path(), &options).unwrap();
    let a = graph.node_id("a").unwrap() as usize;
    assert_eq!(graph.view.weights(a), Some(&[3.0, 1.0][..]));
    let b = graph.node_id("b").unwrap() as usize;
    assert_eq!(graph.view.weights(b), Some(&[1.0][..]));
}

#[test]
fn test_weighted_load_reaches_every_solver() {
    let file = write_edges("a b 9\na c 1\nb a 1\nc a 1\n");
    let plain = load_edge_list(file.path(), &LoadOptions::default()).unwrap();
    let weighted = load_edge_list(file.path(), &LoadOptions::default().weighted()).unwrap();
    let b = weighted.node_id("b").unwrap();
    let c = weighted.node_id("c").unwrap();

    let unit = CommonParams { tol: 1e-10, max_iter: 1000, ..CommonParams::default() };
    let stored = CommonParams { edge_weight: EdgeWeight::Stored, ..unit.clone() };
    for kind in SolverKind::ALL {
        let before = Solver::from_kind(kind, &unit).solve(&plain.view).unwrap();
        let after = Solver::from_kind(kind, &stored).solve(&weighted.view).unwrap();
        let (b0, c0) = (before.score(b).unwrap(), before.score(c).unwrap());
        let (b1, c1) = (after.score(b).unwrap(), after.score(c).unwrap());
        assert!((b0 - c0).abs() < 1e-9, "{}: {} vs {}", kind, b0, c0);
        assert!(b1 > 2.0 * c1, "{}: {} vs {}", kind, b1, c1);
    }

    let solvers: Vec<Solver> = SolverKind::ALL.iter().map(|&k| Solver::from_kind(k, &stored)).collect();
    let settings = ComparisonSettings { tol: 1e-10, max_iter: 1000, edge_weight: EdgeWeight::Stored, ..Default::default() };
    let report = run_comparison(&weighted.view, &solvers, &settings).unwrap();
    assert!(report.worst_l1() < 1e-6, "{}", report.worst_l1());
}

#[test]
fn test_missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.txt");
    match load_edge_list(&missing, &LoadOptions::default()) {
        Err(LoadError::NotFound(path)) => assert_eq!(path, missing),
        other => panic!("unexpected {:?}", other.map(|g| g.view.node_count)),
    }
}

#[test]
fn test_limit_keeps_largest_scc_labels() {
    // Cycle x -> y -> z -> x plus tail nodes
    let file = write_edges("t1 x\nx y\ny z\nz x\nz t2\n");
    let graph = load_edge_list(file.path(), &LoadOptions::default()).unwrap();
    let limited = graph.with_view(limit_graph(&graph.view, Some(100)));
    assert_eq!(limited.view.node_count, 3);
    let labels: Vec<String> = limited.view.index_to_node.iter().map(|&id| limited.display(id)).collect();
    assert_eq!(labels, vec!["x", "y", "z"]);
}
