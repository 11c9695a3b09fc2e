//! Rankbench CLI: run and compare PageRank solvers on edge-list files

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use rankbench::eval::{run_comparison, timing_benchmark, ComparisonReport, ComparisonSettings};
use rankbench::graph::{limit_graph, load_edge_list, sample_graph, GraphSummary, LabeledGraph, LoadOptions};
use rankbench::report::{score_rows, write_csv, write_json, write_report_csv};
use rankbench::solvers::{
    CommonParams, EdgeWeight, EigenMethod, OmegaStrategy, PageRankResult, PivotStrategy,
    Preconditioner, Solver, SolverKind,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rankbench-cli", version, about = "Run and compare PageRank solvers")]
struct Cli {
    /// Edge-list file; the built-in 4-node sample graph when omitted
    #[arg(long, global = true)]
    graph: Option<PathBuf>,

    /// Treat every edge as undirected
    #[arg(long, global = true)]
    undirected: bool,

    /// Read a third column as the edge weight and rank by it
    #[arg(long, global = true)]
    weighted: bool,

    /// Column delimiter (default: any whitespace)
    #[arg(long, global = true)]
    delimiter: Option<char>,

    /// Keep the largest SCC, BFS-sampled down to N nodes
    #[arg(long, global = true)]
    limit: Option<usize>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Log filter (e.g. info, debug, rankbench_solvers=trace); falls back to RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Args, Clone)]
struct SolveArgs {
    /// Damping factor
    #[arg(long, default_value_t = 0.85)]
    alpha: f64,

    /// Convergence tolerance
    #[arg(long, default_value_t = 1e-6)]
    tol: f64,

    /// Iteration limit (restart cycles for GMRES)
    #[arg(long, default_value_t = 100)]
    max_iter: usize,

    /// Number of top-ranked nodes to show
    #[arg(long, default_value_t = 10)]
    top_k: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one solver
    Run {
        /// power, gauss-seidel, gmres, direct-lu, anderson or eigen
        #[arg(long, default_value = "power")]
        solver: SolverKind,

        #[command(flatten)]
        common: SolveArgs,

        /// Fixed relaxation factor for Gauss-Seidel / SOR
        #[arg(long, conflicts_with = "omega_strategy")]
        omega: Option<f64>,

        /// fixed, auto, dynamic or analytic
        #[arg(long)]
        omega_strategy: Option<OmegaStrategy>,

        /// GMRES restart length
        #[arg(long)]
        restart: Option<usize>,

        /// GMRES preconditioner: none, jacobi or ilu
        #[arg(long)]
        preconditioner: Option<Preconditioner>,

        /// Column ordering for LU: NATURAL, COLAMD, MMD_ATA or MMD_AT_PLUS_A
        #[arg(long)]
        pivot: Option<PivotStrategy>,

        /// Pivot drop tolerance for LU
        #[arg(long)]
        drop_tol: Option<f64>,

        /// Anderson history window
        #[arg(long)]
        window: Option<usize>,

        /// Eigenvector method: auto, dense or arnoldi
        #[arg(long)]
        eigen_method: Option<EigenMethod>,

        /// Krylov subspace size for the Arnoldi eigen solver
        #[arg(long)]
        krylov_dim: Option<usize>,
    },
    /// Run every solver and compare against the dense reference
    Compare {
        #[command(flatten)]
        common: SolveArgs,

        /// Also time every solver over N repetitions
        #[arg(long)]
        repeat: Option<usize>,
    },
    /// Show graph statistics
    Info,
}

/// Solver-specific overrides from the `run` subcommand
struct Overrides {
    omega: Option<OmegaStrategy>,
    restart: Option<usize>,
    preconditioner: Option<Preconditioner>,
    pivot: Option<PivotStrategy>,
    drop_tol: Option<f64>,
    window: Option<usize>,
    eigen_method: Option<EigenMethod>,
    krylov_dim: Option<usize>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let result = load_graph(&cli).and_then(|graph| match &cli.command {
        Commands::Run {
            solver,
            common,
            omega,
            omega_strategy,
            restart,
            preconditioner,
            pivot,
            drop_tol,
            window,
            eigen_method,
            krylov_dim,
        } => {
            let overrides = Overrides {
                omega: omega.map(OmegaStrategy::Fixed).or_else(|| omega_strategy.clone()),
                restart: *restart,
                preconditioner: *preconditioner,
                pivot: *pivot,
                drop_tol: *drop_tol,
                window: *window,
                eigen_method: *eigen_method,
                krylov_dim: *krylov_dim,
            };
            run_solver(&graph, *solver, common, cli.weighted, &overrides, &cli.format)
        }
        Commands::Compare { common, repeat } => {
            run_compare(&graph, common, cli.weighted, *repeat, &cli.format)
        }
        Commands::Info => run_info(&graph, &cli.format),
    });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_graph(cli: &Cli) -> Result<LabeledGraph> {
    let graph = match &cli.graph {
        Some(path) => {
            let mut options = LoadOptions::default();
            options.undirected = cli.undirected;
            options.weighted = cli.weighted;
            options.delimiter = cli.delimiter;
            load_edge_list(path, &options).with_context(|| format!("loading {}", path.display()))?
        }
        None => {
            info!("No --graph given, using the sample graph");
            sample_graph()
        }
    };
    if cli.limit.is_some() {
        let view = limit_graph(&graph.view, cli.limit);
        info!("Limited graph to {} of {} nodes", view.node_count, graph.view.node_count);
        return Ok(graph.with_view(view));
    }
    Ok(graph)
}

fn edge_weight(weighted: bool) -> EdgeWeight {
    if weighted {
        EdgeWeight::Stored
    } else {
        EdgeWeight::Unit
    }
}

fn common_params(common: &SolveArgs, weighted: bool) -> CommonParams {
    CommonParams {
        alpha: common.alpha,
        tol: common.tol,
        max_iter: common.max_iter,
        edge_weight: edge_weight(weighted),
        teleport: None,
    }
}

fn build_solver(kind: SolverKind, common: &SolveArgs, weighted: bool, overrides: &Overrides) -> Solver {
    let mut solver = Solver::from_kind(kind, &common_params(common, weighted));
    match &mut solver {
        Solver::GaussSeidel(c) => {
            if let Some(omega) = &overrides.omega {
                c.omega = omega.clone();
            }
        }
        Solver::Gmres(c) => {
            if let Some(restart) = overrides.restart {
                c.restart = restart;
            }
            if let Some(preconditioner) = overrides.preconditioner {
                c.preconditioner = preconditioner;
            }
        }
        Solver::DirectLu(c) => {
            if let Some(pivot) = overrides.pivot {
                c.pivot = pivot;
            }
            if let Some(drop_tol) = overrides.drop_tol {
                c.drop_tol = drop_tol;
            }
        }
        Solver::Anderson(c) => {
            if let Some(window) = overrides.window {
                c.window = window;
            }
        }
        Solver::Eigen(c) => {
            if let Some(method) = overrides.eigen_method {
                c.method = method;
            }
            if let Some(krylov_dim) = overrides.krylov_dim {
                c.krylov_dim = krylov_dim;
            }
        }
        Solver::Power(_) => {}
    }
    solver
}

fn run_solver(
    graph: &LabeledGraph,
    kind: SolverKind,
    common: &SolveArgs,
    weighted: bool,
    overrides: &Overrides,
    format: &OutputFormat,
) -> Result<()> {
    let solver = build_solver(kind, common, weighted, overrides);
    let result = solver
        .solve(&graph.view)
        .with_context(|| format!("{} solver failed", solver.name()))?;
    let rows = score_rows(&result, Some(graph), Some(common.top_k));

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "solver": solver.name(),
                "config": &solver,
                "iterations": result.iterations,
                "converged": result.converged,
                "final_residual": result.final_residual(),
                "elapsed_secs": result.elapsed_secs(),
                "top": rows,
                "residuals": result.residuals,
            });
            write_json(std::io::stdout().lock(), &value)?;
        }
        OutputFormat::Csv => {
            write_csv(std::io::stdout().lock(), &rows)?;
        }
        OutputFormat::Table => {
            print_run_summary(solver.name(), &result);
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Rank", "Node", "Score"]);
            for row in &rows {
                table.add_row(vec![row.rank.to_string(), row.label.clone(), format!("{:.6e}", row.score)]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

fn print_run_summary(name: &str, result: &PageRankResult) {
    println!("Solver:     {}", name);
    println!("Nodes:      {}", result.nodes.len());
    println!("Iterations: {}", result.iterations);
    println!("Converged:  {}", result.converged);
    if let Some(r) = result.final_residual() {
        println!("Residual:   {:.3e}", r);
    }
    println!("Elapsed:    {:.4}s", result.elapsed_secs());
}

fn run_compare(
    graph: &LabeledGraph,
    common: &SolveArgs,
    weighted: bool,
    repeat: Option<usize>,
    format: &OutputFormat,
) -> Result<()> {
    let params = common_params(common, weighted);
    let solvers: Vec<Solver> = SolverKind::ALL.iter().map(|&k| Solver::from_kind(k, &params)).collect();
    let settings = ComparisonSettings {
        alpha: common.alpha,
        tol: common.tol,
        max_iter: common.max_iter,
        top_k: common.top_k,
        edge_weight: params.edge_weight,
    };
    let report = run_comparison(&graph.view, &solvers, &settings).context("comparison failed")?;
    let timings = match repeat {
        Some(n) => Some(timing_benchmark(&graph.view, &solvers, n).context("timing failed")?),
        None => None,
    };

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({ "report": &report, "timings": timings });
            write_json(std::io::stdout().lock(), &value)?;
        }
        OutputFormat::Csv => {
            write_report_csv(std::io::stdout().lock(), &report)?;
        }
        OutputFormat::Table => {
            print_comparison(&report);
            if let Some(timings) = timings {
                let mut table = Table::new();
                table.set_content_arrangement(ContentArrangement::Dynamic);
                table.set_header(vec!["Solver", "Runs", "Mean (s)", "Std (s)", "Min (s)"]);
                for t in &timings {
                    table.add_row(vec![
                        t.solver.clone(),
                        t.repeat.to_string(),
                        format!("{:.6}", t.mean_secs),
                        format!("{:.6}", t.std_secs),
                        format!("{:.6}", t.min_secs),
                    ]);
                }
                println!("{}", table);
            }
        }
    }
    Ok(())
}

fn print_comparison(report: &ComparisonReport) {
    println!(
        "{} nodes, {} edges; reference: {} iterations in {:.4}s",
        report.nodes, report.edges, report.reference_iterations, report.reference_elapsed_secs
    );
    let opt = |v: Option<f64>, prec: usize| v.map_or_else(|| "-".to_string(), |x| format!("{:.*e}", prec, x));

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Solver".to_string(),
        "Iterations".to_string(),
        "Residual".to_string(),
        "Converged".to_string(),
        "Time (s)".to_string(),
        "L1 vs ref".to_string(),
        format!("Top-{} overlap", report.settings.top_k),
    ]);
    for row in &report.rows {
        if let Some(err) = &row.error {
            table.add_row(vec![row.solver.clone(), "-".into(), "-".into(), "error".into(), "-".into(), err.clone(), "-".into()]);
            continue;
        }
        table.add_row(vec![
            row.solver.clone(),
            row.iterations.to_string(),
            opt(row.final_residual, 2),
            row.converged.to_string(),
            format!("{:.4}", row.elapsed_secs),
            opt(row.l1_vs_reference, 2),
            row.top_k_overlap.map_or_else(|| "-".to_string(), |x| format!("{:.2}", x)),
        ]);
    }
    println!("{}", table);
}

fn run_info(graph: &LabeledGraph, format: &OutputFormat) -> Result<()> {
    let summary = GraphSummary::of(&graph.view);
    match format {
        OutputFormat::Json => write_json(std::io::stdout().lock(), &summary)?,
        OutputFormat::Csv => write_csv(std::io::stdout().lock(), &[summary])?,
        OutputFormat::Table => {
            println!("Nodes:    {}", summary.nodes);
            println!("Edges:    {}", summary.edges);
            println!("Density:  {:.6e}", summary.density);
            println!("Dangling: {}", summary.dangling);
            println!("Weighted: {}", summary.weighted);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve_args() -> SolveArgs {
        SolveArgs { alpha: 0.85, tol: 1e-8, max_iter: 50, top_k: 5 }
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "rankbench-cli", "run", "--solver", "gauss-seidel", "--omega-strategy", "dynamic",
            "--alpha", "0.9", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { solver, common, omega_strategy, .. } => {
                assert_eq!(solver, SolverKind::GaussSeidel);
                assert_eq!(common.alpha, 0.9);
                assert_eq!(omega_strategy, Some(OmegaStrategy::Dynamic));
            }
            _ => panic!("expected run"),
        }
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn test_cli_rejects_unknown_names() {
        assert!(Cli::try_parse_from(["rankbench-cli", "run", "--solver", "lanczos"]).is_err());
        assert!(Cli::try_parse_from(["rankbench-cli", "run", "--eigen-method", "qr"]).is_err());
        assert!(Cli::try_parse_from(["rankbench-cli", "run", "--preconditioner", "amg"]).is_err());
        assert!(Cli::try_parse_from(["rankbench-cli", "run", "--omega", "1.2", "--omega-strategy", "auto"]).is_err());
    }

    #[test]
    fn test_overrides_reach_the_config() {
        let overrides = Overrides {
            omega: None,
            restart: Some(5),
            preconditioner: Some(Preconditioner::Jacobi),
            pivot: Some(PivotStrategy::Natural),
            drop_tol: None,
            window: Some(4),
            eigen_method: Some(EigenMethod::Arnoldi),
            krylov_dim: Some(8),
        };
        match build_solver(SolverKind::Gmres, &solve_args(), false, &overrides) {
            Solver::Gmres(c) => {
                assert_eq!(c.restart, 5);
                assert_eq!(c.preconditioner, Preconditioner::Jacobi);
                assert_eq!(c.max_iter, 50);
            }
            other => panic!("unexpected {}", other.name()),
        }
        match build_solver(SolverKind::Anderson, &solve_args(), false, &overrides) {
            Solver::Anderson(c) => assert_eq!(c.window, 4),
            other => panic!("unexpected {}", other.name()),
        }
        match build_solver(SolverKind::Eigen, &solve_args(), false, &overrides) {
            Solver::Eigen(c) => {
                assert_eq!(c.method, EigenMethod::Arnoldi);
                assert_eq!(c.krylov_dim, 8);
            }
            other => panic!("unexpected {}", other.name()),
        }
    }

    #[test]
    fn test_weighted_flag_selects_stored_weights() {
        let cli = Cli::try_parse_from(["rankbench-cli", "--weighted", "run", "--solver", "gmres"]).unwrap();
        assert!(cli.weighted);
        let overrides = Overrides {
            omega: None,
            restart: None,
            preconditioner: None,
            pivot: None,
            drop_tol: None,
            window: None,
            eigen_method: None,
            krylov_dim: None,
        };
        match build_solver(SolverKind::Gmres, &solve_args(), cli.weighted, &overrides) {
            Solver::Gmres(c) => assert_eq!(c.edge_weight, EdgeWeight::Stored),
            other => panic!("unexpected {}", other.name()),
        }
        match build_solver(SolverKind::Power, &solve_args(), false, &overrides) {
            Solver::Power(c) => assert_eq!(c.edge_weight, EdgeWeight::Unit),
            other => panic!("unexpected {}", other.name()),
        }
    }
}
