use anyhow::{Context, Result};
use rankbench::eval::{run_comparison, timing_benchmark, ComparisonSettings};
use rankbench::graph::{random_graph, sample_graph, LabeledGraph};
use rankbench::solvers::{
    AndersonConfig, AndersonSolver, CommonParams, GaussSeidelConfig, GaussSeidelSolver,
    NoopObserver, OmegaStrategy, Solver, SolverKind,
};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Rankbench v{}", rankbench::version());
    println!("==========================================");
    println!();

    // Demo 1: every solver on the 4-node graph
    let graph = sample_graph();
    demo_solvers(&graph)?;

    // Demo 2: relaxation strategies
    demo_omega()?;

    // Demo 3: Anderson acceleration statistics
    demo_anderson()?;

    // Demo 4: comparison against the reference pipeline
    demo_comparison()?;

    Ok(())
}

fn demo_solvers(graph: &LabeledGraph) -> Result<()> {
    println!("=== Demo 1: Solvers on A->B, A->C, B->C, C->A, D->C ===");
    let params = CommonParams { tol: 1e-10, max_iter: 500, ..CommonParams::default() };
    for kind in SolverKind::ALL {
        let result = Solver::from_kind(kind, &params)
            .solve_with_observer(&graph.view, &NoopObserver)
            .with_context(|| format!("{} failed", kind))?;
        let scores: Vec<String> = result
            .ranking()
            .into_iter()
            .map(|(node, score)| format!("{}={:.4}", graph.display(node), score))
            .collect();
        println!(
            "✓ {:<12} {:>3} iterations  {}",
            kind.name(),
            result.iterations,
            scores.join(" ")
        );
    }
    println!();
    Ok(())
}

fn demo_omega() -> Result<()> {
    println!("=== Demo 2: Gauss-Seidel relaxation ===");
    let view = random_graph(2_000, 8, 0.05, 11);
    for omega in [
        OmegaStrategy::Fixed(1.0),
        OmegaStrategy::auto(),
        OmegaStrategy::Dynamic,
        OmegaStrategy::Analytic,
    ] {
        let name = omega.name();
        let config = GaussSeidelConfig::default().with_tol(1e-8).with_max_iter(500).with_omega(omega);
        let result = GaussSeidelSolver::new(config).solve_with_observer(&view, &NoopObserver)?;
        println!(
            "✓ {:<9} {:>3} sweeps, converged: {}",
            name, result.iterations, result.converged
        );
    }
    println!();
    Ok(())
}

fn demo_anderson() -> Result<()> {
    println!("=== Demo 3: Anderson acceleration ===");
    let view = random_graph(2_000, 8, 0.05, 11);
    for window in [1, 2, 5] {
        let config = AndersonConfig::default().with_tol(1e-8).with_max_iter(500).with_window(window);
        let (result, stats) = AndersonSolver::new(config).solve_with_stats(&view, &NoopObserver)?;
        println!(
            "✓ window {}: {:>3} iterations, {} accepted / {} rejected / {} fallbacks",
            window, result.iterations, stats.accepted, stats.rejected, stats.fallbacks
        );
    }
    println!();
    Ok(())
}

fn demo_comparison() -> Result<()> {
    println!("=== Demo 4: Comparison against the reference ===");
    let view = random_graph(500, 6, 0.1, 5);
    let params = CommonParams { tol: 1e-8, max_iter: 500, ..CommonParams::default() };
    let solvers: Vec<Solver> = SolverKind::ALL.iter().map(|&k| Solver::from_kind(k, &params)).collect();
    let settings = ComparisonSettings { tol: 1e-8, max_iter: 500, ..Default::default() };

    let report = run_comparison(&view, &solvers, &settings)?;
    for row in &report.rows {
        match &row.error {
            Some(e) => println!("✗ {:<12} {}", row.solver, e),
            None => println!(
                "✓ {:<12} L1 vs reference {:.2e}, top-{} overlap {:.2}",
                row.solver,
                row.l1_vs_reference.unwrap_or(f64::NAN),
                settings.top_k,
                row.top_k_overlap.unwrap_or(0.0)
            ),
        }
    }

    let timings = timing_benchmark(&view, &solvers, 3)?;
    for t in &timings {
        println!("  {:<12} {:.4}s ± {:.4}s", t.solver, t.mean_secs, t.std_secs);
    }
    Ok(())
}
