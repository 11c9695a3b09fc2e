//! Solver observers
//!
//! Every solver reports progress through an injected [`SolveObserver`]
//! instead of a process-wide logger. Callbacks run synchronously inside the
//! solve loop, in iteration order.

use std::sync::Mutex;
use std::time::Duration;

/// Hooks invoked by a solver while it runs. All methods default to no-ops.
pub trait SolveObserver {
    /// Called once before the first iteration.
    fn on_start(&self, _solver: &str, _nodes: usize) {}

    /// Called after every iteration with the residual that was just recorded.
    fn on_iteration(&self, _solver: &str, _iteration: usize, _residual: f64) {}

    /// Called whenever the relaxation factor of a Gauss-Seidel sweep is chosen.
    fn on_omega(&self, _iteration: usize, _omega: f64) {}

    /// Non-fatal conditions: non-convergence, rejected acceleration, solver status codes.
    fn on_warning(&self, _solver: &str, _message: &str) {}

    /// Called once when the solver returns a result.
    fn on_finish(&self, _solver: &str, _iterations: usize, _converged: bool, _elapsed: Duration) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SolveObserver for NoopObserver {}

/// Forwards events to `tracing`.
///
/// Iterations are logged at debug level every `every` iterations (10 by default).
#[derive(Debug, Clone, Copy)]
pub struct TracingObserver {
    pub every: usize,
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self { every: 10 }
    }
}

impl SolveObserver for TracingObserver {
    fn on_start(&self, solver: &str, nodes: usize) {
        tracing::info!(solver, nodes, "Starting PageRank solver");
    }

    fn on_iteration(&self, solver: &str, iteration: usize, residual: f64) {
        if self.every > 0 && iteration % self.every == 0 {
            tracing::debug!(solver, iteration, residual, "Iteration");
        }
    }

    fn on_omega(&self, iteration: usize, omega: f64) {
        tracing::trace!(iteration, omega, "Relaxation factor");
    }

    fn on_warning(&self, solver: &str, message: &str) {
        tracing::warn!(solver, "{}", message);
    }

    fn on_finish(&self, solver: &str, iterations: usize, converged: bool, elapsed: Duration) {
        tracing::info!(
            solver,
            iterations,
            converged,
            elapsed_secs = elapsed.as_secs_f64(),
            "PageRank solver finished"
        );
    }
}

/// A single observed event
#[derive(Debug, Clone, PartialEq)]
pub enum SolveEvent {
    Start { solver: String, nodes: usize },
    Iteration { solver: String, iteration: usize, residual: f64 },
    Omega { iteration: usize, omega: f64 },
    Warning { solver: String, message: String },
    Finish { solver: String, iterations: usize, converged: bool },
}

/// Keeps every event in memory, in the order it was emitted.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SolveEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far
    pub fn events(&self) -> Vec<SolveEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Relaxation factors in the order they were reported
    pub fn omegas(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SolveEvent::Omega { omega, .. } => Some(omega),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SolveEvent::Warning { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SolveEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl SolveObserver for RecordingObserver {
    fn on_start(&self, solver: &str, nodes: usize) {
        self.push(SolveEvent::Start { solver: solver.to_string(), nodes });
    }

    fn on_iteration(&self, solver: &str, iteration: usize, residual: f64) {
        self.push(SolveEvent::Iteration { solver: solver.to_string(), iteration, residual });
    }

    fn on_omega(&self, iteration: usize, omega: f64) {
        self.push(SolveEvent::Omega { iteration, omega });
    }

    fn on_warning(&self, solver: &str, message: &str) {
        self.push(SolveEvent::Warning {
            solver: solver.to_string(),
            message: message.to_string(),
        });
    }

    fn on_finish(&self, solver: &str, iterations: usize, converged: bool, _elapsed: Duration) {
        self.push(SolveEvent::Finish { solver: solver.to_string(), iterations, converged });
    }
}
