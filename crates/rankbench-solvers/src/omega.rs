//! Relaxation-factor selection for Gauss-Seidel / SOR sweeps

use crate::error::{PageRankError, SolverResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lower bound of the dynamic strategy
pub const DYNAMIC_OMEGA_MIN: f64 = 1.0;
/// Upper bound of the dynamic strategy
pub const DYNAMIC_OMEGA_MAX: f64 = 1.3;
/// Largest change of omega between two non-divergent sweeps
pub const DYNAMIC_MAX_STEP: f64 = 0.02;
/// Back-off applied after a sweep whose residual grew
pub const DYNAMIC_DIVERGENCE_BACKOFF: f64 = 0.05;
/// Consecutive divergent sweeps before omega is frozen
pub const DYNAMIC_MAX_DIVERGENCES: usize = 3;
/// Default interval and budget of the auto strategy
pub const AUTO_OMEGA_LOW: f64 = 1.0;
pub const AUTO_OMEGA_HIGH: f64 = 1.9;
pub const AUTO_CANDIDATES: usize = 10;
pub const AUTO_TRIAL_ITERS: usize = 50;
const SLOW_RATIO: f64 = 1.2;
const FAST_RATIO: f64 = 1.8;

/// How the relaxation factor is chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OmegaStrategy {
    /// Caller-supplied omega, unchanged every sweep
    Fixed(f64),
    /// Bounded trial sweeps over `candidates` values linearly spaced in `[low, high]`
    Auto {
        low: f64,
        high: f64,
        candidates: usize,
        trial_iters: usize,
    },
    /// Recomputed every sweep from the residual trend, see [`DynamicOmega`]
    Dynamic,
    /// `2 / (1 + sqrt(1 - alpha^2))`
    Analytic,
}

impl Default for OmegaStrategy {
    fn default() -> Self {
        OmegaStrategy::Fixed(1.0)
    }
}

impl OmegaStrategy {
    /// Auto strategy over the default interval (1.0, 1.9)
    pub fn auto() -> Self {
        OmegaStrategy::Auto {
            low: AUTO_OMEGA_LOW,
            high: AUTO_OMEGA_HIGH,
            candidates: AUTO_CANDIDATES,
            trial_iters: AUTO_TRIAL_ITERS,
        }
    }

    pub fn validate(&self) -> SolverResult<()> {
        match *self {
            OmegaStrategy::Fixed(omega) if !(omega > 0.0 && omega < 2.0) => Err(
                PageRankError::InvalidConfig(format!("omega must lie in (0, 2), got {}", omega)),
            ),
            OmegaStrategy::Auto { low, high, candidates, trial_iters } => {
                if !(low > 0.0 && low <= high && high < 2.0) {
                    return Err(PageRankError::InvalidConfig(format!(
                        "omega interval ({}, {}) must lie inside (0, 2)",
                        low, high
                    )));
                }
                if candidates == 0 || trial_iters == 0 {
                    return Err(PageRankError::InvalidConfig(
                        "auto omega needs at least one candidate and one trial sweep".to_string(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OmegaStrategy::Fixed(_) => "fixed",
            OmegaStrategy::Auto { .. } => "auto",
            OmegaStrategy::Dynamic => "dynamic",
            OmegaStrategy::Analytic => "analytic",
        }
    }
}

impl FromStr for OmegaStrategy {
    type Err = PageRankError;

    /// Accepts a strategy name or a number, which selects a fixed omega.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "fixed" => Ok(OmegaStrategy::Fixed(1.0)),
            "auto" => Ok(OmegaStrategy::auto()),
            "dynamic" => Ok(OmegaStrategy::Dynamic),
            "analytic" | "optimal" => Ok(OmegaStrategy::Analytic),
            other => match other.parse::<f64>() {
                Ok(omega) => {
                    let strategy = OmegaStrategy::Fixed(omega);
                    strategy.validate()?;
                    Ok(strategy)
                }
                Err(_) => Err(PageRankError::UnknownOmegaStrategy(s.to_string())),
            },
        }
    }
}

/// Classic SOR estimate for a Google matrix with damping `alpha`
pub fn analytic_omega(alpha: f64) -> f64 {
    2.0 / (1.0 + (1.0 - alpha * alpha).sqrt())
}

/// `count` values evenly spaced over `[low, high]`
pub fn linspace(low: f64, high: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![low],
        _ => {
            let step = (high - low) / (count - 1) as f64;
            (0..count).map(|k| low + step * k as f64).collect()
        }
    }
}

/// Adaptive relaxation factor driven by the residual ratio of successive sweeps
#[derive(Debug, Clone)]
pub struct DynamicOmega {
    current: f64,
    divergence_count: usize,
    total_divergences: usize,
    best_omega: f64,
    best_residual: f64,
    previous_residual: Option<f64>,
    locked: bool,
}

impl Default for DynamicOmega {
    fn default() -> Self {
        Self::new(DYNAMIC_OMEGA_MIN)
    }
}

impl DynamicOmega {
    pub fn new(initial: f64) -> Self {
        let initial = initial.clamp(DYNAMIC_OMEGA_MIN, DYNAMIC_OMEGA_MAX);
        Self {
            current: initial,
            divergence_count: 0,
            total_divergences: 0,
            best_omega: initial,
            best_residual: f64::INFINITY,
            previous_residual: None,
            locked: false,
        }
    }

    /// Omega to use for the next sweep
    pub fn omega(&self) -> f64 {
        self.current
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn divergences(&self) -> usize {
        self.total_divergences
    }

    pub fn best_omega(&self) -> f64 {
        self.best_omega
    }

    /// Feed the residual of the sweep that used [`DynamicOmega::omega`];
    /// returns the omega for the next sweep.
    pub fn update(&mut self, residual: f64) -> f64 {
        if residual < self.best_residual {
            self.best_residual = residual;
            self.best_omega = self.current;
        }
        if self.locked {
            return self.current;
        }

        match self.previous_residual {
            Some(previous) if residual > previous => {
                self.divergence_count += 1;
                self.total_divergences += 1;
                if self.divergence_count >= DYNAMIC_MAX_DIVERGENCES {
                    self.locked = true;
                    self.current = self.best_omega;
                } else {
                    self.current = (self.current - DYNAMIC_DIVERGENCE_BACKOFF).max(DYNAMIC_OMEGA_MIN);
                }
            }
            Some(previous) => {
                self.divergence_count = 0;
                let ratio = if residual > 0.0 { previous / residual } else { f64::INFINITY };
                let delta = if ratio < SLOW_RATIO {
                    DYNAMIC_MAX_STEP
                } else if ratio > FAST_RATIO {
                    -DYNAMIC_MAX_STEP
                } else {
                    0.0
                };
                self.current = (self.current + delta).clamp(DYNAMIC_OMEGA_MIN, DYNAMIC_OMEGA_MAX);
            }
            None => {}
        }
        self.previous_residual = Some(residual);
        self.current
    }
}
