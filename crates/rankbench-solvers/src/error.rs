//! Error taxonomy shared by every solver
//!
//! Configuration errors are raised before any work is done, numerical
//! degeneracy is raised as a distinct error so the caller can pick another
//! solver. Non-convergence is not an error: it is reported through
//! `PageRankResult::converged` and the residual history.

use thiserror::Error;

/// Errors produced while building matrices or running a solver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageRankError {
    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Damping factor must lie in (0, 1), got {0}")]
    InvalidAlpha(f64),

    #[error("Invalid teleport vector: {0}")]
    InvalidTeleport(String),

    #[error("Unknown preconditioner '{0}' (expected none, jacobi or ilu)")]
    UnknownPreconditioner(String),

    #[error("Unknown omega strategy '{0}' (expected fixed, auto, dynamic, analytic or a number)")]
    UnknownOmegaStrategy(String),

    #[error("Unknown pivot strategy '{0}' (expected NATURAL, COLAMD, MMD_ATA or MMD_AT_PLUS_A)")]
    UnknownPivotStrategy(String),

    #[error("Unknown eigen method '{0}' (expected auto, dense or arnoldi)")]
    UnknownEigenMethod(String),

    #[error("Unknown solver '{0}'")]
    UnknownSolver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Rank vector degenerated to zero mass at iteration {iteration}")]
    DegenerateVector { iteration: usize },

    #[error("Singular matrix: no acceptable pivot in column {column}")]
    SingularMatrix { column: usize },

    #[error("Eigen decomposition failed: {0}")]
    EigenDecomposition(String),
}

impl PageRankError {
    /// `true` for numerical failures where retrying with another solver makes sense.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            PageRankError::DegenerateVector { .. }
                | PageRankError::SingularMatrix { .. }
                | PageRankError::EigenDecomposition(_)
        )
    }
}

pub type SolverResult<T> = std::result::Result<T, PageRankError>;
