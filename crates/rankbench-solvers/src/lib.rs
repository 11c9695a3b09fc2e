pub mod anderson;
pub mod common;
pub mod convergence;
pub mod direct_lu;
pub mod eigen;
pub mod error;
pub mod gauss_seidel;
pub mod gmres;
pub mod google;
pub mod linear_system;
pub mod observer;
pub mod omega;
pub mod ordering;
pub mod power;
pub mod preconditioner;
pub mod solver;
pub mod transition;

pub use anderson::{AndersonConfig, AndersonSolver, AndersonStats};
pub use common::{GraphView, NodeId};
pub use convergence::{ConvergenceStatus, ConvergenceTracker};
pub use direct_lu::{DirectLuConfig, DirectLuSolver, SparseLu};
pub use eigen::{eig_arnoldi, eig_dense, EigenConfig, EigenMethod, EigenSolver};
pub use error::{PageRankError, SolverResult};
pub use gauss_seidel::{GaussSeidelConfig, GaussSeidelSolver, OmegaTrial};
pub use gmres::{gmres, GmresConfig, GmresSolver};
pub use google::GoogleMatrix;
pub use linear_system::{LinearOperator, PageRankOperator, PageRankSystem};
pub use observer::{NoopObserver, RecordingObserver, SolveEvent, SolveObserver, TracingObserver};
pub use omega::{DynamicOmega, OmegaStrategy};
pub use ordering::PivotStrategy;
pub use power::{power_method, PowerConfig, PowerIterationSolver};
pub use preconditioner::{IluParams, Preconditioner};
pub use solver::{CommonParams, PageRankResult, Solver, SolverKind};
pub use transition::{EdgeWeight, Matrix, Representation, TransitionMatrix, TransitionMatrixBuilder};
