//! SMO solver for the SVM dual problem
//!
//! Second-order working-set selection with shrinking, run over one of the
//! [`qmatrix`] Hessians with either the [`Standard`] or the [`Nu`] variant.

pub mod qmatrix;
pub mod shrinking;
pub mod smo;
pub mod variant;

pub use self::qmatrix::{OneClassQ, QMatrix, SvcQ, SvrQ};
pub use self::smo::{SMOSolver, Solution, SolutionInfo, SolverInput, SolverState};
pub use self::variant::{Nu, SolverVariant, Standard};
