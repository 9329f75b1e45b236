mod error;
mod lp_format;
mod mip;
mod problem;
mod solution;

pub use error::SolverError;
pub use lp_format::write_lp;
pub use mip::MipSolver;
pub use problem::{Constraint, ConstraintOp, LpProblem, Objective};
pub use solution::{Solution, SolutionStatus};
