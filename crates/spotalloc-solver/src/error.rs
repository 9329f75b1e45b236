use good_lp::ResolutionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Row {row} has {found} coefficients but the problem has {expected} variables")]
    DimensionMismatch { row: String, expected: usize, found: usize },
    #[error("Non-finite coefficient in {0}")]
    NonFinite(String),
    #[error("Only single-threaded solving is supported (requested {0} threads)")]
    Threads(usize),
    #[error("Limit reached before any feasible solution was found")]
    NoIncumbent,
    #[error("Solver returned values that violate the model")]
    InvalidSolution,
    #[error("HiGHS failed: {0}")]
    Backend(#[from] ResolutionError),
}
