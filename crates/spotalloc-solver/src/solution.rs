/// The result of solving a problem
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Values for each variable (empty when no solution exists)
    pub values: Vec<f64>,
    /// Objective value of `values`
    pub objective_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// A feasible solution was found but optimality was not proven (time or node limit)
    Feasible,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
}

impl SolutionStatus {
    /// Whether the solution carries usable variable values
    pub fn has_solution(self) -> bool {
        matches!(self, SolutionStatus::Optimal | SolutionStatus::Feasible)
    }
}

impl Solution {
    pub fn new(status: SolutionStatus, values: Vec<f64>, objective_value: f64) -> Self {
        Self {
            status,
            values,
            objective_value,
        }
    }

    pub fn infeasible() -> Self {
        Self::new(SolutionStatus::Infeasible, Vec::new(), f64::NAN)
    }

    pub fn unbounded() -> Self {
        Self::new(SolutionStatus::Unbounded, Vec::new(), f64::NAN)
    }
}
