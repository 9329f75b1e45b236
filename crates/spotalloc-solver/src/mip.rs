use std::time::{Duration, Instant};

use good_lp::solvers::SolutionStatus as HighsStatus;
use good_lp::solvers::highs::highs;
use good_lp::{Expression, ProblemVariables, ResolutionError, Solution as _, SolverModel, Variable, constraint, variable};
use tracing::debug;

use crate::error::SolverError;
use crate::problem::{ConstraintOp, LpProblem};
use crate::solution::{Solution, SolutionStatus};

/// Solves an [`LpProblem`] with HiGHS through `good_lp`.
///
/// Binary columns are declared as binaries, all others as non-negative
/// continuous. The MIP gap is closed completely so that `Optimal` means
/// proven optimal.
#[derive(Debug, Clone)]
pub struct MipSolver {
    /// Wall-clock budget for one call to [`MipSolver::solve`]
    time_limit: Option<Duration>,
    max_nodes: Option<usize>,
    threads: usize,
    /// Relative row tolerance used to accept the returned values
    feasibility_tolerance: f64,
}

impl Default for MipSolver {
    fn default() -> Self {
        Self {
            time_limit: None,
            max_nodes: None,
            threads: 1,
            feasibility_tolerance: 1e-6,
        }
    }
}

impl MipSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = Some(max);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn solve(&self, problem: &LpProblem) -> Result<Solution, SolverError> {
        validate(problem)?;
        if self.threads != 1 {
            return Err(SolverError::Threads(self.threads));
        }

        let mut vars = ProblemVariables::new();
        let columns: Vec<Variable> = problem
            .variables
            .iter()
            .zip(&problem.binary)
            .map(|(name, &is_binary)| {
                let definition = variable().name(name.clone());
                vars.add(if is_binary { definition.binary() } else { definition.min(0.0) })
            })
            .collect();

        let objective = linear(&columns, &problem.objective.coefficients);
        let unsolved = if problem.objective.minimize {
            vars.minimise(objective)
        } else {
            vars.maximise(objective)
        };

        let mut model = unsolved
            .using(highs)
            .set_option("output_flag", false)
            .set_option("threads", 1)
            .set_option("mip_rel_gap", 0.0);
        if let Some(limit) = self.time_limit {
            model = model.set_option("time_limit", limit.as_secs_f64());
        }
        if let Some(max) = self.max_nodes {
            model = model.set_option("mip_max_nodes", i32::try_from(max).unwrap_or(i32::MAX));
        }
        for c in &problem.constraints {
            let lhs = linear(&columns, &c.coefficients);
            let rhs = c.rhs;
            model = model.with(match c.op {
                ConstraintOp::Le => constraint!(lhs <= rhs),
                ConstraintOp::Ge => constraint!(lhs >= rhs),
                ConstraintOp::Eq => constraint!(lhs == rhs),
            });
        }

        let started = Instant::now();
        let solved = match model.solve() {
            Ok(solved) => solved,
            Err(ResolutionError::Infeasible) => return Ok(Solution::infeasible()),
            Err(ResolutionError::Unbounded) => return Ok(Solution::unbounded()),
            Err(e) => return Err(e.into()),
        };
        let proven = matches!(solved.status(), HighsStatus::Optimal);

        let values: Vec<f64> = columns
            .iter()
            .zip(&problem.binary)
            .map(|(&column, &is_binary)| {
                let value = solved.value(column);
                if is_binary { value.round() } else { value }
            })
            .collect();
        debug!(
            problem = %problem.name,
            proven,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "HiGHS finished"
        );

        if !problem.is_feasible(&values, self.feasibility_tolerance) {
            return Err(if proven { SolverError::InvalidSolution } else { SolverError::NoIncumbent });
        }

        let status = if proven { SolutionStatus::Optimal } else { SolutionStatus::Feasible };
        let objective_value = problem.objective_value(&values);
        Ok(Solution::new(status, values, objective_value))
    }
}

fn linear(columns: &[Variable], coefficients: &[f64]) -> Expression {
    let mut expr = Expression::from(0.0);
    for (&column, &coef) in columns.iter().zip(coefficients) {
        if coef != 0.0 {
            expr.add_mul(coef, column);
        }
    }
    expr
}

fn validate(problem: &LpProblem) -> Result<(), SolverError> {
    let expected = problem.num_variables();
    let check = |row: &str, coefficients: &[f64]| -> Result<(), SolverError> {
        if coefficients.len() != expected {
            return Err(SolverError::DimensionMismatch {
                row: row.to_string(),
                expected,
                found: coefficients.len(),
            });
        }
        if coefficients.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite(row.to_string()));
        }
        Ok(())
    };

    check("objective", &problem.objective.coefficients)?;
    if problem.binary.len() != expected {
        return Err(SolverError::DimensionMismatch {
            row: "binary flags".to_string(),
            expected,
            found: problem.binary.len(),
        });
    }
    for c in &problem.constraints {
        check(&c.name, &c.coefficients)?;
        if !c.rhs.is_finite() {
            return Err(SolverError::NonFinite(c.name.clone()));
        }
    }
    Ok(())
}
