//! Binding of builder output into one solvable sub-problem, and the seam to
//! the solver that answers it.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use serde::Serialize;
use spotalloc_solver::{LpProblem, MipSolver, SolutionStatus, SolverError, write_lp};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::instance::Assignment;
use crate::model::{AssignmentVars, ConstraintSet, LinearExpr};

#[derive(Error, Debug)]
pub enum SolveError {
    #[error("Solver failed on sub-problem '{subproblem}': {source}")]
    Failed {
        subproblem: String,
        #[source]
        source: SolverError,
    },
}

/// One single-objective problem: a fresh composition of constraints and an
/// objective over the run's shared assignment columns
#[derive(Debug, Clone)]
pub struct Subproblem<'a> {
    name: String,
    problem: LpProblem,
    vars: &'a AssignmentVars,
}

impl<'a> Subproblem<'a> {
    pub fn compose(
        name: impl Into<String>,
        vars: &'a AssignmentVars,
        constraints: &ConstraintSet,
        objective: &LinearExpr,
    ) -> Self {
        let name = name.into();
        let problem = vars.problem(&name, constraints, objective);
        Self { name, problem, vars }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn problem(&self) -> &LpProblem {
        &self.problem
    }

    pub fn vars(&self) -> &'a AssignmentVars {
        self.vars
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubproblemStatus {
    Optimal,
    /// A limit stopped the search; the assignment is the best incumbent
    FeasibleNonOptimal,
    Infeasible,
    Unbounded,
}

impl SubproblemStatus {
    pub fn has_solution(self) -> bool {
        matches!(self, SubproblemStatus::Optimal | SubproblemStatus::FeasibleNonOptimal)
    }
}

impl fmt::Display for SubproblemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SubproblemStatus::Optimal => "optimal",
            SubproblemStatus::FeasibleNonOptimal => "feasible (not proven optimal)",
            SubproblemStatus::Infeasible => "infeasible",
            SubproblemStatus::Unbounded => "unbounded",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubproblemResult {
    pub status: SubproblemStatus,
    /// Objective value; `None` unless the status carries a solution
    pub objective_value: Option<f64>,
    pub assignment: Option<Assignment>,
}

impl SubproblemResult {
    pub fn infeasible() -> Self {
        Self {
            status: SubproblemStatus::Infeasible,
            objective_value: None,
            assignment: None,
        }
    }

    pub fn solved(status: SubproblemStatus, objective_value: f64, assignment: Assignment) -> Self {
        Self {
            status,
            objective_value: Some(objective_value),
            assignment: Some(assignment),
        }
    }
}

/// Capability to answer sub-problems. Infeasible and unbounded outcomes are
/// statuses; only a failure of the solver itself is an error.
pub trait SubproblemSolver {
    fn solve(&mut self, subproblem: &Subproblem<'_>) -> Result<SubproblemResult, SolveError>;
}

impl<S: SubproblemSolver + ?Sized> SubproblemSolver for &mut S {
    fn solve(&mut self, subproblem: &Subproblem<'_>) -> Result<SubproblemResult, SolveError> {
        (**self).solve(subproblem)
    }
}

impl<S: SubproblemSolver + ?Sized> SubproblemSolver for Box<S> {
    fn solve(&mut self, subproblem: &Subproblem<'_>) -> Result<SubproblemResult, SolveError> {
        (**self).solve(subproblem)
    }
}

/// Destination for the debug export of each bound sub-problem
pub trait ModelSink {
    fn export(&self, subproblem: &Subproblem<'_>) -> io::Result<()>;
}

/// Discards every model
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExport;

impl ModelSink for NoExport {
    fn export(&self, _subproblem: &Subproblem<'_>) -> io::Result<()> {
        Ok(())
    }
}

/// Writes `<dir>/<sub-problem name>.lp` in CPLEX LP format
#[derive(Debug, Clone)]
pub struct LpFileSink {
    dir: PathBuf,
}

impl LpFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, subproblem: &Subproblem<'_>) -> PathBuf {
        self.dir.join(format!("{}.lp", subproblem.name()))
    }
}

impl ModelSink for LpFileSink {
    fn export(&self, subproblem: &Subproblem<'_>) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(subproblem);
        let mut out = BufWriter::new(File::create(&path)?);
        write_lp(subproblem.problem(), &mut out)?;
        out.flush()?;
        debug!(path = %path.display(), "exported model");
        Ok(())
    }
}

/// [`SubproblemSolver`] backed by HiGHS
pub struct MilpSolver {
    mip: MipSolver,
    sink: Box<dyn ModelSink>,
}

impl MilpSolver {
    pub fn new(mip: MipSolver) -> Self {
        Self {
            mip,
            sink: Box::new(NoExport),
        }
    }

    /// Single-threaded solver with the configured time and node limits,
    /// exporting models when `export_dir` is set. Called once per run.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mip = MipSolver::new()
            .with_time_limit(config.time_limit())
            .with_max_nodes(config.max_nodes)
            .with_threads(config.threads);
        let solver = Self::new(mip);
        match &config.export_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "exporting sub-problem models");
                solver.with_sink(LpFileSink::new(dir))
            }
            None => {
                info!("model export disabled; set export_dir to write one .lp file per sub-problem");
                solver
            }
        }
    }

    pub fn with_sink(mut self, sink: impl ModelSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }
}

impl SubproblemSolver for MilpSolver {
    fn solve(&mut self, subproblem: &Subproblem<'_>) -> Result<SubproblemResult, SolveError> {
        if let Err(e) = self.sink.export(subproblem) {
            warn!(subproblem = subproblem.name(), error = %e, "could not export model");
        }

        let solution = self.mip.solve(subproblem.problem()).map_err(|source| SolveError::Failed {
            subproblem: subproblem.name().to_string(),
            source,
        })?;
        debug!(
            subproblem = subproblem.name(),
            status = ?solution.status,
            "sub-problem solved"
        );

        let status = match solution.status {
            SolutionStatus::Optimal => SubproblemStatus::Optimal,
            SolutionStatus::Feasible => SubproblemStatus::FeasibleNonOptimal,
            SolutionStatus::Infeasible => return Ok(SubproblemResult::infeasible()),
            SolutionStatus::Unbounded => {
                return Ok(SubproblemResult {
                    status: SubproblemStatus::Unbounded,
                    objective_value: None,
                    assignment: None,
                });
            }
        };

        let assignment = subproblem.vars().read_assignment(&solution.values);
        Ok(SubproblemResult::solved(status, solution.objective_value, assignment))
    }
}
