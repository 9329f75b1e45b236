//! Epsilon-constraint iteration: bound revenue, bound reach, then scan
//! revenue floors upward while maximizing reach.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::frontier::{Frontier, FrontierPoint};
use crate::instance::{Assignment, Instance, Violation};
use crate::model::{AssignmentVars, ConstraintBuilder, ObjectiveBuilder, ObjectiveKind, RevenueFloor};
use crate::subproblem::{SolveError, Subproblem, SubproblemSolver, SubproblemStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    BoundRevenue,
    BoundReach,
    /// Scan iteration, numbered from 1
    Scan(usize),
}

impl Phase {
    /// File stem of the exported model for this phase
    pub fn artifact_name(self) -> String {
        match self {
            Phase::BoundRevenue => "bound-revenue".to_string(),
            Phase::BoundReach => "bound-reach".to_string(),
            Phase::Scan(n) => format!("scan-{:04}", n),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::BoundRevenue => write!(f, "BoundRevenue"),
            Phase::BoundReach => write!(f, "BoundReach"),
            Phase::Scan(n) => write!(f, "Scan #{}", n),
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{phase}: {source}")]
    Solve {
        phase: Phase,
        #[source]
        source: SolveError,
    },
    #[error("{phase}: sub-problem is {status}, no bound can be established")]
    NoBound { phase: Phase, status: SubproblemStatus },
    #[error("{phase}: sub-problem is unbounded")]
    Unbounded { phase: Phase },
    #[error("{phase}: solver returned an assignment with {count} violation(s), first: {first}")]
    InvalidAssignment {
        phase: Phase,
        count: usize,
        first: Violation,
    },
    #[error("{phase}: revenue {revenue} does not exceed the floor {floor}")]
    Stalled { phase: Phase, floor: f64, revenue: f64 },
}

/// What one phase solved and what came back
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub objective: ObjectiveKind,
    /// Revenue the assignment had to exceed, if any
    pub floor: Option<f64>,
    pub status: SubproblemStatus,
    pub objective_value: Option<f64>,
    /// Revenue and reach recomputed from the instance
    pub revenue: Option<f64>,
    pub reach: Option<f64>,
    pub assignment: Option<Assignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// The revenue floor caught up with the maximum revenue
    ReachedMaxRevenue,
    /// No assignment earns more than `floor`
    Infeasible { floor: f64 },
    IterationLimit { iterations: usize },
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::ReachedMaxRevenue => write!(f, "reached max revenue"),
            Termination::Infeasible { floor } => write!(f, "no allocation earns more than {}", floor),
            Termination::IterationLimit { iterations } => {
                write!(f, "stopped after {} scan iterations", iterations)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineOutcome {
    pub max_revenue: f64,
    /// False when the revenue bound came from a time- or node-limited solve
    pub max_revenue_proven: bool,
    pub frontier: Frontier,
    pub phases: Vec<PhaseReport>,
    pub termination: Termination,
}

/// Values carried from one phase to the next
struct EngineState {
    max_revenue: f64,
    max_revenue_proven: bool,
    current_epsilon: f64,
    frontier: Frontier,
    phases: Vec<PhaseReport>,
    iterations: usize,
}

pub struct EpsilonConstraintEngine<'a, S> {
    instance: &'a Instance,
    solver: S,
    vars: AssignmentVars,
    strict_margin: f64,
    tolerance: f64,
    max_scan_iterations: usize,
}

impl<'a, S: SubproblemSolver> EpsilonConstraintEngine<'a, S> {
    pub fn new(instance: &'a Instance, solver: S, config: &EngineConfig) -> Self {
        Self {
            instance,
            solver,
            vars: AssignmentVars::for_instance(instance),
            strict_margin: config.strict_margin,
            tolerance: config.tolerance,
            max_scan_iterations: config.max_scan_iterations,
        }
    }

    pub fn run(mut self) -> Result<EngineOutcome, EngineError> {
        let mut state = self.bound()?;

        let termination = loop {
            if self.reached(&state) {
                break Termination::ReachedMaxRevenue;
            }
            if state.iterations >= self.max_scan_iterations {
                warn!(iterations = state.iterations, "scan iteration limit reached");
                break Termination::IterationLimit {
                    iterations: state.iterations,
                };
            }
            if let Some(stop) = self.scan_step(&mut state)? {
                break stop;
            }
        };

        info!(
            points = state.frontier.len(),
            max_revenue = state.max_revenue,
            %termination,
            "epsilon-constraint run finished"
        );
        Ok(EngineOutcome {
            max_revenue: state.max_revenue,
            max_revenue_proven: state.max_revenue_proven,
            frontier: state.frontier,
            phases: state.phases,
            termination,
        })
    }

    fn reached(&self, state: &EngineState) -> bool {
        state.current_epsilon >= state.max_revenue - self.tolerance
    }

    /// BoundRevenue then BoundReach; seeds the frontier
    fn bound(&mut self) -> Result<EngineState, EngineError> {
        let revenue = self.solve_phase(Phase::BoundRevenue, ObjectiveKind::Revenue, None)?;
        let max_revenue = match (revenue.status, revenue.objective_value) {
            (status, Some(value)) if status.has_solution() => value,
            (status, _) => {
                return Err(EngineError::NoBound {
                    phase: Phase::BoundRevenue,
                    status,
                });
            }
        };
        let max_revenue_proven = revenue.status == SubproblemStatus::Optimal;
        if !max_revenue_proven {
            warn!(max_revenue, "revenue bound is not proven optimal");
        }
        info!(max_revenue, "revenue bound established");

        let reach = self.solve_phase(Phase::BoundReach, ObjectiveKind::Reach, Some(RevenueFloor::Positive))?;
        let (achieved, reach_value) = match (reach.status, reach.revenue, reach.reach) {
            (status, Some(achieved), Some(value)) if status.has_solution() => (achieved, value),
            (status, _, _) => {
                return Err(EngineError::NoBound {
                    phase: Phase::BoundReach,
                    status,
                });
            }
        };
        info!(revenue = achieved, reach = reach_value, "reach bound established");

        let mut frontier = Frontier::new();
        frontier.push(FrontierPoint {
            revenue: achieved,
            reach: reach_value,
        });

        Ok(EngineState {
            max_revenue,
            max_revenue_proven,
            current_epsilon: achieved,
            frontier,
            phases: vec![revenue, reach],
            iterations: 0,
        })
    }

    /// One scan iteration; returns the termination reason when the scan ends
    fn scan_step(&mut self, state: &mut EngineState) -> Result<Option<Termination>, EngineError> {
        state.iterations += 1;
        let phase = Phase::Scan(state.iterations);
        let floor = state.current_epsilon;

        let report = self.solve_phase(phase, ObjectiveKind::Reach, Some(RevenueFloor::Above(floor)))?;
        let status = report.status;
        let point = report.revenue.zip(report.reach);
        state.phases.push(report);

        match status {
            SubproblemStatus::Infeasible => {
                info!(%phase, floor, "no allocation above the floor");
                Ok(Some(Termination::Infeasible { floor }))
            }
            SubproblemStatus::Unbounded => Err(EngineError::Unbounded { phase }),
            SubproblemStatus::Optimal | SubproblemStatus::FeasibleNonOptimal => {
                let Some((revenue, reach)) = point else {
                    return Err(EngineError::NoBound { phase, status });
                };
                if revenue <= floor {
                    return Err(EngineError::Stalled { phase, floor, revenue });
                }
                info!(%phase, revenue, reach, "frontier point");
                state.current_epsilon = revenue;
                state.frontier.push(FrontierPoint { revenue, reach });
                Ok(None)
            }
        }
    }

    /// Compose a fresh sub-problem for `phase`, solve it and check the answer
    fn solve_phase(
        &mut self,
        phase: Phase,
        objective: ObjectiveKind,
        floor: Option<RevenueFloor>,
    ) -> Result<PhaseReport, EngineError> {
        let constraints = ConstraintBuilder::new(self.instance, &self.vars)
            .with_strict_margin(self.strict_margin)
            .build(floor);
        let expr = ObjectiveBuilder::new(self.instance, &self.vars).build(objective);
        let subproblem = Subproblem::compose(phase.artifact_name(), &self.vars, &constraints, &expr);
        debug!(%phase, rows = constraints.len(), "solving sub-problem");

        let result = self
            .solver
            .solve(&subproblem)
            .map_err(|source| EngineError::Solve { phase, source })?;

        let mut report = PhaseReport {
            phase,
            objective,
            floor: floor.map(RevenueFloor::threshold),
            status: result.status,
            objective_value: result.objective_value,
            revenue: None,
            reach: None,
            assignment: None,
        };

        if result.status.has_solution() {
            if let Some(assignment) = result.assignment {
                let violations = self.instance.audit(&assignment, self.tolerance);
                if let Some(first) = violations.first() {
                    return Err(EngineError::InvalidAssignment {
                        phase,
                        count: violations.len(),
                        first: first.clone(),
                    });
                }
                report.revenue = Some(self.instance.revenue(&assignment));
                report.reach = Some(self.instance.reach(&assignment));
                report.assignment = Some(assignment);
            }
        }

        info!(
            %phase,
            %objective,
            status = %report.status,
            objective_value = ?report.objective_value,
            "phase solved"
        );
        Ok(report)
    }
}
