pub mod config;
pub mod engine;
pub mod frontier;
pub mod instance;
pub mod loader;
pub mod model;
pub mod subproblem;

pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineError, EngineOutcome, EpsilonConstraintEngine, Phase, PhaseReport, Termination};
pub use frontier::{Frontier, FrontierPoint};
pub use instance::{Assignment, Brand, CommercialBreak, DataError, Instance, Violation};
pub use loader::InstanceLoader;
pub use model::{
    AssignmentVars, ConstraintBuilder, ConstraintKind, ConstraintSet, LinearConstraint, LinearExpr,
    ObjectiveBuilder, ObjectiveKind, RevenueFloor,
};
pub use subproblem::{
    LpFileSink, MilpSolver, ModelSink, NoExport, SolveError, Subproblem, SubproblemResult,
    SubproblemSolver, SubproblemStatus,
};
