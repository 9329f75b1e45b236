use std::fmt;

use serde::Serialize;
use spotalloc_solver::{ConstraintOp, LpProblem};

use crate::instance::{Assignment, Instance};

/// Column layout of the binary assignment matrix `x[break][brand]`.
///
/// Created once per run; every sub-problem is composed over the same layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentVars {
    n_breaks: usize,
    n_brands: usize,
    names: Vec<String>,
}

impl AssignmentVars {
    pub fn new(n_breaks: usize, n_brands: usize) -> Self {
        let names = (0..n_breaks)
            .flat_map(|i| (0..n_brands).map(move |j| format!("x_{}_{}", i, j)))
            .collect();
        Self { n_breaks, n_brands, names }
    }

    pub fn for_instance(instance: &Instance) -> Self {
        Self::new(instance.num_breaks(), instance.num_brands())
    }

    pub fn num_breaks(&self) -> usize {
        self.n_breaks
    }

    pub fn num_brands(&self) -> usize {
        self.n_brands
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, break_id: usize, brand_id: usize) -> usize {
        break_id * self.n_brands + brand_id
    }

    /// Compose a fresh maximization problem from a constraint set and objective
    pub fn problem(&self, name: &str, constraints: &ConstraintSet, objective: &LinearExpr) -> LpProblem {
        let mut problem = LpProblem::binary(self.names.clone()).with_name(name);
        problem.set_objective(objective.to_dense(self.len()), false);
        for c in constraints.iter() {
            problem.add_constraint(c.name.clone(), c.expr.to_dense(self.len()), c.op, c.rhs);
        }
        problem
    }

    /// Read a 0/1 grid back from solver values
    pub fn read_assignment(&self, values: &[f64]) -> Assignment {
        let mut assignment = Assignment::empty(self.n_breaks, self.n_brands);
        for i in 0..self.n_breaks {
            for j in 0..self.n_brands {
                if values.get(self.column(i, j)).is_some_and(|&v| v > 0.5) {
                    assignment.set(i, j, true);
                }
            }
        }
        assignment
    }
}

/// Sparse linear expression over assignment columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(usize, f64)>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&mut self, column: usize, coefficient: f64) {
        if coefficient != 0.0 {
            self.terms.push((column, coefficient));
        }
    }

    pub fn terms(&self) -> &[(usize, f64)] {
        &self.terms
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(col, coef)| coef * values[col]).sum()
    }

    pub fn to_dense(&self, n: usize) -> Vec<f64> {
        let mut dense = vec![0.0; n];
        for &(col, coef) in &self.terms {
            dense[col] += coef;
        }
        dense
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Budget,
    Airtime,
    Exclusivity,
    RevenueFloor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub name: String,
    pub kind: ConstraintKind,
    pub expr: LinearExpr,
    pub op: ConstraintOp,
    pub rhs: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    constraints: Vec<LinearConstraint>,
}

impl ConstraintSet {
    pub fn push(&mut self, constraint: LinearConstraint) {
        self.constraints.push(constraint);
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinearConstraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn count(&self, kind: ConstraintKind) -> usize {
        self.constraints.iter().filter(|c| c.kind == kind).count()
    }

    pub fn revenue_floor(&self) -> Option<&LinearConstraint> {
        self.constraints.iter().find(|c| c.kind == ConstraintKind::RevenueFloor)
    }
}

/// Lower bound imposed on total revenue
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RevenueFloor {
    /// Revenue strictly positive; excludes the empty allocation
    Positive,
    /// Revenue strictly above the given threshold
    Above(f64),
}

impl RevenueFloor {
    pub fn threshold(self) -> f64 {
        match self {
            RevenueFloor::Positive => 0.0,
            RevenueFloor::Above(value) => value,
        }
    }
}

pub const DEFAULT_STRICT_MARGIN: f64 = 1e-3;

/// Builds the budget, airtime and exclusivity rows (plus an optional
/// revenue floor) over the shared assignment columns.
pub struct ConstraintBuilder<'a> {
    instance: &'a Instance,
    vars: &'a AssignmentVars,
    /// `revenue > floor` is posed as `revenue >= floor + strict_margin`
    strict_margin: f64,
}

impl<'a> ConstraintBuilder<'a> {
    pub fn new(instance: &'a Instance, vars: &'a AssignmentVars) -> Self {
        Self {
            instance,
            vars,
            strict_margin: DEFAULT_STRICT_MARGIN,
        }
    }

    pub fn with_strict_margin(mut self, margin: f64) -> Self {
        self.strict_margin = margin;
        self
    }

    pub fn build(&self, floor: Option<RevenueFloor>) -> ConstraintSet {
        let mut set = ConstraintSet::default();

        for j in 0..self.instance.num_brands() {
            set.push(self.budget(j));
        }
        for i in 0..self.instance.num_breaks() {
            set.push(self.airtime(i));
        }
        let pairs = self.instance.competitive_pairs();
        for i in 0..self.instance.num_breaks() {
            for &(j1, j2) in &pairs {
                set.push(self.exclusivity(i, j1, j2));
            }
        }
        if let Some(floor) = floor {
            set.push(self.revenue_floor(floor));
        }

        set
    }

    /// Spend of brand `j` within its budget
    fn budget(&self, j: usize) -> LinearConstraint {
        let mut expr = LinearExpr::new();
        for i in 0..self.instance.num_breaks() {
            expr.add_term(self.vars.column(i, j), self.instance.revenue_coefficient(i, j));
        }
        LinearConstraint {
            name: format!("budget_{}", j),
            kind: ConstraintKind::Budget,
            expr,
            op: ConstraintOp::Le,
            rhs: self.instance.brands()[j].budget_cap,
        }
    }

    /// Airtime placed in break `i` within its remaining time
    fn airtime(&self, i: usize) -> LinearConstraint {
        let mut expr = LinearExpr::new();
        for (j, brand) in self.instance.brands().iter().enumerate() {
            expr.add_term(self.vars.column(i, j), brand.format_time);
        }
        LinearConstraint {
            name: format!("airtime_{}", i),
            kind: ConstraintKind::Airtime,
            expr,
            op: ConstraintOp::Le,
            rhs: self.instance.breaks()[i].remaining_time,
        }
    }

    /// At most one of two competing brands in break `i`
    fn exclusivity(&self, i: usize, j1: usize, j2: usize) -> LinearConstraint {
        let mut expr = LinearExpr::new();
        expr.add_term(self.vars.column(i, j1), 1.0);
        expr.add_term(self.vars.column(i, j2), 1.0);
        LinearConstraint {
            name: format!("excl_{}_{}_{}", i, j1, j2),
            kind: ConstraintKind::Exclusivity,
            expr,
            op: ConstraintOp::Le,
            rhs: 1.0,
        }
    }

    fn revenue_floor(&self, floor: RevenueFloor) -> LinearConstraint {
        LinearConstraint {
            name: "revenue_floor".to_string(),
            kind: ConstraintKind::RevenueFloor,
            expr: revenue_expr(self.instance, self.vars),
            op: ConstraintOp::Ge,
            rhs: floor.threshold() + self.strict_margin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Broadcaster revenue: sum of price times airtime
    Revenue,
    /// Audience reach (GRP)
    Reach,
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveKind::Revenue => write!(f, "revenue"),
            ObjectiveKind::Reach => write!(f, "reach"),
        }
    }
}

/// Builds the (always maximized) objective expressions
pub struct ObjectiveBuilder<'a> {
    instance: &'a Instance,
    vars: &'a AssignmentVars,
}

impl<'a> ObjectiveBuilder<'a> {
    pub fn new(instance: &'a Instance, vars: &'a AssignmentVars) -> Self {
        Self { instance, vars }
    }

    pub fn build(&self, kind: ObjectiveKind) -> LinearExpr {
        match kind {
            ObjectiveKind::Revenue => revenue_expr(self.instance, self.vars),
            ObjectiveKind::Reach => {
                let mut expr = LinearExpr::new();
                for i in 0..self.instance.num_breaks() {
                    for j in 0..self.instance.num_brands() {
                        expr.add_term(self.vars.column(i, j), self.instance.grp(i, j));
                    }
                }
                expr
            }
        }
    }
}

fn revenue_expr(instance: &Instance, vars: &AssignmentVars) -> LinearExpr {
    let mut expr = LinearExpr::new();
    for i in 0..instance.num_breaks() {
        for j in 0..instance.num_brands() {
            expr.add_term(vars.column(i, j), instance.revenue_coefficient(i, j));
        }
    }
    expr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::{same_type_pair, two_by_two};

    #[test]
    fn test_constraint_counts() {
        let instance = two_by_two();
        let vars = AssignmentVars::for_instance(&instance);
        let set = ConstraintBuilder::new(&instance, &vars).build(None);

        assert_eq!(set.count(ConstraintKind::Budget), 2);
        assert_eq!(set.count(ConstraintKind::Airtime), 2);
        assert_eq!(set.count(ConstraintKind::Exclusivity), 0);
        assert!(set.revenue_floor().is_none());

        let instance = same_type_pair();
        let vars = AssignmentVars::for_instance(&instance);
        let set = ConstraintBuilder::new(&instance, &vars).build(Some(RevenueFloor::Positive));

        assert_eq!(set.count(ConstraintKind::Exclusivity), 1);
        assert_eq!(set.len(), 2 + 1 + 1 + 1);
    }

    #[test]
    fn test_rows_match_instance() {
        let instance = two_by_two();
        let vars = AssignmentVars::for_instance(&instance);
        let set = ConstraintBuilder::new(&instance, &vars).build(None);

        let budget = set.iter().find(|c| c.name == "budget_1").unwrap();
        assert_eq!(budget.expr.to_dense(vars.len()), vec![0.0, 60.0, 0.0, 60.0]);
        assert_eq!(budget.rhs, 1000.0);

        let airtime = set.iter().find(|c| c.name == "airtime_1").unwrap();
        assert_eq!(airtime.expr.to_dense(vars.len()), vec![0.0, 0.0, 10.0, 15.0]);
        assert_eq!(airtime.op, ConstraintOp::Le);
        assert_eq!(airtime.rhs, 20.0);
    }

    #[test]
    fn test_exclusivity_is_linear_pair_sum() {
        let instance = same_type_pair();
        let vars = AssignmentVars::for_instance(&instance);
        let set = ConstraintBuilder::new(&instance, &vars).build(None);

        let row = set.iter().find(|c| c.kind == ConstraintKind::Exclusivity).unwrap();
        assert_eq!(row.expr.terms(), &[(0, 1.0), (1, 1.0)]);
        assert_eq!(row.rhs, 1.0);
    }

    #[test]
    fn test_revenue_floor_is_strict() {
        let instance = two_by_two();
        let vars = AssignmentVars::for_instance(&instance);
        let set = ConstraintBuilder::new(&instance, &vars)
            .with_strict_margin(0.5)
            .build(Some(RevenueFloor::Above(110.0)));

        let floor = set.revenue_floor().unwrap();
        assert_eq!(floor.op, ConstraintOp::Ge);
        assert_eq!(floor.rhs, 110.5);
        assert_eq!(floor.expr.to_dense(vars.len()), vec![50.0, 60.0, 50.0, 60.0]);
    }

    #[test]
    fn test_objectives() {
        let instance = two_by_two();
        let vars = AssignmentVars::for_instance(&instance);
        let objectives = ObjectiveBuilder::new(&instance, &vars);
        let all = vec![1.0; vars.len()];

        assert_eq!(objectives.build(ObjectiveKind::Revenue).evaluate(&all), 220.0);
        assert_eq!(objectives.build(ObjectiveKind::Reach).evaluate(&all), 22.0);
    }

    #[test]
    fn test_problem_composition_and_readback() {
        let instance = two_by_two();
        let vars = AssignmentVars::for_instance(&instance);
        let set = ConstraintBuilder::new(&instance, &vars).build(Some(RevenueFloor::Positive));
        let objective = ObjectiveBuilder::new(&instance, &vars).build(ObjectiveKind::Reach);

        let problem = vars.problem("bound-reach", &set, &objective);
        assert_eq!(problem.name, "bound-reach");
        assert_eq!(problem.num_variables(), 4);
        assert_eq!(problem.num_binaries(), 4);
        assert_eq!(problem.num_constraints(), set.len());
        assert!(!problem.objective.minimize);

        let assignment = vars.read_assignment(&[1.0, 0.0, 0.0, 0.9999]);
        assert!(assignment.is_selected(0, 0));
        assert!(assignment.is_selected(1, 1));
        assert_eq!(assignment.count(), 2);
    }
}
