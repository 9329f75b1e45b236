/// Represents a linear program whose variables may be restricted to {0, 1}
#[derive(Debug, Clone)]
pub struct LpProblem {
    /// Problem name, used when exporting
    pub name: String,
    /// Variable names
    pub variables: Vec<String>,
    /// Which variables are binary (same length as `variables`)
    pub binary: Vec<bool>,
    /// Objective function coefficients
    pub objective: Objective,
    /// Constraints
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone)]
pub struct Objective {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Whether to minimize or maximize
    pub minimize: bool,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics and export)
    pub name: String,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl ConstraintOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ConstraintOp::Le => "<=",
            ConstraintOp::Ge => ">=",
            ConstraintOp::Eq => "=",
        }
    }

    /// Whether `lhs op rhs` holds within `tolerance`
    pub fn holds(self, lhs: f64, rhs: f64, tolerance: f64) -> bool {
        match self {
            ConstraintOp::Le => lhs <= rhs + tolerance,
            ConstraintOp::Ge => lhs >= rhs - tolerance,
            ConstraintOp::Eq => (lhs - rhs).abs() <= tolerance,
        }
    }
}

impl Constraint {
    /// Left-hand side activity of this row for the given variable values
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(coef, value)| coef * value)
            .sum()
    }
}

impl LpProblem {
    pub fn new(variables: Vec<String>) -> Self {
        let n = variables.len();
        Self {
            name: String::from("problem"),
            variables,
            binary: vec![false; n],
            objective: Objective {
                coefficients: vec![0.0; n],
                minimize: true,
            },
            constraints: Vec::new(),
        }
    }

    /// Create a problem in which every variable is binary
    pub fn binary(variables: Vec<String>) -> Self {
        let mut problem = Self::new(variables);
        problem.binary.iter_mut().for_each(|b| *b = true);
        problem
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_objective(&mut self, coefficients: Vec<f64>, minimize: bool) {
        self.objective = Objective { coefficients, minimize };
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, coefficients: Vec<f64>, op: ConstraintOp, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            coefficients,
            op,
            rhs,
        });
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn num_binaries(&self) -> usize {
        self.binary.iter().filter(|&&b| b).count()
    }

    /// Objective value of the given variable values
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .coefficients
            .iter()
            .zip(values)
            .map(|(coef, value)| coef * value)
            .sum()
    }

    /// Whether `values` satisfies every constraint, non-negativity and binary
    /// bounds. Row tolerances scale with the magnitude of the right-hand side.
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        if values.len() != self.num_variables() {
            return false;
        }
        let bounds_ok = values.iter().zip(&self.binary).all(|(&v, &is_binary)| {
            v >= -tolerance && (!is_binary || v <= 1.0 + tolerance)
        });
        bounds_ok
            && self
                .constraints
                .iter()
                .all(|c| c.op.holds(c.activity(values), c.rhs, tolerance * (1.0 + c.rhs.abs())))
    }
}
