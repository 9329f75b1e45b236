use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {what}: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid {what} record {index}: {source}")]
    Record {
        what: &'static str,
        index: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} must be a JSON array or an object keyed by index")]
    NotACollection(&'static str),
    #[error("{what} key '{key}' is not a valid index")]
    InvalidIndex { what: &'static str, key: String },
    #[error("{what} indices must run from 0 to {last} without gaps (index {missing} is missing)")]
    MissingIndex {
        what: &'static str,
        last: usize,
        missing: usize,
    },
    #[error("{what} at position {position} has id {id}")]
    IdMismatch {
        what: &'static str,
        position: usize,
        id: usize,
    },
    #[error("Break {break_id}: invalid prime indicator '{value}'")]
    InvalidPrime { break_id: usize, value: String },
    #[error("Break {break_id} has no price for slot '{slot}'")]
    MissingPriceSlot { break_id: usize, slot: String },
    #[error("Break {break_id} has no reach value for audience '{audience}' of brand {brand_id}")]
    UnresolvedReach {
        break_id: usize,
        brand_id: usize,
        audience: String,
    },
    #[error("{field} of {what} {index} must be finite and non-negative (got {value})")]
    InvalidQuantity {
        what: &'static str,
        index: usize,
        field: &'static str,
        value: f64,
    },
    #[error("{matrix} matrix is {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    Shape {
        matrix: &'static str,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
    #[error("Instance has no {0}")]
    Empty(&'static str),
}

/// A commercial break with finite remaining airtime
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommercialBreak {
    pub id: usize,
    pub remaining_time: f64,
    pub prime: bool,
}

/// An advertiser competing for break capacity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Brand {
    pub id: usize,
    /// Competitive category; two brands of the same kind may not share a break
    #[serde(rename = "type")]
    pub kind: String,
    /// Audience segment used to look up reach values
    pub audience: String,
    /// Airtime consumed per placement
    pub format_time: f64,
    pub grp_cap: f64,
    pub budget_cap: f64,
    /// Share of prime-time placements the brand asks for. Not used by the engine.
    pub prime_ratio: f64,
}

impl CommercialBreak {
    pub fn new(id: usize, remaining_time: f64, prime: bool) -> Self {
        Self { id, remaining_time, prime }
    }
}

impl Brand {
    pub fn new(id: usize, kind: impl Into<String>, format_time: f64, budget_cap: f64) -> Self {
        Self {
            id,
            kind: kind.into(),
            audience: String::new(),
            format_time,
            grp_cap: 0.0,
            budget_cap,
            prime_ratio: 0.0,
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Whether both brands compete for the same category
    pub fn competes_with(&self, other: &Brand) -> bool {
        self.id != other.id && self.kind == other.kind
    }
}

/// Validated allocation instance: breaks, brands and the derived cost and
/// reach matrices, indexed `[break][brand]`. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    breaks: Vec<CommercialBreak>,
    brands: Vec<Brand>,
    cost: Vec<Vec<i64>>,
    grp: Vec<Vec<f64>>,
}

impl Instance {
    pub fn new(
        breaks: Vec<CommercialBreak>,
        brands: Vec<Brand>,
        cost: Vec<Vec<i64>>,
        grp: Vec<Vec<f64>>,
    ) -> Result<Self, DataError> {
        if breaks.is_empty() {
            return Err(DataError::Empty("breaks"));
        }
        if brands.is_empty() {
            return Err(DataError::Empty("brands"));
        }

        for (position, b) in breaks.iter().enumerate() {
            if b.id != position {
                return Err(DataError::IdMismatch { what: "break", position, id: b.id });
            }
            check_quantity("break", position, "remaining_time", b.remaining_time)?;
        }
        for (position, b) in brands.iter().enumerate() {
            if b.id != position {
                return Err(DataError::IdMismatch { what: "brand", position, id: b.id });
            }
            check_quantity("brand", position, "format", b.format_time)?;
            check_quantity("brand", position, "budget", b.budget_cap)?;
            check_quantity("brand", position, "cost_grp", b.grp_cap)?;
            if !b.prime_ratio.is_finite() {
                return Err(DataError::InvalidQuantity {
                    what: "brand",
                    index: position,
                    field: "ratio_prime",
                    value: b.prime_ratio,
                });
            }
        }

        check_shape("cost", &cost, breaks.len(), brands.len())?;
        check_shape("grp", &grp, breaks.len(), brands.len())?;
        for (i, row) in cost.iter().enumerate() {
            if let Some(&price) = row.iter().find(|&&p| p < 0) {
                return Err(DataError::InvalidQuantity {
                    what: "break",
                    index: i,
                    field: "price",
                    value: price as f64,
                });
            }
        }
        for (i, row) in grp.iter().enumerate() {
            for &value in row {
                check_quantity("break", i, "grp", value)?;
            }
        }

        Ok(Self { breaks, brands, cost, grp })
    }

    pub fn breaks(&self) -> &[CommercialBreak] {
        &self.breaks
    }

    pub fn brands(&self) -> &[Brand] {
        &self.brands
    }

    pub fn num_breaks(&self) -> usize {
        self.breaks.len()
    }

    pub fn num_brands(&self) -> usize {
        self.brands.len()
    }

    pub fn cost(&self, break_id: usize, brand_id: usize) -> i64 {
        self.cost[break_id][brand_id]
    }

    pub fn grp(&self, break_id: usize, brand_id: usize) -> f64 {
        self.grp[break_id][brand_id]
    }

    /// Revenue earned when the brand occupies the break: unit price times airtime
    pub fn revenue_coefficient(&self, break_id: usize, brand_id: usize) -> f64 {
        self.cost[break_id][brand_id] as f64 * self.brands[brand_id].format_time
    }

    /// Unordered pairs `(j1, j2)`, `j1 < j2`, of competing brands
    pub fn competitive_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (j1, a) in self.brands.iter().enumerate() {
            for b in &self.brands[j1 + 1..] {
                if a.competes_with(b) {
                    pairs.push((j1, b.id));
                }
            }
        }
        pairs
    }

    pub fn revenue(&self, assignment: &Assignment) -> f64 {
        assignment
            .selected()
            .map(|(i, j)| self.revenue_coefficient(i, j))
            .sum()
    }

    pub fn reach(&self, assignment: &Assignment) -> f64 {
        assignment.selected().map(|(i, j)| self.grp[i][j]).sum()
    }

    pub fn airtime_used(&self, assignment: &Assignment, break_id: usize) -> f64 {
        (0..self.num_brands())
            .filter(|&j| assignment.is_selected(break_id, j))
            .map(|j| self.brands[j].format_time)
            .sum()
    }

    pub fn spend(&self, assignment: &Assignment, brand_id: usize) -> f64 {
        (0..self.num_breaks())
            .filter(|&i| assignment.is_selected(i, brand_id))
            .map(|i| self.revenue_coefficient(i, brand_id))
            .sum()
    }

    /// Airtime, budget and exclusivity limits broken by `assignment`
    pub fn audit(&self, assignment: &Assignment, tolerance: f64) -> Vec<Violation> {
        let mut violations = Vec::new();

        if assignment.num_breaks() != self.num_breaks() || assignment.num_brands() != self.num_brands() {
            violations.push(Violation::Shape {
                breaks: assignment.num_breaks(),
                brands: assignment.num_brands(),
            });
            return violations;
        }

        for b in &self.breaks {
            let used = self.airtime_used(assignment, b.id);
            if used > b.remaining_time + tolerance {
                violations.push(Violation::Airtime {
                    break_id: b.id,
                    used,
                    capacity: b.remaining_time,
                });
            }
        }

        for brand in &self.brands {
            let spend = self.spend(assignment, brand.id);
            if spend > brand.budget_cap + tolerance {
                violations.push(Violation::Budget {
                    brand_id: brand.id,
                    spend,
                    budget: brand.budget_cap,
                });
            }
        }

        let pairs = self.competitive_pairs();
        for i in 0..self.num_breaks() {
            for &(j1, j2) in &pairs {
                if assignment.is_selected(i, j1) && assignment.is_selected(i, j2) {
                    violations.push(Violation::Exclusivity {
                        break_id: i,
                        brands: (j1, j2),
                    });
                }
            }
        }

        violations
    }
}

fn check_quantity(what: &'static str, index: usize, field: &'static str, value: f64) -> Result<(), DataError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DataError::InvalidQuantity { what, index, field, value })
    }
}

fn check_shape<T>(matrix: &'static str, rows: &[Vec<T>], expected_rows: usize, expected_cols: usize) -> Result<(), DataError> {
    let bad_row = rows.iter().find(|r| r.len() != expected_cols);
    if rows.len() != expected_rows || bad_row.is_some() {
        return Err(DataError::Shape {
            matrix,
            rows: rows.len(),
            cols: bad_row.or(rows.first()).map_or(0, |r| r.len()),
            expected_rows,
            expected_cols,
        });
    }
    Ok(())
}

/// A 0/1 placement grid, `[break][brand]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Assignment {
    cells: Vec<Vec<bool>>,
}

impl Assignment {
    pub fn empty(n_breaks: usize, n_brands: usize) -> Self {
        Self {
            cells: vec![vec![false; n_brands]; n_breaks],
        }
    }

    pub fn from_rows(cells: Vec<Vec<bool>>) -> Self {
        Self { cells }
    }

    pub fn num_breaks(&self) -> usize {
        self.cells.len()
    }

    pub fn num_brands(&self) -> usize {
        self.cells.first().map_or(0, |row| row.len())
    }

    pub fn is_selected(&self, break_id: usize, brand_id: usize) -> bool {
        self.cells[break_id][brand_id]
    }

    pub fn set(&mut self, break_id: usize, brand_id: usize, selected: bool) {
        self.cells[break_id][brand_id] = selected;
    }

    pub fn rows(&self) -> &[Vec<bool>] {
        &self.cells
    }

    /// `(break, brand)` positions that are selected, in row-major order
    pub fn selected(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells.iter().enumerate().flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, selected)| **selected)
                .map(move |(j, _)| (i, j))
        })
    }

    pub fn count(&self) -> usize {
        self.selected().count()
    }
}

/// A limit broken by an assignment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "limit", rename_all = "snake_case")]
pub enum Violation {
    Airtime { break_id: usize, used: f64, capacity: f64 },
    Budget { brand_id: usize, spend: f64, budget: f64 },
    Exclusivity { break_id: usize, brands: (usize, usize) },
    Shape { breaks: usize, brands: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Airtime { break_id, used, capacity } => {
                write!(f, "break {} uses {:.2} of {:.2} airtime", break_id, used, capacity)
            }
            Violation::Budget { brand_id, spend, budget } => {
                write!(f, "brand {} spends {:.2} of a {:.2} budget", brand_id, spend, budget)
            }
            Violation::Exclusivity { break_id, brands: (a, b) } => {
                write!(f, "competing brands {} and {} share break {}", a, b, break_id)
            }
            Violation::Shape { breaks, brands } => {
                write!(f, "assignment grid is {}x{}", breaks, brands)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two breaks (30 and 20 units), two brands of different types:
    /// format 10 at unit cost 5 and format 15 at unit cost 4.
    pub(crate) fn two_by_two() -> Instance {
        let breaks = vec![CommercialBreak::new(0, 30.0, true), CommercialBreak::new(1, 20.0, false)];
        let brands = vec![
            Brand::new(0, "soda", 10.0, 1000.0).with_audience("adults"),
            Brand::new(1, "cars", 15.0, 1000.0).with_audience("men"),
        ];
        let cost = vec![vec![5, 4], vec![5, 4]];
        let grp = vec![vec![10.0, 1.0], vec![10.0, 1.0]];
        Instance::new(breaks, brands, cost, grp).unwrap()
    }

    /// One break, two brands of the same type
    pub(crate) fn same_type_pair() -> Instance {
        let breaks = vec![CommercialBreak::new(0, 100.0, false)];
        let brands = vec![
            Brand::new(0, "soda", 10.0, 500.0),
            Brand::new(1, "soda", 20.0, 500.0),
        ];
        let cost = vec![vec![3, 2]];
        let grp = vec![vec![5.0, 1.0]];
        Instance::new(breaks, brands, cost, grp).unwrap()
    }

    #[test]
    fn test_revenue_and_reach() {
        let instance = two_by_two();
        let mut assignment = Assignment::empty(2, 2);
        assignment.set(0, 0, true);
        assignment.set(0, 1, true);
        assignment.set(1, 1, true);

        assert_eq!(instance.revenue_coefficient(0, 0), 50.0);
        assert_eq!(instance.revenue_coefficient(0, 1), 60.0);
        assert_eq!(instance.revenue(&assignment), 170.0);
        assert_eq!(instance.reach(&assignment), 12.0);
        assert_eq!(instance.airtime_used(&assignment, 0), 25.0);
        assert_eq!(instance.spend(&assignment, 1), 120.0);
        assert!(instance.audit(&assignment, 1e-9).is_empty());
    }

    #[test]
    fn test_audit_reports_each_limit() {
        let instance = same_type_pair();
        let assignment = Assignment::from_rows(vec![vec![true, true]]);
        let violations = instance.audit(&assignment, 1e-9);
        assert_eq!(
            violations,
            vec![Violation::Exclusivity { break_id: 0, brands: (0, 1) }]
        );

        let instance = two_by_two();
        let assignment = Assignment::from_rows(vec![vec![true, true], vec![true, true]]);
        let violations = instance.audit(&assignment, 1e-9);
        assert_eq!(
            violations,
            vec![Violation::Airtime { break_id: 1, used: 25.0, capacity: 20.0 }]
        );
        assert_eq!(violations[0].to_string(), "break 1 uses 25.00 of 20.00 airtime");
    }

    #[test]
    fn test_budget_violation() {
        let breaks = vec![CommercialBreak::new(0, 100.0, false), CommercialBreak::new(1, 100.0, false)];
        let brands = vec![Brand::new(0, "soda", 10.0, 150.0)];
        let instance = Instance::new(breaks, brands, vec![vec![10], vec![10]], vec![vec![1.0], vec![1.0]]).unwrap();

        let assignment = Assignment::from_rows(vec![vec![true], vec![true]]);
        let violations = instance.audit(&assignment, 1e-9);

        assert_eq!(
            violations,
            vec![Violation::Budget { brand_id: 0, spend: 200.0, budget: 150.0 }]
        );
    }

    #[test]
    fn test_competitive_pairs() {
        let breaks = vec![CommercialBreak::new(0, 10.0, false)];
        let brands = vec![
            Brand::new(0, "soda", 1.0, 1.0),
            Brand::new(1, "cars", 1.0, 1.0),
            Brand::new(2, "soda", 1.0, 1.0),
            Brand::new(3, "soda", 1.0, 1.0),
        ];
        let instance = Instance::new(breaks, brands, vec![vec![1; 4]], vec![vec![0.0; 4]]).unwrap();

        assert_eq!(instance.competitive_pairs(), vec![(0, 2), (0, 3), (2, 3)]);
    }

    #[test]
    fn test_rejects_invalid_data() {
        let breaks = vec![CommercialBreak::new(0, -1.0, false)];
        let brands = vec![Brand::new(0, "soda", 1.0, 1.0)];
        let err = Instance::new(breaks, brands.clone(), vec![vec![1]], vec![vec![1.0]]).unwrap_err();
        assert!(matches!(err, DataError::InvalidQuantity { field: "remaining_time", .. }));

        let breaks = vec![CommercialBreak::new(0, 10.0, false)];
        let err = Instance::new(breaks.clone(), brands.clone(), vec![vec![1, 2]], vec![vec![1.0]]).unwrap_err();
        assert!(matches!(err, DataError::Shape { matrix: "cost", .. }));

        let err = Instance::new(breaks.clone(), brands.clone(), vec![vec![1]], vec![vec![f64::NAN]]).unwrap_err();
        assert!(matches!(err, DataError::InvalidQuantity { field: "grp", .. }));

        let err = Instance::new(breaks, Vec::new(), Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, DataError::Empty("brands")));
    }
}
