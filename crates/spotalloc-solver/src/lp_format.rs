//! Writer for the CPLEX LP text format, readable by most MIP solvers.

use std::io::{self, Write};

use crate::problem::LpProblem;

/// Terms written per line; keeps lines well under the format's length limit
const TERMS_PER_LINE: usize = 8;

/// Write `problem` in CPLEX LP format
pub fn write_lp<W: Write>(problem: &LpProblem, out: &mut W) -> io::Result<()> {
    let names: Vec<String> = problem.variables.iter().map(|v| sanitize(v)).collect();

    writeln!(out, "\\ Problem: {}", sanitize(&problem.name))?;
    writeln!(out, "{}", if problem.objective.minimize { "Minimize" } else { "Maximize" })?;
    write!(out, " obj:")?;
    write_terms(out, &problem.objective.coefficients, &names)?;
    writeln!(out)?;

    writeln!(out, "Subject To")?;
    for (i, c) in problem.constraints.iter().enumerate() {
        let name = if c.name.is_empty() { format!("r_{}", i) } else { sanitize(&c.name) };
        write!(out, " {}:", name)?;
        write_terms(out, &c.coefficients, &names)?;
        writeln!(out, " {} {}", c.op.symbol(), c.rhs)?;
    }

    let binaries: Vec<&String> = names
        .iter()
        .zip(&problem.binary)
        .filter(|(_, b)| **b)
        .map(|(n, _)| n)
        .collect();
    if !binaries.is_empty() {
        writeln!(out, "Binaries")?;
        for chunk in binaries.chunks(TERMS_PER_LINE) {
            let line: Vec<&str> = chunk.iter().map(|s| s.as_str()).collect();
            writeln!(out, " {}", line.join(" "))?;
        }
    }

    writeln!(out, "End")
}

fn write_terms<W: Write>(out: &mut W, coefficients: &[f64], names: &[String]) -> io::Result<()> {
    let mut written = 0;
    for (coef, name) in coefficients.iter().zip(names) {
        if *coef == 0.0 {
            continue;
        }
        if written > 0 && written % TERMS_PER_LINE == 0 {
            write!(out, "\n   ")?;
        }
        let sign = if *coef < 0.0 { "-" } else { "+" };
        if written == 0 && *coef > 0.0 {
            write!(out, " {} {}", coef, name)?;
        } else {
            write!(out, " {} {} {}", sign, coef.abs(), name)?;
        }
        written += 1;
    }
    if written == 0 {
        // The format requires at least one term
        match names.first() {
            Some(name) => write!(out, " 0 {}", name)?,
            None => write!(out, " 0")?,
        }
    }
    Ok(())
}

/// LP-format names may not contain spaces or most punctuation
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || "_.[]".contains(c) { c } else { '_' })
        .collect();
    match cleaned.chars().next() {
        Some(c) if c.is_ascii_digit() || c == '.' => format!("_{}", cleaned),
        Some(_) => cleaned,
        None => "_".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ConstraintOp;

    #[test]
    fn test_write_binary_program() {
        let mut problem = LpProblem::binary(vec!["x_0_0".to_string(), "x_0_1".to_string()]).with_name("bound-revenue");
        problem.set_objective(vec![50.0, 60.0], false);
        problem.add_constraint("airtime_0", vec![10.0, 15.0], ConstraintOp::Le, 30.0);
        problem.add_constraint("floor", vec![50.0, -1.5], ConstraintOp::Ge, 0.001);

        let mut out = Vec::new();
        write_lp(&problem, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("\\ Problem: bound_revenue\n"));
        assert!(text.contains("Maximize\n obj: 50 x_0_0 + 60 x_0_1\n"));
        assert!(text.contains(" airtime_0: 10 x_0_0 + 15 x_0_1 <= 30\n"));
        assert!(text.contains(" floor: 50 x_0_0 - 1.5 x_0_1 >= 0.001\n"));
        assert!(text.contains("Binaries\n x_0_0 x_0_1\n"));
        assert!(text.ends_with("End\n"));
    }

    #[test]
    fn test_empty_objective_still_has_a_term() {
        let problem = LpProblem::new(vec!["a b".to_string()]);
        let mut out = Vec::new();
        write_lp(&problem, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains(" obj: 0 a_b\n"));
        assert!(!text.contains("Binaries"));
    }
}
