//! Console rendering of engine results.

use std::io::{self, Write};

use spotalloc_engine::{Assignment, EngineOutcome, Instance, PhaseReport};

pub fn write_outcome<W: Write>(out: &mut W, instance: &Instance, outcome: &EngineOutcome) -> io::Result<()> {
    for report in &outcome.phases {
        write_phase(out, report)?;
        writeln!(out)?;
    }

    writeln!(out, "Frontier:")?;
    for (index, point) in outcome.frontier.points().iter().enumerate() {
        writeln!(out, "  {} : {:.2}  (reach {:.2})", index, point.revenue, point.reach)?;
    }
    write!(out, "Max revenue: {:.2}", outcome.max_revenue)?;
    if !outcome.max_revenue_proven {
        write!(out, " (not proven optimal)")?;
    }
    writeln!(out)?;
    writeln!(out, "Termination: {}", outcome.termination)?;
    writeln!(
        out,
        "Instance: {} breaks, {} brands",
        instance.num_breaks(),
        instance.num_brands()
    )
}

fn write_phase<W: Write>(out: &mut W, report: &PhaseReport) -> io::Result<()> {
    match report.floor {
        Some(floor) => writeln!(out, "== {} (maximize {}, revenue > {:.2}) ==", report.phase, report.objective, floor)?,
        None => writeln!(out, "== {} (maximize {}) ==", report.phase, report.objective)?,
    }
    writeln!(out, "Status: {}", report.status)?;

    if let Some(value) = report.objective_value {
        writeln!(out, "Objective: {:.2}", value)?;
    }
    if let (Some(revenue), Some(reach)) = (report.revenue, report.reach) {
        writeln!(out, "Revenue: {:.2}  Reach: {:.2}", revenue, reach)?;
    }
    if let Some(assignment) = &report.assignment {
        write_grid(out, assignment)?;
    }
    Ok(())
}

/// The full break x brand 0/1 grid
fn write_grid<W: Write>(out: &mut W, assignment: &Assignment) -> io::Result<()> {
    write!(out, "{:>10}", "")?;
    for j in 0..assignment.num_brands() {
        write!(out, " {:>4}", format!("b{}", j))?;
    }
    writeln!(out)?;

    for (i, row) in assignment.rows().iter().enumerate() {
        write!(out, "{:>10}", format!("break {}", i))?;
        for &selected in row {
            write!(out, " {:>4}", u8::from(selected))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_check<W: Write>(out: &mut W, instance: &Instance) -> io::Result<()> {
    let prime = instance.breaks().iter().filter(|b| b.prime).count();
    writeln!(out, "Breaks: {} ({} prime)", instance.num_breaks(), prime)?;
    writeln!(out, "Brands: {}", instance.num_brands())?;
    writeln!(out, "Competitive pairs: {}", instance.competitive_pairs().len())?;
    writeln!(out, "Variables: {}", instance.num_breaks() * instance.num_brands())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotalloc_engine::{Brand, CommercialBreak, EngineConfig, EpsilonConstraintEngine, MilpSolver};

    fn instance() -> Instance {
        let breaks = vec![CommercialBreak::new(0, 30.0, true), CommercialBreak::new(1, 20.0, false)];
        let brands = vec![Brand::new(0, "soda", 10.0, 1000.0), Brand::new(1, "cars", 15.0, 1000.0)];
        Instance::new(breaks, brands, vec![vec![5, 4], vec![5, 4]], vec![vec![10.0, 1.0], vec![10.0, 1.0]]).unwrap()
    }

    #[test]
    fn test_outcome_report() {
        let instance = instance();
        let config = EngineConfig::default();
        let outcome = EpsilonConstraintEngine::new(&instance, MilpSolver::from_config(&config), &config)
            .run()
            .unwrap();

        let mut out = Vec::new();
        write_outcome(&mut out, &instance, &outcome).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("== BoundRevenue (maximize revenue) ==\nStatus: optimal\nObjective: 170.00\n"));
        assert!(text.contains("== Scan #1 (maximize reach, revenue > 160.00) =="));
        assert!(text.contains("   break 0    1    1\n"));
        assert!(text.contains("Frontier:\n  0 : 160.00  (reach 21.00)\n  1 : 170.00  (reach 12.00)\n"));
        assert!(text.contains("Max revenue: 170.00\n"));
        assert!(text.contains("Termination: reached max revenue\n"));
    }

    #[test]
    fn test_check_report() {
        let mut out = Vec::new();
        write_check(&mut out, &instance()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "Breaks: 2 (1 prime)\nBrands: 2\nCompetitive pairs: 0\nVariables: 4\n"
        );
    }
}
