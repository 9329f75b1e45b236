use serde::Serialize;

/// A revenue threshold reached by the scan and the best reach found at it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrontierPoint {
    pub revenue: f64,
    pub reach: f64,
}

/// Ordered, append-only list of the points discovered in one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Frontier {
    points: Vec<FrontierPoint>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, point: FrontierPoint) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[FrontierPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn revenues(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.revenue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_keep_discovery_order() {
        let mut frontier = Frontier::new();
        assert!(frontier.is_empty());

        frontier.push(FrontierPoint { revenue: 100.0, reach: 9.0 });
        frontier.push(FrontierPoint { revenue: 120.0, reach: 7.0 });

        assert_eq!(frontier.len(), 2);
        assert_eq!(frontier.revenues().collect::<Vec<_>>(), vec![100.0, 120.0]);
        assert_eq!(
            serde_json::to_string(&frontier).unwrap(),
            r#"[{"revenue":100.0,"reach":9.0},{"revenue":120.0,"reach":7.0}]"#
        );
    }
}
