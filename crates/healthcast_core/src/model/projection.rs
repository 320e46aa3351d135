//! Per-client projection results and the running sums that produce them

use serde::{Deserialize, Serialize};

use super::ids::TestId;

/// Forecast distances in years, in output column order
pub const HORIZONS: [u32; 2] = [5, 10];

/// Counts of recoverable conditions met while projecting one client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionStats {
    /// Ordered tests the client has no baseline for
    pub missing_baselines: u32,
    /// Tests whose baseline is exactly zero
    pub zero_baselines: u32,
}

impl ProjectionStats {
    pub fn merge(&mut self, other: &ProjectionStats) {
        self.missing_baselines += other.missing_baselines;
        self.zero_baselines += other.zero_baselines;
    }
}

/// Mean simulated observations for one client under one scenario.
///
/// Vectors are indexed by [`TestId`]; `None` marks a test the client did
/// not take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientProjection {
    pub client_index: usize,
    pub mean5: Vec<Option<f64>>,
    pub mean10: Vec<Option<f64>>,
    pub stats: ProjectionStats,
}

impl ClientProjection {
    /// Mean for a test at a horizon from [`HORIZONS`]
    #[must_use]
    pub fn mean(&self, test: TestId, horizon_years: u32) -> Option<f64> {
        let column = match horizon_years {
            5 => &self.mean5,
            10 => &self.mean10,
            _ => return None,
        };
        column.get(test.index()).copied().flatten()
    }
}

/// Running sums of simulated observations across draws.
///
/// One slot per horizon per test. A slot stays `None` until the first
/// observation arrives, so tests the client lacks never produce a mean.
#[derive(Debug, Clone)]
pub struct SimulationAccumulator {
    sums: [Vec<Option<f64>>; 2],
    draws: u32,
}

impl SimulationAccumulator {
    #[must_use]
    pub fn new(num_tests: usize) -> Self {
        Self {
            sums: std::array::from_fn(|_| vec![None; num_tests]),
            draws: 0,
        }
    }

    pub fn add(&mut self, horizon_slot: usize, test: TestId, observation: f64) {
        let slot = &mut self.sums[horizon_slot][test.index()];
        *slot = Some(slot.unwrap_or(0.0) + observation);
    }

    /// Mark one complete draw
    pub fn finish_draw(&mut self) {
        self.draws += 1;
    }

    #[must_use]
    pub fn draws(&self) -> u32 {
        self.draws
    }

    /// Divide every sum by the number of completed draws
    #[must_use]
    pub fn into_projection(self, client_index: usize, stats: ProjectionStats) -> ClientProjection {
        let n = f64::from(self.draws.max(1));
        let [sums5, sums10] = self.sums;
        let mean = |sums: Vec<Option<f64>>| -> Vec<Option<f64>> {
            sums.into_iter().map(|s| s.map(|v| v / n)).collect()
        };
        ClientProjection {
            client_index,
            mean5: mean(sums5),
            mean10: mean(sums10),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_means_only_touched_slots() {
        let mut acc = SimulationAccumulator::new(3);
        for value in [1.0, 2.0, 3.0] {
            acc.add(0, TestId(0), value);
            acc.add(1, TestId(0), value * 10.0);
            acc.add(0, TestId(2), 4.0);
            acc.finish_draw();
        }

        let projection = acc.into_projection(7, ProjectionStats::default());
        assert_eq!(projection.client_index, 7);
        assert_eq!(projection.mean5, vec![Some(2.0), None, Some(4.0)]);
        assert_eq!(projection.mean10, vec![Some(20.0), None, None]);
        assert_eq!(projection.mean(TestId(0), 10), Some(20.0));
        assert_eq!(projection.mean(TestId(0), 7), None);
    }
}
