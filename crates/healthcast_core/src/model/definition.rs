use serde::{Deserialize, Serialize};

/// Which way is "better" for a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

impl Direction {
    #[must_use]
    pub fn higher_is_better(self) -> bool {
        matches!(self, Direction::HigherIsBetter)
    }
}

/// How decline and improvement magnitudes are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Magnitude {
    /// Fraction of the current value, compounded per decade (physical tests)
    Relative,
    /// Additive amount per decade, e.g. z-score units for cognitive tests
    Absolute,
}

/// Static description of one physiological test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub name: String,
    pub direction: Direction,
    pub magnitude: Magnitude,
    /// Whether observations below zero are physically meaningful
    pub allow_negative: bool,
}

impl TestDefinition {
    /// Clamp a value to zero unless the test permits negatives
    #[inline]
    #[must_use]
    pub fn clamp_observation(&self, value: f64) -> f64 {
        if !self.allow_negative && value < 0.0 {
            0.0
        } else {
            value
        }
    }
}
