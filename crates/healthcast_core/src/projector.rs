//! Trajectory projection for a single test
//!
//! A simulated observation is produced in four steps from an observed
//! baseline:
//! 1. invert the measurement model to estimate the true value
//! 2. in the improvement scenario, apply an instantaneous year-one gain
//! 3. age the value forward, splitting the horizon at the acceleration age
//! 4. apply the practice effect if the horizon is the configured year,
//!    then re-apply measurement noise
//!
//! Steps 2-4 are exposed separately as [`Projector::project_from_true`] so a
//! draw can share one de-noised baseline across both horizons.

use rand::Rng;

use crate::config::{ForecastModel, ImprovementModel};
use crate::model::{Direction, Magnitude, Scenario, TestDefinition, TestId};
use crate::shock::{RateDraw, lognormal_sigma_from_cv, standard_normal};

/// Sampled decline rates for one test along with its acceleration age
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeclinePath {
    pub base: f64,
    /// Falls back to `base` when unset
    pub post: Option<f64>,
    pub accelerate_from_age: Option<f64>,
}

impl DeclinePath {
    /// Age `value` by `years` starting at `age`
    #[must_use]
    pub fn apply(&self, def: &TestDefinition, value: f64, age: f64, years: f64) -> f64 {
        if years <= 0.0 {
            return value;
        }
        let (before, after) = match self.accelerate_from_age {
            Some(accel) if age < accel => {
                let before = years.min(accel - age);
                (before, years - before)
            }
            Some(_) => (0.0, years),
            None => (years, 0.0),
        };

        let mut value = value;
        if before > 0.0 {
            value = decline_segment(def, value, self.base, before);
        }
        if after > 0.0 {
            value = decline_segment(def, value, self.post.unwrap_or(self.base), after);
        }
        value
    }
}

/// Move `value` toward "worse" at a per-decade `rate` for `years`
fn decline_segment(def: &TestDefinition, value: f64, rate: f64, years: f64) -> f64 {
    let decades = years / 10.0;
    match def.magnitude {
        Magnitude::Absolute => {
            let amount = rate * decades;
            match def.direction {
                Direction::HigherIsBetter => value - amount,
                Direction::LowerIsBetter => value + amount,
            }
        }
        Magnitude::Relative => {
            // A negative value has to grow in magnitude to get worse
            let factor = match (def.direction, value >= 0.0) {
                (Direction::HigherIsBetter, true) | (Direction::LowerIsBetter, false) => 1.0 - rate,
                (Direction::HigherIsBetter, false) | (Direction::LowerIsBetter, true) => 1.0 + rate,
            };
            value * factor.powf(decades)
        }
    }
}

/// Move `value` toward "better" by an improvement fraction or amount
#[must_use]
pub fn apply_improvement(def: &TestDefinition, value: f64, improvement: f64) -> f64 {
    match def.magnitude {
        Magnitude::Absolute => match def.direction {
            Direction::HigherIsBetter => value + improvement,
            Direction::LowerIsBetter => value - improvement,
        },
        Magnitude::Relative => {
            let factor = match (def.direction, value >= 0.0) {
                (Direction::HigherIsBetter, true) | (Direction::LowerIsBetter, false) => {
                    1.0 + improvement
                }
                (Direction::HigherIsBetter, false) | (Direction::LowerIsBetter, true) => {
                    1.0 - improvement
                }
            };
            value * factor
        }
    }
}

/// One-time familiarity bump; always upward regardless of direction
#[must_use]
pub fn apply_practice(def: &TestDefinition, value: f64, amount: f64) -> f64 {
    match def.magnitude {
        Magnitude::Absolute => value + amount,
        Magnitude::Relative if value >= 0.0 => value * (1.0 + amount),
        Magnitude::Relative => value * (1.0 - amount),
    }
}

/// Projects single tests through the measurement and aging models
#[derive(Debug, Clone, Copy)]
pub struct Projector<'a> {
    model: &'a ForecastModel,
}

impl<'a> Projector<'a> {
    #[must_use]
    pub fn new(model: &'a ForecastModel) -> Self {
        Self { model }
    }

    /// Estimate the true value behind an observed baseline
    pub fn denoise<R: Rng + ?Sized>(&self, rng: &mut R, test: TestId, observed: f64) -> f64 {
        let def = self.model.definition(test);
        let noise = self.model.params(test).noise;
        if noise.lognormal {
            if observed <= 0.0 {
                return 0.0;
            }
            let sigma = lognormal_sigma_from_cv(noise.cv);
            return observed / (sigma * standard_normal(rng)).exp();
        }
        let sigma = observed.abs() * noise.cv;
        def.clamp_observation(observed - sigma * standard_normal(rng))
    }

    /// Simulated observation of a true value
    pub fn renoise<R: Rng + ?Sized>(&self, rng: &mut R, test: TestId, true_value: f64) -> f64 {
        let def = self.model.definition(test);
        let noise = self.model.params(test).noise;
        if noise.lognormal {
            if true_value <= 0.0 {
                return 0.0;
            }
            let sigma = lognormal_sigma_from_cv(noise.cv);
            return true_value * (sigma * standard_normal(rng)).exp();
        }
        let sigma = true_value.abs() * noise.cv;
        def.clamp_observation(true_value + sigma * standard_normal(rng))
    }

    /// Instantaneous improvement for one test. Tests with no improvement
    /// model return 0 without consuming randomness.
    pub fn improvement_fraction<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        test: TestId,
        age: Option<f64>,
    ) -> f64 {
        match self.model.params(test).improvement {
            ImprovementModel::None => 0.0,
            ImprovementModel::Uniform { low, high } => uniform(rng, low, high),
            ImprovementModel::AgeSplit {
                cutoff,
                under,
                over,
            } => {
                let (low, high) = match age {
                    Some(age) if age >= cutoff => over,
                    _ => under,
                };
                uniform(rng, low, high)
            }
            ImprovementModel::LogNormalQuantiles {
                mu,
                sigma,
                min,
                max,
            } => (mu + sigma * standard_normal(rng)).exp().clamp(min, max),
        }
    }

    /// True value at `horizon_years` from a true baseline, before re-noise.
    ///
    /// An unknown age is treated as 0. In the improvement scenario the gain
    /// takes year one and aging covers the remaining `horizon_years - 1`.
    #[allow(clippy::too_many_arguments)]
    pub fn project_from_true<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        test: TestId,
        true_value: f64,
        age: Option<f64>,
        horizon_years: u32,
        scenario: Scenario,
        rates: &RateDraw,
    ) -> f64 {
        let def = self.model.definition(test);
        let params = self.model.params(test);
        let path = DeclinePath {
            base: rates.base(test),
            post: rates.post(test),
            accelerate_from_age: params.rate.accelerate_from_age,
        };
        let start_age = age.unwrap_or(0.0);
        let years = f64::from(horizon_years);

        let mut value = match scenario {
            Scenario::Decline => path.apply(def, true_value, start_age, years),
            Scenario::Improvement => {
                let gain = self.improvement_fraction(rng, test, age);
                let improved = apply_improvement(def, true_value, gain);
                path.apply(def, improved, start_age + 1.0, years - 1.0)
            }
        };

        if params.practice
            && let Some(practice) = self.model.practice
            && practice.year == horizon_years
        {
            value = apply_practice(def, value, practice.amount);
        }
        value
    }

    /// Full observed-to-observed projection for one draw
    #[allow(clippy::too_many_arguments)]
    pub fn project<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        test: TestId,
        observed: f64,
        age: Option<f64>,
        horizon_years: u32,
        scenario: Scenario,
        rates: &RateDraw,
    ) -> f64 {
        let true_value = self.denoise(rng, test, observed);
        let projected =
            self.project_from_true(rng, test, true_value, age, horizon_years, scenario, rates);
        self.renoise(rng, test, projected)
    }
}

#[inline]
fn uniform<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    low + (high - low) * rng.random::<f64>()
}
