//! Forecast Builder
//!
//! Fluent construction of [`ForecastConfig`] documents, mainly for tests and
//! benchmarks. Each test is described once and the builder fans the settings
//! out into the per-field maps of the document.
//!
//! ```ignore
//! let model = ForecastBuilder::new()
//!     .test("VO2 max", |t| t.higher_is_better().base_rate(0.10).post_rate(0.15, 65.0))
//!     .test("Working Memory", |t| t.higher_is_better().absolute().base_rate(0.25))
//!     .practice_effect(5, 0.03, &["Working Memory"])
//!     .n_sim(500)
//!     .build()?;
//! ```

use super::{ForecastConfig, ForecastModel};
use crate::config::LabelRule;
use crate::error::ConfigError;
use crate::model::Direction;

/// Settings for a single test
#[derive(Debug, Clone)]
pub struct TestBuilder {
    name: String,
    direction: Direction,
    absolute: bool,
    allow_negative: bool,
    base_rate: f64,
    post_rate: Option<(f64, f64)>,
    rate_cv: f64,
    rate_lognormal: bool,
    noise_cv: f64,
    noise_lognormal: bool,
    improvement: Option<(f64, f64)>,
}

impl TestBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: Direction::HigherIsBetter,
            absolute: false,
            allow_negative: false,
            base_rate: 0.0,
            post_rate: None,
            rate_cv: 0.0,
            rate_lognormal: false,
            noise_cv: 0.0,
            noise_lognormal: false,
            improvement: None,
        }
    }

    #[must_use]
    pub fn higher_is_better(mut self) -> Self {
        self.direction = Direction::HigherIsBetter;
        self
    }

    #[must_use]
    pub fn lower_is_better(mut self) -> Self {
        self.direction = Direction::LowerIsBetter;
        self
    }

    /// Additive per-decade decline instead of a compounding fraction
    #[must_use]
    pub fn absolute(mut self) -> Self {
        self.absolute = true;
        self
    }

    #[must_use]
    pub fn allow_negative(mut self) -> Self {
        self.allow_negative = true;
        self
    }

    #[must_use]
    pub fn base_rate(mut self, rate: f64) -> Self {
        self.base_rate = rate;
        self
    }

    /// Rate that applies from `from_age` onward
    #[must_use]
    pub fn post_rate(mut self, rate: f64, from_age: f64) -> Self {
        self.post_rate = Some((rate, from_age));
        self
    }

    #[must_use]
    pub fn rate_cv(mut self, cv: f64) -> Self {
        self.rate_cv = cv;
        self
    }

    #[must_use]
    pub fn lognormal_rate(mut self) -> Self {
        self.rate_lognormal = true;
        self
    }

    #[must_use]
    pub fn noise_cv(mut self, cv: f64) -> Self {
        self.noise_cv = cv;
        self
    }

    #[must_use]
    pub fn lognormal_noise(mut self) -> Self {
        self.noise_lognormal = true;
        self
    }

    /// Uniform improvement fraction range
    #[must_use]
    pub fn improvement(mut self, low: f64, high: f64) -> Self {
        self.improvement = Some((low, high));
        self
    }
}

/// Builder for assumptions documents
#[derive(Debug, Clone, Default)]
pub struct ForecastBuilder {
    config: ForecastConfig,
    negative: Vec<String>,
}

impl ForecastBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a test at the end of `tests_order`
    #[must_use]
    pub fn test(mut self, name: &str, configure: impl FnOnce(TestBuilder) -> TestBuilder) -> Self {
        let t = configure(TestBuilder::new(name));
        let cfg = &mut self.config;
        cfg.tests_order.push(t.name.clone());
        match t.direction {
            Direction::HigherIsBetter => cfg.higher_is_better.push(t.name.clone()),
            Direction::LowerIsBetter => cfg.lower_is_better.push(t.name.clone()),
        }
        if t.absolute {
            cfg.absolute_decline_tests.push(t.name.clone());
        }
        if t.allow_negative {
            self.negative.push(t.name.clone());
        }
        cfg.decline
            .base_rate_per_decade
            .insert(t.name.clone(), t.base_rate);
        if let Some((rate, age)) = t.post_rate {
            cfg.decline
                .post_rate_per_decade
                .insert(t.name.clone(), Some(rate));
            cfg.decline
                .accelerate_from_age
                .insert(t.name.clone(), Some(age));
        }
        cfg.rate_uncertainty_cv.insert(t.name.clone(), t.rate_cv);
        if t.rate_lognormal {
            cfg.rate_lognormal.push(t.name.clone());
        }
        cfg.measurement_cv.insert(t.name.clone(), t.noise_cv);
        if t.noise_lognormal {
            cfg.measurement_lognormal.push(t.name.clone());
        }
        if let Some(range) = t.improvement {
            cfg.improvement.ranges.insert(t.name.clone(), range);
        }
        self
    }

    #[must_use]
    pub fn correlate(mut self, a: &str, b: &str, correlation: f64) -> Self {
        let tests = &mut self.config.correlations.tests;
        for name in [a, b] {
            if !tests.iter().any(|t| t == name) {
                tests.push(name.to_string());
            }
        }
        self.config
            .correlations
            .pairs
            .push((a.to_string(), b.to_string(), correlation));
        self
    }

    #[must_use]
    pub fn practice_effect(mut self, year: u32, amount: f64, tests: &[&str]) -> Self {
        let practice = &mut self.config.practice_effect;
        practice.enabled = true;
        practice.year = Some(year);
        practice.percent = amount;
        practice.tests = tests.iter().map(|t| (*t).to_string()).collect();
        self
    }

    #[must_use]
    pub fn sanity_check(mut self, tolerance_abs: f64, tolerance_rel: f64) -> Self {
        let sanity = &mut self.config.sanity_check;
        sanity.enabled = true;
        sanity.tolerance_abs = tolerance_abs;
        sanity.tolerance_rel = tolerance_rel;
        self
    }

    #[must_use]
    pub fn labels(mut self, rules: Vec<LabelRule>) -> Self {
        self.config.labels = Some(rules);
        self
    }

    #[must_use]
    pub fn n_sim(mut self, n_sim: u32) -> Self {
        self.config.n_sim = Some(n_sim);
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// The assembled document, unvalidated
    #[must_use]
    pub fn into_config(self) -> ForecastConfig {
        let mut config = self.config;
        // Tests built without `allow_negative` may not go below zero
        config.allow_negative_tests = Some(self.negative);
        config
    }

    pub fn build(self) -> Result<ForecastModel, ConfigError> {
        self.into_config().resolve()
    }
}
