//! Validation of the assumptions document into a `TestId`-indexed model

use std::collections::HashSet;

use rustc_hash::FxHashMap;

use super::labels::{LabelTable, default_label_rules};
use super::{
    DEFAULT_NEGATIVE_TESTS, ForecastConfig, HOMA_IR, HomaReductionConfig, ImprovementConfig,
    VO2_MAX,
};
use crate::error::ConfigError;
use crate::model::{Direction, Magnitude, TestDefinition, TestId};

/// Decade decline rate distribution for one test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateModel {
    /// Mean rate before the acceleration age
    pub base: f64,
    /// Mean rate from the acceleration age on; the base rate applies if unset
    pub post: Option<f64>,
    pub accelerate_from_age: Option<f64>,
    /// Coefficient of variation of the sampled rate
    pub cv: f64,
    pub lognormal: bool,
}

/// Measurement error on a single observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseModel {
    pub cv: f64,
    /// Multiplicative log-normal noise when set, additive normal otherwise
    pub lognormal: bool,
}

/// Instantaneous improvement fraction drawn in the improvement scenario
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImprovementModel {
    None,
    Uniform {
        low: f64,
        high: f64,
    },
    /// Separate ranges below and at-or-above a cutoff age. Unknown ages use
    /// the `under` range.
    AgeSplit {
        cutoff: f64,
        under: (f64, f64),
        over: (f64, f64),
    },
    /// `exp(N(ln median, sigma))` with sigma fitted to the 10th and 90th
    /// percentiles, clamped to `[min, max]`
    LogNormalQuantiles {
        mu: f64,
        sigma: f64,
        min: f64,
        max: f64,
    },
}

/// Practice-effect settings shared by all affected tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PracticeEffect {
    /// Horizon (in years) at which the bump applies
    pub year: u32,
    pub amount: f64,
}

/// Everything the sampler and projector need for one test
#[derive(Debug, Clone, PartialEq)]
pub struct TestParams {
    pub rate: RateModel,
    pub noise: NoiseModel,
    pub improvement: ImprovementModel,
    pub practice: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SanitySettings {
    pub enabled: bool,
    pub tolerance_abs: f64,
    pub tolerance_rel: f64,
    /// Indexed by `TestId`
    pub plausible_ranges: Vec<Option<(f64, f64)>>,
}

impl SanitySettings {
    /// Largest deviation tolerated against `baseline`
    #[must_use]
    pub fn tolerance(&self, baseline: f64) -> f64 {
        self.tolerance_abs.max(self.tolerance_rel * baseline.abs())
    }
}

/// The resolved, immutable forecast model
#[derive(Debug, Clone)]
pub struct ForecastModel {
    tests: Vec<TestDefinition>,
    params: Vec<TestParams>,
    index: FxHashMap<String, TestId>,
    /// Correlated test names, in matrix order
    pub correlation_tests: Vec<String>,
    /// Validated `(a, b, correlation)` with indices into `correlation_tests`
    pub correlation_pairs: Vec<(usize, usize, f64)>,
    pub practice: Option<PracticeEffect>,
    pub n_sim: u32,
    pub seed: u64,
    pub sanity: SanitySettings,
    pub labels: LabelTable,
}

// 10th/90th percentile of the standard normal
const Z90: f64 = 1.281_551_565_544_600_4;

impl ForecastConfig {
    /// Validate the document and index it by `TestId`
    pub fn resolve(&self) -> Result<ForecastModel, ConfigError> {
        ForecastModel::from_config(self)
    }
}

impl ForecastModel {
    pub fn from_config(cfg: &ForecastConfig) -> Result<Self, ConfigError> {
        if cfg.tests_order.is_empty() {
            return Err(ConfigError::MissingField("tests_order"));
        }
        if cfg.tests_order.len() > usize::from(u16::MAX) {
            return Err(ConfigError::InvalidParameter {
                kind: "test count",
                test: String::new(),
                value: cfg.tests_order.len() as f64,
                reason: "too many tests",
            });
        }

        let mut index = FxHashMap::default();
        for (i, name) in cfg.tests_order.iter().enumerate() {
            if index.insert(name.clone(), TestId(i as u16)).is_some() {
                return Err(ConfigError::DuplicateTest(name.clone(), "tests_order"));
            }
        }

        let higher = name_set(&cfg.higher_is_better);
        let lower = name_set(&cfg.lower_is_better);
        let absolute = name_set(&cfg.absolute_decline_tests);
        let rate_lognormal = name_set(&cfg.rate_lognormal);
        let noise_lognormal = name_set(&cfg.measurement_lognormal);
        let practice_tests = name_set(&cfg.practice_effect.tests);
        let allow_negative: HashSet<&str> = match &cfg.allow_negative_tests {
            Some(names) => name_set(names),
            None => cfg
                .cognitive_tests
                .iter()
                .map(String::as_str)
                .chain(DEFAULT_NEGATIVE_TESTS.iter().copied())
                .collect(),
        };

        let mut tests = Vec::with_capacity(cfg.tests_order.len());
        let mut params = Vec::with_capacity(cfg.tests_order.len());
        for name in &cfg.tests_order {
            let direction = match (higher.contains(name.as_str()), lower.contains(name.as_str())) {
                (true, false) => Direction::HigherIsBetter,
                (false, true) => Direction::LowerIsBetter,
                _ => return Err(ConfigError::AmbiguousDirection(name.clone())),
            };
            let magnitude = if absolute.contains(name.as_str()) {
                Magnitude::Absolute
            } else {
                Magnitude::Relative
            };
            tests.push(TestDefinition {
                name: name.clone(),
                direction,
                magnitude,
                allow_negative: allow_negative.contains(name.as_str()),
            });

            let rate = RateModel {
                base: non_negative(
                    "base_rate_per_decade",
                    name,
                    required(
                        &cfg.decline.base_rate_per_decade,
                        "decline.base_rate_per_decade",
                        name,
                    )?,
                )?,
                post: cfg
                    .decline
                    .post_rate_per_decade
                    .get(name)
                    .copied()
                    .flatten()
                    .map(|v| non_negative("post_rate_per_decade", name, v))
                    .transpose()?,
                accelerate_from_age: cfg
                    .decline
                    .accelerate_from_age
                    .get(name)
                    .copied()
                    .flatten()
                    .map(|v| finite("accelerate_from_age", name, v))
                    .transpose()?,
                cv: non_negative(
                    "rate_uncertainty_cv",
                    name,
                    required(&cfg.rate_uncertainty_cv, "rate_uncertainty_cv", name)?,
                )?,
                lognormal: rate_lognormal.contains(name.as_str()),
            };
            let noise = NoiseModel {
                cv: non_negative(
                    "measurement_cv",
                    name,
                    required(&cfg.measurement_cv, "measurement_cv", name)?,
                )?,
                lognormal: noise_lognormal.contains(name.as_str()),
            };
            params.push(TestParams {
                rate,
                noise,
                improvement: improvement_model(&cfg.improvement, name)?,
                practice: practice_tests.contains(name.as_str()),
            });
        }

        let (correlation_tests, correlation_pairs) = resolve_correlations(cfg)?;

        let practice = if cfg.practice_effect.enabled {
            let year = cfg
                .practice_effect
                .year
                .ok_or(ConfigError::MissingField("practice_effect.year"))?;
            Some(PracticeEffect {
                year,
                amount: finite("practice_effect.percent", "", cfg.practice_effect.percent)?,
            })
        } else {
            None
        };

        let n_sim = cfg.n_sim.ok_or(ConfigError::MissingField("n_sim"))?;
        if n_sim == 0 {
            return Err(ConfigError::ZeroSimulations);
        }

        let sanity_cfg = &cfg.sanity_check;
        let mut plausible_ranges = vec![None; tests.len()];
        for (name, &(low, high)) in &sanity_cfg.plausible_ranges {
            if let Some(id) = index.get(name) {
                plausible_ranges[id.index()] =
                    Some(ordered_range("plausible_ranges", name, low, high)?);
            }
        }
        let sanity = SanitySettings {
            enabled: sanity_cfg.enabled,
            tolerance_abs: non_negative("tolerance_abs", "", sanity_cfg.tolerance_abs)?,
            tolerance_rel: non_negative("tolerance_rel", "", sanity_cfg.tolerance_rel)?,
            plausible_ranges,
        };

        let labels = match &cfg.labels {
            Some(rules) => LabelTable::compile(rules),
            None => LabelTable::compile(&default_label_rules()),
        };

        Ok(Self {
            tests,
            params,
            index,
            correlation_tests,
            correlation_pairs,
            practice,
            n_sim,
            seed: cfg.seed.unwrap_or(0),
            sanity,
            labels,
        })
    }

    #[must_use]
    pub fn num_tests(&self) -> usize {
        self.tests.len()
    }

    /// Tests in `tests_order`
    #[must_use]
    pub fn tests(&self) -> &[TestDefinition] {
        &self.tests
    }

    pub fn test_ids(&self) -> impl Iterator<Item = TestId> + '_ {
        (0..self.tests.len()).map(|i| TestId(i as u16))
    }

    #[must_use]
    pub fn test_id(&self, name: &str) -> Option<TestId> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn definition(&self, test: TestId) -> &TestDefinition {
        &self.tests[test.index()]
    }

    #[must_use]
    pub fn params(&self, test: TestId) -> &TestParams {
        &self.params[test.index()]
    }

    /// Variant with a different run seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

fn name_set(names: &[String]) -> HashSet<&str> {
    names.iter().map(String::as_str).collect()
}

fn required(
    map: &std::collections::HashMap<String, f64>,
    field: &'static str,
    test: &str,
) -> Result<f64, ConfigError> {
    map.get(test).copied().ok_or_else(|| ConfigError::MissingEntry {
        field,
        test: test.to_string(),
    })
}

fn finite(kind: &'static str, test: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            kind,
            test: test.to_string(),
            value,
            reason: "must be finite",
        })
    }
}

fn non_negative(kind: &'static str, test: &str, value: f64) -> Result<f64, ConfigError> {
    let value = finite(kind, test, value)?;
    if value < 0.0 {
        return Err(ConfigError::InvalidParameter {
            kind,
            test: test.to_string(),
            value,
            reason: "must be non-negative",
        });
    }
    Ok(value)
}

fn ordered_range(
    kind: &'static str,
    test: &str,
    low: f64,
    high: f64,
) -> Result<(f64, f64), ConfigError> {
    let low = finite(kind, test, low)?;
    let high = finite(kind, test, high)?;
    if low > high {
        return Err(ConfigError::InvalidParameter {
            kind,
            test: test.to_string(),
            value: low,
            reason: "low bound exceeds high bound",
        });
    }
    Ok((low, high))
}

fn improvement_model(cfg: &ImprovementConfig, test: &str) -> Result<ImprovementModel, ConfigError> {
    if test == VO2_MAX
        && (cfg.vo2_age_cutoff.is_some() || cfg.vo2_under.is_some() || cfg.vo2_over.is_some())
    {
        let cutoff = cfg
            .vo2_age_cutoff
            .ok_or(ConfigError::MissingField("improvement.vo2_age_cutoff"))?;
        let (ul, uh) = cfg
            .vo2_under
            .ok_or(ConfigError::MissingField("improvement.vo2_under"))?;
        let (ol, oh) = cfg
            .vo2_over
            .ok_or(ConfigError::MissingField("improvement.vo2_over"))?;
        return Ok(ImprovementModel::AgeSplit {
            cutoff: finite("vo2_age_cutoff", test, cutoff)?,
            under: ordered_range("vo2_under", test, ul, uh)?,
            over: ordered_range("vo2_over", test, ol, oh)?,
        });
    }

    if test == HOMA_IR
        && let Some(homa) = &cfg.homa_ir_reduction
    {
        return homa_model(homa, test);
    }

    match cfg.ranges.get(test) {
        Some(&(low, high)) => {
            let (low, high) = ordered_range("improvement range", test, low, high)?;
            Ok(ImprovementModel::Uniform { low, high })
        }
        None => Ok(ImprovementModel::None),
    }
}

fn homa_model(homa: &HomaReductionConfig, test: &str) -> Result<ImprovementModel, ConfigError> {
    let HomaReductionConfig {
        q10, median, q90, ..
    } = *homa;
    if !(q10 > 0.0 && q10 < median && median < q90 && q90.is_finite()) {
        return Err(ConfigError::InvalidParameter {
            kind: "homa_ir_reduction quantiles",
            test: test.to_string(),
            value: median,
            reason: "need 0 < q10 < median < q90",
        });
    }
    let (min, max) = ordered_range(
        "homa_ir_reduction bounds",
        test,
        homa.min.unwrap_or(0.0),
        homa.max.unwrap_or(1.0),
    )?;
    Ok(ImprovementModel::LogNormalQuantiles {
        mu: median.ln(),
        sigma: (q90.ln() - q10.ln()) / (2.0 * Z90),
        min,
        max,
    })
}

type ResolvedCorrelations = (Vec<String>, Vec<(usize, usize, f64)>);

fn resolve_correlations(cfg: &ForecastConfig) -> Result<ResolvedCorrelations, ConfigError> {
    let names = &cfg.correlations.tests;
    let mut slots: FxHashMap<&str, usize> = FxHashMap::default();
    for (i, name) in names.iter().enumerate() {
        if slots.insert(name.as_str(), i).is_some() {
            return Err(ConfigError::DuplicateTest(name.clone(), "correlations.tests"));
        }
    }

    let lookup = |name: &String| {
        slots
            .get(name.as_str())
            .copied()
            .ok_or_else(|| ConfigError::UnknownTest {
                test: name.clone(),
                field: "correlations.pairs",
                within: "correlations.tests",
            })
    };

    let mut pairs = Vec::with_capacity(cfg.correlations.pairs.len());
    for (a, b, value) in &cfg.correlations.pairs {
        let i = lookup(a)?;
        let j = lookup(b)?;
        if !value.is_finite() || value.abs() > 1.0 {
            return Err(ConfigError::InvalidCorrelation {
                a: a.clone(),
                b: b.clone(),
                value: *value,
            });
        }
        pairs.push((i, j, *value));
    }
    Ok((names.clone(), pairs))
}
