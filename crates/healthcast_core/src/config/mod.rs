//! Forecast configuration
//!
//! [`ForecastConfig`] is the assumptions document as written by hand: test
//! names everywhere, optional sections, per-test maps. It is loaded once and
//! resolved into a [`ForecastModel`], the validated, `TestId`-indexed form the
//! simulation reads from.
//!
//! # Builder DSL
//!
//! ```ignore
//! use healthcast_core::config::ForecastBuilder;
//!
//! let model = ForecastBuilder::new()
//!     .test("VO2 max", |t| t.higher_is_better().base_rate(0.10).rate_cv(0.2).noise_cv(0.05))
//!     .test("HbA1c", |t| t.lower_is_better().base_rate(0.03).noise_cv(0.02))
//!     .correlate("VO2 max", "HbA1c", -0.3)
//!     .n_sim(1000)
//!     .seed(42)
//!     .build()?;
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod builder;
pub mod labels;
mod resolve;

pub use builder::{ForecastBuilder, TestBuilder};
pub use labels::{LabelRule, LabelTable, default_label_rules};
pub use resolve::{
    ForecastModel, ImprovementModel, NoiseModel, PracticeEffect, RateModel, SanitySettings,
    TestParams,
};

/// Test identifier that carries the age-split improvement range
pub const VO2_MAX: &str = "VO2 max";
/// Test identifier that carries the log-normal improvement model
pub const HOMA_IR: &str = "HOMA-IR";

/// Tests that may go negative when `allow_negative_tests` is not given,
/// in addition to the cognitive tests
pub const DEFAULT_NEGATIVE_TESTS: &[&str] = &["Sit and Reach"];

/// The assumptions document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Output row order and `TestId` assignment
    #[serde(default)]
    pub tests_order: Vec<String>,
    #[serde(default)]
    pub higher_is_better: Vec<String>,
    #[serde(default)]
    pub lower_is_better: Vec<String>,
    #[serde(default)]
    pub cognitive_tests: Vec<String>,
    /// Tests whose decline and improvement are additive (z-score units)
    #[serde(default)]
    pub absolute_decline_tests: Vec<String>,
    /// Defaults to `cognitive_tests` plus [`DEFAULT_NEGATIVE_TESTS`]
    #[serde(default)]
    pub allow_negative_tests: Option<Vec<String>>,

    #[serde(default)]
    pub decline: DeclineConfig,
    #[serde(default)]
    pub rate_uncertainty_cv: HashMap<String, f64>,
    #[serde(default)]
    pub rate_lognormal: Vec<String>,
    #[serde(default)]
    pub measurement_cv: HashMap<String, f64>,
    #[serde(default)]
    pub measurement_lognormal: Vec<String>,
    #[serde(default)]
    pub correlations: CorrelationConfig,
    #[serde(default)]
    pub improvement: ImprovementConfig,
    #[serde(default)]
    pub practice_effect: PracticeEffectConfig,

    pub n_sim: Option<u32>,
    pub seed: Option<u64>,
    #[serde(default)]
    pub sanity_check: SanityCheckConfig,

    /// Sheet label rules; the built-in table is used when absent
    #[serde(default)]
    pub labels: Option<Vec<LabelRule>>,

    // I/O locations, resolved by the caller relative to the document
    #[serde(default)]
    pub input_xlsx: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub output_decline: Option<String>,
    #[serde(default)]
    pub output_improvement: Option<String>,
}

/// Decade decline rates and the age at which the post rate takes over
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclineConfig {
    #[serde(default)]
    pub base_rate_per_decade: HashMap<String, f64>,
    #[serde(default)]
    pub post_rate_per_decade: HashMap<String, Option<f64>>,
    #[serde(default)]
    pub accelerate_from_age: HashMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Matrix order; need not match `tests_order`
    #[serde(default)]
    pub tests: Vec<String>,
    /// `[test_a, test_b, correlation]` triples
    #[serde(default)]
    pub pairs: Vec<(String, String, f64)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImprovementConfig {
    #[serde(default)]
    pub vo2_age_cutoff: Option<f64>,
    /// `[low, high]` fraction for clients younger than the cutoff
    #[serde(default)]
    pub vo2_under: Option<(f64, f64)>,
    #[serde(default)]
    pub vo2_over: Option<(f64, f64)>,
    #[serde(default)]
    pub homa_ir_reduction: Option<HomaReductionConfig>,
    /// `[low, high]` uniform fraction per test
    #[serde(default)]
    pub ranges: HashMap<String, (f64, f64)>,
}

/// Log-normal reduction calibrated from three percentile anchors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomaReductionConfig {
    pub q10: f64,
    pub median: f64,
    pub q90: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PracticeEffectConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub tests: Vec<String>,
    /// Fraction for relative tests, z-score units for absolute tests
    #[serde(default)]
    pub percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SanityCheckConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tolerance_abs: f64,
    #[serde(default)]
    pub tolerance_rel: f64,
    /// Physiologically plausible `[low, high]` per test
    #[serde(default)]
    pub plausible_ranges: HashMap<String, (f64, f64)>,
}

impl ForecastConfig {
    /// Default output file name for a scenario
    #[must_use]
    pub fn output_file(&self, scenario: crate::model::Scenario) -> &str {
        use crate::model::Scenario;
        match scenario {
            Scenario::Decline => self
                .output_decline
                .as_deref()
                .unwrap_or("MonteCarlo_Decline.xlsx"),
            Scenario::Improvement => self
                .output_improvement
                .as_deref()
                .unwrap_or("MonteCarlo_Improvement.xlsx"),
        }
    }
}
