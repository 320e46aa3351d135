//! Post-hoc diagnostics over simulated means
//!
//! Findings are logged and returned; they never change the output.

use std::fmt;

use crate::config::ForecastModel;
use crate::model::{Client, ClientProjection, Direction, HORIZONS, Scenario};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindingKind {
    /// Mean moved against the scenario's expected direction
    Direction,
    /// Year 10 is better than year 5 under decline
    NonMonotonic,
    /// Mean outside the configured plausible range
    OutOfRange,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingKind::Direction => write!(f, "unexpected direction"),
            FindingKind::NonMonotonic => write!(f, "non-monotonic"),
            FindingKind::OutOfRange => write!(f, "implausible value"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SanityFinding {
    pub kind: FindingKind,
    pub client: String,
    pub test: String,
    pub horizon_years: u32,
    pub baseline: f64,
    pub value: f64,
}

/// Checks projections against the directions a scenario implies
#[derive(Debug, Clone, Copy)]
pub struct SanityChecker<'a> {
    model: &'a ForecastModel,
    scenario: Scenario,
}

impl<'a> SanityChecker<'a> {
    #[must_use]
    pub fn new(model: &'a ForecastModel, scenario: Scenario) -> Self {
        Self { model, scenario }
    }

    /// All findings for one client. Empty when checking is disabled.
    #[must_use]
    pub fn check(&self, client: &Client, projection: &ClientProjection) -> Vec<SanityFinding> {
        let settings = &self.model.sanity;
        if !settings.enabled {
            return Vec::new();
        }

        let mut findings = Vec::new();
        for test in self.model.test_ids() {
            let def = self.model.definition(test);
            let Some(baseline) = client.baseline(&def.name) else {
                continue;
            };
            let tol = settings.tolerance(baseline);
            let mut flag = |kind, horizon_years, value| {
                findings.push(SanityFinding {
                    kind,
                    client: client.name.clone(),
                    test: def.name.clone(),
                    horizon_years,
                    baseline,
                    value,
                });
            };

            // A zero baseline gives no direction to compare against
            if baseline != 0.0 {
                for years in HORIZONS {
                    if let Some(mean) = projection.mean(test, years)
                        && self.wrong_direction(def.direction, mean - baseline, tol)
                    {
                        flag(FindingKind::Direction, years, mean);
                    }
                }

                if self.scenario == Scenario::Decline
                    && let (Some(m5), Some(m10)) =
                        (projection.mean(test, 5), projection.mean(test, 10))
                    && classify(def.direction, m10 - m5, tol).is_improvement()
                {
                    flag(FindingKind::NonMonotonic, 10, m10);
                }
            }

            if let Some((low, high)) = settings.plausible_ranges[test.index()] {
                for years in HORIZONS {
                    if let Some(mean) = projection.mean(test, years)
                        && !(low..=high).contains(&mean)
                    {
                        flag(FindingKind::OutOfRange, years, mean);
                    }
                }
            }
        }

        for f in &findings {
            tracing::warn!(
                client = %f.client,
                test = %f.test,
                scenario = %self.scenario,
                year = f.horizon_years,
                baseline = f.baseline,
                mean = f.value,
                "sanity: {}",
                f.kind
            );
        }
        findings
    }

    fn wrong_direction(&self, direction: Direction, delta: f64, tol: f64) -> bool {
        let movement = classify(direction, delta, tol);
        match self.scenario {
            Scenario::Decline => movement.is_improvement(),
            Scenario::Improvement => movement.is_decline(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Movement {
    Better,
    Worse,
    Within,
}

impl Movement {
    fn is_improvement(self) -> bool {
        self == Movement::Better
    }

    fn is_decline(self) -> bool {
        self == Movement::Worse
    }
}

/// Classify a signed change against a tolerance band
fn classify(direction: Direction, delta: f64, tol: f64) -> Movement {
    let signed = if direction.higher_is_better() { delta } else { -delta };
    if signed > tol {
        Movement::Better
    } else if signed < -tol {
        Movement::Worse
    } else {
        Movement::Within
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastBuilder;
    use crate::model::ProjectionStats;

    fn model() -> ForecastModel {
        let mut config = ForecastBuilder::new()
            .test("VO2 max", |t| t.higher_is_better())
            .test("HbA1c", |t| t.lower_is_better())
            .sanity_check(0.1, 0.01)
            .n_sim(1)
            .into_config();
        config
            .sanity_check
            .plausible_ranges
            .insert("HbA1c".into(), (3.0, 15.0));
        config.resolve().unwrap()
    }

    fn projection(vo2: (f64, f64), hba1c: (f64, f64)) -> ClientProjection {
        ClientProjection {
            client_index: 0,
            mean5: vec![Some(vo2.0), Some(hba1c.0)],
            mean10: vec![Some(vo2.1), Some(hba1c.1)],
            stats: ProjectionStats::default(),
        }
    }

    fn client() -> Client {
        Client::new("Ada", Some(50.0))
            .with_baseline("VO2 max", 40.0)
            .with_baseline("HbA1c", 5.5)
    }

    #[test]
    fn test_expected_decline_is_clean() {
        let model = model();
        let checker = SanityChecker::new(&model, Scenario::Decline);
        let findings = checker.check(&client(), &projection((39.0, 38.0), (5.6, 5.7)));
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn test_decline_flags_rise_beyond_tolerance() {
        let model = model();
        let checker = SanityChecker::new(&model, Scenario::Decline);
        // Tolerance for VO2 is max(0.1, 0.4) = 0.4
        let findings = checker.check(&client(), &projection((40.3, 40.5), (5.6, 5.7)));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::Direction);
        assert_eq!(findings[0].horizon_years, 10);
        assert_eq!(findings[0].test, "VO2 max");
    }

    #[test]
    fn test_improvement_flags_mirror_decline() {
        let model = model();
        let checker = SanityChecker::new(&model, Scenario::Improvement);
        let findings = checker.check(&client(), &projection((44.0, 43.0), (5.0, 6.0)));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].test, "HbA1c");
        assert_eq!(findings[0].horizon_years, 10);
    }

    #[test]
    fn test_non_monotonic_and_out_of_range() {
        let model = model();
        let checker = SanityChecker::new(&model, Scenario::Decline);
        let findings = checker.check(&client(), &projection((38.0, 39.0), (5.6, 16.0)));
        let kinds: Vec<_> = findings.iter().map(|f| (f.kind, f.test.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (FindingKind::NonMonotonic, "VO2 max"),
                (FindingKind::OutOfRange, "HbA1c"),
            ]
        );
    }

    #[test]
    fn test_zero_baseline_skips_direction_checks() {
        let model = model();
        let checker = SanityChecker::new(&model, Scenario::Decline);
        let client = Client::new("Bo", None)
            .with_baseline("VO2 max", 0.0)
            .with_baseline("HbA1c", 5.5);
        let findings = checker.check(&client, &projection((5.0, 6.0), (5.6, 5.7)));
        assert!(findings.is_empty());
    }

    #[test]
    fn test_disabled_checker_is_silent() {
        let model = ForecastBuilder::new()
            .test("VO2 max", |t| t)
            .n_sim(1)
            .build()
            .unwrap();
        let checker = SanityChecker::new(&model, Scenario::Decline);
        let client = Client::new("Ada", None).with_baseline("VO2 max", 40.0);
        let p = ClientProjection {
            client_index: 0,
            mean5: vec![Some(90.0)],
            mean10: vec![Some(99.0)],
            stats: ProjectionStats::default(),
        };
        assert!(checker.check(&client, &p).is_empty());
    }
}
