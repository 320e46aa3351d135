//! Tests for end-to-end projections
//!
//! These tests verify that:
//! - Noise-free decline matches the closed-form compounding
//! - Decline never moves a test toward "better" and improvement never away
//! - Missing and zero baselines are skipped or counted, not fatal
//! - Measurement noise is centred the way the model says it is

use crate::config::{ForecastBuilder, ForecastModel, HomaReductionConfig};
use crate::correlation::CholeskyFactor;
use crate::model::{Client, ClientProjection, Scenario, TestId};
use crate::simulation::CohortSimulator;

fn run(model: &ForecastModel, scenario: Scenario, client: &Client) -> ClientProjection {
    let factor = CholeskyFactor::from_model(model).unwrap();
    CohortSimulator::new(model, &factor, scenario).simulate_client(0, client)
}

fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual}"
    );
}

/// VO2 max of 40 at age 45 declining 5% per decade with no noise
#[test]
fn test_vo2_decline_matches_closed_form() {
    let model = ForecastBuilder::new()
        .test("VO2 max", |t| t.higher_is_better().base_rate(0.05))
        .n_sim(1)
        .seed(7)
        .build()
        .unwrap();
    let client = Client::new("Ada", Some(45.0)).with_baseline("VO2 max", 40.0);

    let p = run(&model, Scenario::Decline, &client);

    // 40 * 0.95^0.5 ≈ 38.987 and 40 * 0.95 = 38
    assert_close(p.mean(TestId(0), 5).unwrap(), 40.0 * 0.95_f64.sqrt(), 1e-9);
    assert_close(p.mean(TestId(0), 10).unwrap(), 38.0, 1e-9);
}

/// Acceleration age inside the horizon switches to the post rate
#[test]
fn test_acceleration_age_inside_horizon() {
    let model = ForecastBuilder::new()
        .test("Grip Strength", |t| t.base_rate(0.10).post_rate(0.20, 70.0))
        .n_sim(1)
        .build()
        .unwrap();
    let client = Client::new("Bo", Some(67.0)).with_baseline("Grip Strength", 30.0);

    let p = run(&model, Scenario::Decline, &client);

    let y5 = 30.0 * 0.9_f64.powf(0.3) * 0.8_f64.powf(0.2);
    let y10 = 30.0 * 0.9_f64.powf(0.3) * 0.8_f64.powf(0.7);
    assert_close(p.mean(TestId(0), 5).unwrap(), y5, 1e-9);
    assert_close(p.mean(TestId(0), 10).unwrap(), y10, 1e-9);
}

fn mixed_model() -> ForecastModel {
    ForecastBuilder::new()
        .test("VO2 max", |t| t.higher_is_better().base_rate(0.08).post_rate(0.15, 60.0))
        .test("Sit and Reach", |t| t.higher_is_better().allow_negative().base_rate(0.10))
        .test("HbA1c", |t| t.lower_is_better().base_rate(0.04))
        .test("Timed Up and Go", |t| t.lower_is_better().base_rate(0.12).post_rate(0.3, 70.0))
        .test("Working Memory", |t| {
            t.higher_is_better().absolute().allow_negative().base_rate(0.25)
        })
        .test("Processing Speed", |t| {
            t.lower_is_better().absolute().allow_negative().base_rate(0.2)
        })
        .n_sim(3)
        .seed(11)
        .build()
        .unwrap()
}

fn mixed_client(age: f64) -> Client {
    Client::new("Cy", Some(age))
        .with_baseline("VO2 max", 35.0)
        .with_baseline("Sit and Reach", -4.0)
        .with_baseline("HbA1c", 5.6)
        .with_baseline("Timed Up and Go", 7.5)
        .with_baseline("Working Memory", 0.3)
        .with_baseline("Processing Speed", -0.5)
}

/// Without noise or rate uncertainty, decline is monotone toward "worse"
#[test]
fn test_decline_is_monotone_for_every_direction() {
    let model = mixed_model();
    for age in [30.0, 58.0, 65.0, 80.0] {
        let client = mixed_client(age);
        let p = run(&model, Scenario::Decline, &client);
        for test in model.test_ids() {
            let def = model.definition(test);
            let baseline = client.baseline(&def.name).unwrap();
            let y5 = p.mean(test, 5).unwrap();
            let y10 = p.mean(test, 10).unwrap();
            if def.direction.higher_is_better() {
                assert!(y10 <= y5 && y5 <= baseline, "{}: {baseline} {y5} {y10}", def.name);
            } else {
                assert!(y10 >= y5 && y5 >= baseline, "{}: {baseline} {y5} {y10}", def.name);
            }
        }
    }
}

/// With zero decline rates an improvement holds at both horizons
#[test]
fn test_improvement_without_decline_holds_gain() {
    let model = ForecastBuilder::new()
        .test("FEV1", |t| t.higher_is_better().improvement(0.05, 0.05))
        .test("HbA1c", |t| t.lower_is_better().improvement(0.02, 0.08))
        .test("Working Memory", |t| {
            t.higher_is_better()
                .absolute()
                .allow_negative()
                .improvement(0.1, 0.3)
        })
        .n_sim(200)
        .seed(3)
        .build()
        .unwrap();
    let client = Client::new("Di", Some(52.0))
        .with_baseline("FEV1", 3.2)
        .with_baseline("HbA1c", 6.0)
        .with_baseline("Working Memory", -0.2);

    let p = run(&model, Scenario::Improvement, &client);

    assert_close(p.mean(TestId(0), 5).unwrap(), 3.36, 1e-9);
    assert_close(p.mean(TestId(0), 10).unwrap(), 3.36, 1e-9);
    let hba1c5 = p.mean(TestId(1), 5).unwrap();
    assert!((6.0 * 0.92..=6.0 * 0.98).contains(&hba1c5));
    assert!(p.mean(TestId(1), 10).unwrap() <= 6.0);
    let wm = p.mean(TestId(2), 10).unwrap();
    assert!((-0.1..=0.1).contains(&wm), "working memory {wm}");
}

/// Improvement takes year one, then aging runs for the remaining years
#[test]
fn test_improvement_then_decline() {
    let model = ForecastBuilder::new()
        .test("VO2 max", |t| t.base_rate(0.05).improvement(0.1, 0.1))
        .n_sim(1)
        .build()
        .unwrap();
    let client = Client::new("Ed", Some(40.0)).with_baseline("VO2 max", 40.0);

    let p = run(&model, Scenario::Improvement, &client);

    assert_close(p.mean(TestId(0), 5).unwrap(), 44.0 * 0.95_f64.powf(0.4), 1e-9);
    assert_close(p.mean(TestId(0), 10).unwrap(), 44.0 * 0.95_f64.powf(0.9), 1e-9);
}

/// The HOMA-IR reduction stays inside its clamp bounds on every draw
#[test]
fn test_homa_reduction_respects_bounds() {
    let mut config = ForecastBuilder::new()
        .test("HOMA-IR", |t| t.lower_is_better())
        .n_sim(1)
        .into_config();
    config.improvement.homa_ir_reduction = Some(HomaReductionConfig {
        q10: 0.1,
        median: 0.2,
        q90: 0.4,
        min: Some(0.05),
        max: Some(0.5),
    });
    let model = config.resolve().unwrap();
    let client = Client::new("Fay", Some(60.0)).with_baseline("HOMA-IR", 2.0);

    for seed in 0..100 {
        let model = model.clone().with_seed(seed);
        let p = run(&model, Scenario::Improvement, &client);
        let y5 = p.mean(TestId(0), 5).unwrap();
        assert!((1.0..=1.9).contains(&y5), "seed {seed}: {y5}");
    }
}

/// The practice bump lands at its configured horizon only
#[test]
fn test_practice_effect_in_projection() {
    let model = ForecastBuilder::new()
        .test("Working Memory", |t| t.absolute().allow_negative().base_rate(0.2))
        .practice_effect(5, 0.1, &["Working Memory"])
        .n_sim(1)
        .build()
        .unwrap();
    let client = Client::new("Gus", Some(70.0)).with_baseline("Working Memory", 0.0);

    let p = run(&model, Scenario::Decline, &client);

    assert_close(p.mean(TestId(0), 5).unwrap(), -0.1 + 0.1, 1e-12);
    assert_close(p.mean(TestId(0), 10).unwrap(), -0.2, 1e-12);
}

/// Tests a client never took produce no output and are counted
#[test]
fn test_missing_baselines_are_skipped() {
    let model = mixed_model();
    let client = Client::new("Hal", None)
        .with_baseline("HbA1c", 5.9)
        .with_baseline("Working Memory", 0.0);

    let p = run(&model, Scenario::Decline, &client);

    assert_eq!(p.stats.missing_baselines, 4);
    assert_eq!(p.stats.zero_baselines, 1);
    assert!(p.mean(TestId(0), 5).is_none());
    assert!(p.mean(TestId(2), 5).is_some());
    // Unknown age is aged from zero, before any acceleration
    assert_close(p.mean(TestId(2), 10).unwrap(), 5.9 * 1.04, 1e-9);
}

/// Tests that cannot go negative are clamped even under heavy noise
#[test]
fn test_noisy_observations_respect_clamp() {
    let model = ForecastBuilder::new()
        .test("Body Fat %", |t| t.lower_is_better().base_rate(0.05).noise_cv(2.0))
        .n_sim(500)
        .build()
        .unwrap();
    let client = Client::new("Ivy", Some(50.0)).with_baseline("Body Fat %", 1.0);
    let p = run(&model, Scenario::Decline, &client);
    assert!(p.mean(TestId(0), 5).unwrap() >= 0.0);
}

/// De-noising then re-noising with log-normal error inflates the mean by
/// `exp(sigma²) = 1 + cv²`
#[test]
fn test_lognormal_noise_mean() {
    let model = ForecastBuilder::new()
        .test("hsCRP", |t| t.lower_is_better().noise_cv(0.1).lognormal_noise())
        .n_sim(20_000)
        .seed(5)
        .build()
        .unwrap();
    let client = Client::new("Jo", Some(40.0)).with_baseline("hsCRP", 40.0);
    let p = run(&model, Scenario::Decline, &client);
    assert_close(p.mean(TestId(0), 5).unwrap(), 40.0 * 1.01, 0.25);
}
