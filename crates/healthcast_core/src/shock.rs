//! Correlated shocks and per-draw decline rates
//!
//! Each simulation draw mixes one standard normal per correlated test through
//! the Cholesky factor, then turns the resulting shock into a sampled decade
//! rate for every test in `tests_order`. Tests outside the correlation set
//! get an independent normal.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::config::{ForecastModel, RateModel};
use crate::correlation::CholeskyFactor;
use crate::model::TestId;

#[inline]
pub(crate) fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}

/// Log-space sigma of a log-normal with the given coefficient of variation
#[inline]
#[must_use]
pub fn lognormal_sigma_from_cv(cv: f64) -> f64 {
    (1.0 + cv * cv).ln().sqrt()
}

/// Sample a decade rate with mean `mu` and coefficient of variation `cv`.
///
/// `z` is the correlated shock for this test, if it has one; otherwise an
/// independent normal is drawn. The additive-normal model is clamped at 0.
pub fn sample_rate<R: Rng + ?Sized>(
    rng: &mut R,
    mu: f64,
    cv: f64,
    lognormal: bool,
    z: Option<f64>,
) -> f64 {
    let z = z.unwrap_or_else(|| standard_normal(rng));
    if lognormal {
        if mu <= 0.0 {
            return 0.0;
        }
        let sigma = lognormal_sigma_from_cv(cv);
        (mu.ln() + sigma * z).exp()
    } else {
        let sigma = mu.abs() * cv;
        (mu + sigma * z).max(0.0)
    }
}

/// Rates sampled for one draw, indexed by `TestId`
#[derive(Debug, Clone, PartialEq)]
pub struct RateDraw {
    pub base: Vec<f64>,
    /// Post-acceleration rate, scaled by the same relative deviation as the
    /// base rate
    pub post: Vec<Option<f64>>,
}

impl RateDraw {
    #[must_use]
    pub fn base(&self, test: TestId) -> f64 {
        self.base[test.index()]
    }

    #[must_use]
    pub fn post(&self, test: TestId) -> Option<f64> {
        self.post[test.index()]
    }
}

/// Draws correlated rate sets for a model
#[derive(Debug, Clone)]
pub struct ShockSampler<'a> {
    model: &'a ForecastModel,
    factor: &'a CholeskyFactor,
    /// Row of each test in the factor, if it is correlated
    slots: Vec<Option<usize>>,
}

impl<'a> ShockSampler<'a> {
    #[must_use]
    pub fn new(model: &'a ForecastModel, factor: &'a CholeskyFactor) -> Self {
        let slots = model
            .tests()
            .iter()
            .map(|t| factor.tests.iter().position(|name| *name == t.name))
            .collect();
        Self {
            model,
            factor,
            slots,
        }
    }

    /// One correlated standard-normal vector in factor order
    pub fn correlated_shocks<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let n = self.factor.size();
        let z: Vec<f64> = (0..n).map(|_| standard_normal(rng)).collect();
        let mut x = vec![0.0; n];
        self.factor.mix_into(&z, &mut x);
        x
    }

    /// Rates for every ordered test for one draw
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> RateDraw {
        let shocks = self.correlated_shocks(rng);
        let n = self.model.num_tests();
        let mut base = Vec::with_capacity(n);
        let mut post = Vec::with_capacity(n);

        for test in self.model.test_ids() {
            let RateModel {
                base: mu,
                post: post_mu,
                cv,
                lognormal,
                ..
            } = self.model.params(test).rate;
            let z = self.slots[test.index()].map(|slot| shocks[slot]);
            let rate = sample_rate(rng, mu, cv, lognormal, z);
            base.push(rate);
            post.push(post_mu.map(|p| if mu > 0.0 { p * (rate / mu) } else { p }));
        }

        RateDraw { base, post }
    }
}
