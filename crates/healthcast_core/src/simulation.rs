//! Monte Carlo driver
//!
//! Every draw owns a `SmallRng` seeded from
//! `(run_seed, scenario, client_index, draw_index)`, so a client's result does
//! not depend on which thread ran it or on how many other clients exist.
//! Draws within a client are summed in draw order.

use rand::SeedableRng;
use rand::rngs::SmallRng;
#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::config::ForecastModel;
use crate::correlation::CholeskyFactor;
use crate::model::{
    Client, ClientProjection, HORIZONS, ProjectionStats, Scenario, SimulationAccumulator, TestId,
};
use crate::projector::Projector;
use crate::shock::ShockSampler;

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Seed for one draw of one client
#[must_use]
pub fn derive_seed(run_seed: u64, scenario: Scenario, client_index: usize, draw_index: u32) -> u64 {
    let mut h = splitmix64(run_seed);
    h = splitmix64(h ^ scenario.stream_tag());
    h = splitmix64(h ^ client_index as u64);
    splitmix64(h ^ u64::from(draw_index))
}

/// Shared, read-only state for simulating any number of clients
#[derive(Debug, Clone, Copy)]
pub struct CohortSimulator<'a> {
    model: &'a ForecastModel,
    factor: &'a CholeskyFactor,
    scenario: Scenario,
}

impl<'a> CohortSimulator<'a> {
    #[must_use]
    pub fn new(model: &'a ForecastModel, factor: &'a CholeskyFactor, scenario: Scenario) -> Self {
        Self {
            model,
            factor,
            scenario,
        }
    }

    #[must_use]
    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// Run `n_sim` draws for one client and average them
    #[must_use]
    pub fn simulate_client(&self, client_index: usize, client: &Client) -> ClientProjection {
        let model = self.model;
        let mut stats = ProjectionStats::default();
        let present: Vec<(TestId, f64)> = model
            .test_ids()
            .filter_map(|id| match client.baseline(&model.definition(id).name) {
                Some(value) => {
                    if value == 0.0 {
                        stats.zero_baselines += 1;
                    }
                    Some((id, value))
                }
                None => {
                    stats.missing_baselines += 1;
                    None
                }
            })
            .collect();

        let sampler = ShockSampler::new(model, self.factor);
        let projector = Projector::new(model);
        let mut acc = SimulationAccumulator::new(model.num_tests());
        let mut true0 = vec![0.0; present.len()];

        for draw in 0..model.n_sim {
            let seed = derive_seed(model.seed, self.scenario, client_index, draw);
            let mut rng = SmallRng::seed_from_u64(seed);
            let rates = sampler.draw(&mut rng);

            for (slot, &(test, observed)) in true0.iter_mut().zip(&present) {
                *slot = projector.denoise(&mut rng, test, observed);
            }
            for (horizon_slot, &years) in HORIZONS.iter().enumerate() {
                for (&true_value, &(test, _)) in true0.iter().zip(&present) {
                    let projected = projector.project_from_true(
                        &mut rng,
                        test,
                        true_value,
                        client.age,
                        years,
                        self.scenario,
                        &rates,
                    );
                    acc.add(horizon_slot, test, projector.renoise(&mut rng, test, projected));
                }
            }
            acc.finish_draw();
        }

        tracing::debug!(
            client = %client.name,
            scenario = %self.scenario,
            tests = present.len(),
            draws = acc.draws(),
            "client simulated"
        );
        acc.into_projection(client_index, stats)
    }

    /// Simulate every client, in parallel when the `parallel` feature is on.
    /// Output order matches `clients`.
    #[must_use]
    pub fn simulate_cohort(&self, clients: &[Client]) -> Vec<ClientProjection> {
        #[cfg(feature = "parallel")]
        {
            (0..clients.len())
                .into_par_iter()
                .map(|i| self.simulate_client(i, &clients[i]))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.simulate_cohort_sequential(clients)
        }
    }

    /// Single-threaded cohort run
    #[must_use]
    pub fn simulate_cohort_sequential(&self, clients: &[Client]) -> Vec<ClientProjection> {
        clients
            .iter()
            .enumerate()
            .map(|(i, client)| self.simulate_client(i, client))
            .collect()
    }
}
