use epiprep::{AgeStratifiedIfr, SimulationConfig};
use serde::Deserialize;

/// Days an infection stays infectious, used to turn contacts into a reproduction number.
pub const INFECTIOUS_PERIOD: f64 = 3.47;
pub const PROB_CRITICAL: f64 = 0.18 * 0.22;
pub const CRITICAL_STAY: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct Parameters {
    pub population: u64,
    pub r0: f64,
    pub generation_interval_pmf: Vec<f64>,
    /// Delay from infection to death, by day.
    pub death_delay_pmf: Vec<f64>,
    pub ifr: f64,
    /// Observed infections, replayed before the projection starts.
    pub initial_infections: Vec<u64>,
    pub sim_length: usize,
    pub seed: u64,
}

impl Parameters {
    pub fn from_config(config: &SimulationConfig, seed: u64) -> Parameters {
        let generation_interval_pmf = vec![0., 0., 0.25, 0.5, 0.25];
        let contact_r0 = config.prob_infection * config.n_contacts * INFECTIOUS_PERIOD;
        let r0 = match observed_reproduction(&config.epicurve.data, &generation_interval_pmf) {
            Some(observed) => {
                config.epicurve.smoothness * observed
                    + (1.0 - config.epicurve.smoothness) * contact_r0
            }
            None => contact_r0,
        };

        let population: u64 = config.pop_counts.iter().sum();
        let table = AgeStratifiedIfr::covid19().by_age;
        let ifr = if population > 0 {
            config
                .pop_counts
                .iter()
                .zip(table.iter())
                .map(|(&n, &ifr)| n as f64 * ifr)
                .sum::<f64>()
                / population as f64
        } else {
            0.0
        };

        let mut death_delay_pmf = vec![0.; 14];
        death_delay_pmf.extend([0.2; 5]);

        let observed = config.epicurve.data.len();
        Parameters {
            population,
            r0,
            generation_interval_pmf,
            death_delay_pmf,
            ifr,
            initial_infections: config.epicurve.data.clone(),
            sim_length: observed + config.num_iter as usize,
            seed,
        }
    }
}

/// Ratio of infections to infectious pressure over the last week of `incidence`.
pub fn observed_reproduction(incidence: &[u64], generation_interval_pmf: &[f64]) -> Option<f64> {
    let start = incidence.len().checked_sub(7)?;
    let mut infections = 0.0;
    let mut pressure = 0.0;
    for step in start.max(generation_interval_pmf.len())..incidence.len() {
        infections += incidence[step] as f64;
        for (lag, mass) in generation_interval_pmf.iter().enumerate() {
            pressure += incidence[step - lag - 1] as f64 * mass;
        }
    }
    (pressure > 0.0).then(|| infections / pressure)
}
