use rand::{SeedableRng, distr::Distribution, rngs::StdRng};
use rand_distr::Binomial;

use crate::{
    output::RenewalOutput,
    parameters::{PROB_CRITICAL, Parameters},
};

pub struct RenewalModel {}

impl RenewalModel {
    pub fn simulate(parameters: &Parameters) -> RenewalOutput {
        let mut output = RenewalOutput::new(parameters.sim_length);
        let mut rt = vec![parameters.r0; parameters.sim_length];
        let mut cum_infected = 0;
        let mut rng = StdRng::seed_from_u64(parameters.seed);
        for step in 0..parameters.sim_length {
            let infections = if step < parameters.initial_infections.len() {
                // Replay the observed curve
                parameters.initial_infections[step]
            } else {
                let mut current_infectious = 0.0;
                for lag in 0..usize::min(step, parameters.generation_interval_pmf.len()) {
                    current_infectious += output.infection_incidence[step - lag - 1] as f64
                        * parameters.generation_interval_pmf[lag];
                }
                let transmission_rate = rt[step] * current_infectious;
                let susceptible = parameters.population.saturating_sub(cum_infected);
                if susceptible > 0 && transmission_rate > 0. {
                    Binomial::new(
                        susceptible,
                        f64::min(transmission_rate / susceptible as f64, 1.0),
                    )
                    .map_or(0, |b| b.sample(&mut rng))
                } else {
                    0
                }
            };
            output.infection_incidence[step] = infections;
            cum_infected += infections;
            if step < parameters.sim_length - 1 && parameters.population > 0 {
                let susceptible = parameters.population.saturating_sub(cum_infected);
                rt[step + 1] = parameters.r0 * susceptible as f64 / parameters.population as f64;
            }
            if infections == 0 {
                continue;
            }

            output.critical_admissions[step] += sample(&mut rng, infections, PROB_CRITICAL);

            // Distribute deaths over the days following infection
            let deaths = sample(&mut rng, infections, parameters.ifr);
            let mut residual_mass = 1.;
            let mut cum_deaths = 0;
            for (mass, output_deaths) in parameters
                .death_delay_pmf
                .iter()
                .zip(output.death_incidence.iter_mut().skip(step + 1))
            {
                let dead = sample(&mut rng, deaths - cum_deaths, *mass / residual_mass);
                *output_deaths += dead;
                cum_deaths += dead;
                residual_mass -= *mass;
            }
        }
        output
    }
}

fn sample(rng: &mut StdRng, n: u64, p: f64) -> u64 {
    Binomial::new(n, p.clamp(0.0, 1.0)).map_or(0, |b| b.sample(rng))
}

#[cfg(test)]
mod test {
    use crate::{parameters::Parameters, renewal::RenewalModel};

    fn parameters() -> Parameters {
        Parameters {
            population: 100_000,
            r0: 2.0,
            generation_interval_pmf: vec![0., 0., 0.25, 0.5, 0.25],
            death_delay_pmf: vec![1.],
            ifr: 0.0,
            initial_infections: vec![1],
            sim_length: 200,
            seed: 8675308,
        }
    }

    #[test]
    fn test_final_size() {
        let parameters = parameters();
        let output = RenewalModel::simulate(&parameters);
        let cum_infected: u64 = output.infection_incidence.iter().sum();
        let fraction_infected = cum_infected as f64 / parameters.population as f64;
        // Final size for r0: 2. is ~0.796811
        assert!(f64::abs(fraction_infected - 0.796811) < 0.1);
    }

    #[test]
    fn test_observed_curve_is_replayed() {
        let parameters = Parameters {
            initial_infections: vec![3, 8, 20, 41],
            sim_length: 10,
            ..parameters()
        };
        let output = RenewalModel::simulate(&parameters);
        assert_eq!(output.infection_incidence[..4], [3, 8, 20, 41]);
    }

    #[test]
    fn test_death_delay() {
        let initial_infections = 1000000;
        let death_delay_pmf = vec![0., 0., 0.25, 0.5, 0.25];
        let parameters = Parameters {
            population: 2 * initial_infections,
            r0: 0.,
            generation_interval_pmf: vec![1.],
            death_delay_pmf: death_delay_pmf.clone(),
            ifr: 1.0,
            initial_infections: vec![initial_infections],
            sim_length: death_delay_pmf.len() + 1,
            seed: 8675309,
        };
        let output = RenewalModel::simulate(&parameters);
        let total: u64 = output.death_incidence.iter().skip(1).sum();
        assert_eq!(total, initial_infections);
        for (step, mass) in death_delay_pmf.iter().enumerate() {
            let fraction = output.death_incidence[step + 1] as f64 / total as f64;
            assert!(f64::abs(fraction - mass) < 1e-3);
        }
    }
}
