use crate::parameters::CRITICAL_STAY;

pub const COLUMNS: [&str; 4] = ["S", "I", "C", "D"];

#[derive(Default)]
pub struct RenewalOutput {
    pub infection_incidence: Vec<u64>,
    pub death_incidence: Vec<u64>,
    pub critical_admissions: Vec<u64>,
}

impl RenewalOutput {
    pub fn new(len: usize) -> RenewalOutput {
        RenewalOutput {
            infection_incidence: vec![0; len],
            death_incidence: vec![0; len],
            critical_admissions: vec![0; len],
        }
    }

    /// `S`, `I`, `C`, `D` for every step from `start` on.
    pub fn rows(&self, population: u64, start: usize) -> Vec<[u64; 4]> {
        let mut cum_infected = 0u64;
        let mut cum_deaths = 0u64;
        let mut rows = Vec::new();
        for step in 0..self.infection_incidence.len() {
            cum_infected += self.infection_incidence[step];
            cum_deaths += self.death_incidence[step];
            if step < start {
                continue;
            }
            let occupied: u64 = self.critical_admissions[step.saturating_sub(CRITICAL_STAY - 1)..=step]
                .iter()
                .sum();
            rows.push([
                population.saturating_sub(cum_infected),
                self.infection_incidence[step],
                occupied,
                cum_deaths,
            ]);
        }
        rows
    }
}
