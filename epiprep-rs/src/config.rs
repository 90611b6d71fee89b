use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::curve::ReconstructedCurve;
use crate::error::{Error, Result};
use crate::settings::Settings;

pub const CONFIG_FILE: &str = "conf.toml";
pub const AGE_GROUPS: usize = 9;

/// Raw age bins needed to fill the paired groups; later bins fold into the last group.
const MIN_AGE_BINS: usize = 2 * AGE_GROUPS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epicurve {
    pub data: Vec<u64>,
    pub smoothness: f64,
}

/// Input of one simulation run, read by the executable from its working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub prob_infection: f64,
    pub n_contacts: f64,
    pub num_iter: u32,
    pub verbose: bool,
    pub pop_counts: [u64; AGE_GROUPS],
    pub delay: usize,
    pub attack_rate: f64,
    pub epicurve: Epicurve,
}

impl SimulationConfig {
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn read(dir: &Path) -> Result<Self> {
        Self::from_toml(&fs::read_to_string(dir.join(CONFIG_FILE))?)
    }

    /// Writes `conf.toml` into `dir` and returns the digest of what was written.
    pub fn write(&self, dir: &Path) -> Result<String> {
        let raw = self.to_toml()?;
        fs::write(dir.join(CONFIG_FILE), &raw)?;
        Ok(digest(raw.as_bytes()))
    }

    /// Hex SHA-256 of the serialized config.
    pub fn digest(&self) -> Result<String> {
        Ok(digest(self.to_toml()?.as_bytes()))
    }
}

pub fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Sums consecutive pairs of the first 18 age bins into 9 groups; every bin
/// past the 18th is added to the last group.
pub fn age_buckets(histogram: &[u64]) -> Result<[u64; AGE_GROUPS]> {
    if histogram.len() < MIN_AGE_BINS {
        return Err(Error::config(format!(
            "age distribution has {} bins, need at least {MIN_AGE_BINS}",
            histogram.len()
        )));
    }
    let mut buckets = [0; AGE_GROUPS];
    for (bucket, pair) in buckets.iter_mut().zip(histogram.chunks_exact(2)) {
        *bucket = pair[0] + pair[1];
    }
    buckets[AGE_GROUPS - 1] += histogram[MIN_AGE_BINS..].iter().sum::<u64>();
    Ok(buckets)
}

/// Packages a reconstructed curve and an age histogram into a [`SimulationConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegionConfigBuilder {
    prob_infection: f64,
    n_contacts: f64,
    num_iter: u32,
    smoothness: f64,
    verbose: bool,
}

impl Default for RegionConfigBuilder {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl RegionConfigBuilder {
    pub fn new(settings: &Settings) -> Self {
        RegionConfigBuilder {
            prob_infection: settings.prob_infection,
            n_contacts: settings.n_contacts,
            num_iter: settings.num_iter,
            smoothness: settings.smoothness,
            verbose: settings.verbose,
        }
    }

    pub fn build(&self, curve: &ReconstructedCurve, histogram: &[u64]) -> Result<SimulationConfig> {
        Ok(SimulationConfig {
            prob_infection: self.prob_infection,
            n_contacts: self.n_contacts,
            num_iter: self.num_iter,
            verbose: self.verbose,
            pop_counts: age_buckets(histogram)?,
            delay: curve.delay,
            attack_rate: curve.attack_rate,
            epicurve: Epicurve {
                data: curve.daily.clone(),
                smoothness: self.smoothness,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn curve() -> ReconstructedCurve {
        ReconstructedCurve {
            daily: vec![12, 30, 41, 7],
            attack_rate: 1.5,
            delay: 9,
        }
    }

    #[test]
    fn test_age_buckets_flat() {
        assert_eq!(
            age_buckets(&[1; 19]).unwrap(),
            [2, 2, 2, 2, 2, 2, 2, 2, 3]
        );
        assert_eq!(
            age_buckets(&[1; 18]).unwrap(),
            [2, 2, 2, 2, 2, 2, 2, 2, 2]
        );
    }

    #[test]
    fn test_age_buckets_pairing() {
        let histogram: Vec<u64> = (0..21).collect();
        let buckets = age_buckets(&histogram).unwrap();
        assert_eq!(buckets[0], 1);
        assert_eq!(buckets[1], 2 + 3);
        assert_eq!(buckets[8], 16 + 17 + 18 + 19 + 20);
        assert_eq!(buckets.iter().sum::<u64>(), histogram.iter().sum::<u64>());
    }

    #[test]
    fn test_age_buckets_too_short() {
        assert!(matches!(age_buckets(&[1; 17]), Err(Error::Config(_))));
    }

    #[test]
    fn test_build_uses_settings() {
        let settings = Settings {
            num_iter: 90,
            smoothness: 0.5,
            ..Settings::default()
        };
        let config = RegionConfigBuilder::new(&settings)
            .build(&curve(), &[1; 19])
            .unwrap();
        assert_eq!(config.prob_infection, 0.10);
        assert_eq!(config.n_contacts, 3.5);
        assert_eq!(config.num_iter, 90);
        assert!(!config.verbose);
        assert_eq!(config.delay, 9);
        assert_eq!(config.attack_rate, 1.5);
        assert_eq!(config.epicurve.data, vec![12, 30, 41, 7]);
        assert_eq!(config.epicurve.smoothness, 0.5);
    }

    #[test]
    fn test_toml_layout() {
        let config = RegionConfigBuilder::default()
            .build(&curve(), &[1; 19])
            .unwrap();
        let raw = config.to_toml().unwrap();
        let value: toml::Value = toml::from_str(&raw).unwrap();
        assert_eq!(value["prob_infection"].as_float(), Some(0.1));
        assert_eq!(value["num_iter"].as_integer(), Some(60));
        assert_eq!(value["verbose"].as_bool(), Some(false));
        assert_eq!(value["pop_counts"].as_array().unwrap().len(), 9);
        assert_eq!(value["delay"].as_integer(), Some(9));
        assert_eq!(value["epicurve"]["data"].as_array().unwrap().len(), 4);
        assert_eq!(value["epicurve"]["smoothness"].as_float(), Some(0.75));
    }

    #[test]
    fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let config = RegionConfigBuilder::default()
            .build(&curve(), &[3; 20])
            .unwrap();
        let written = config.write(dir.path()).unwrap();
        assert_eq!(written, config.digest().unwrap());
        assert_eq!(written.len(), 64);
        assert_eq!(SimulationConfig::read(dir.path()).unwrap(), config);
    }
}
