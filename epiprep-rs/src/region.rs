use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::age_buckets;
use crate::error::{Error, Result};

/// An administrative region with the demographic data needed to prepare a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: String,
    pub country: String,
    pub population: u64,
    /// Head counts over fixed-width age bins, youngest first.
    pub age_distribution: Vec<u64>,
}

/// Cumulative deaths per day, indexed by day offset from the series start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeathSeries(pub Vec<u64>);

impl DeathSeries {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }
}

impl From<Vec<u64>> for DeathSeries {
    fn from(values: Vec<u64>) -> Self {
        DeathSeries(values)
    }
}

pub trait RegionDataSource {
    /// Regions of the given kind within a country, sorted by id.
    fn regions(&self, kind: &str, country: &str) -> Result<Vec<Region>>;

    fn region(&self, id: &str) -> Result<Region>;

    fn deaths(&self, region: &Region) -> Result<DeathSeries>;
}

pub trait EpidemicParameters {
    /// Infection fatality rate for the region, as a fraction.
    fn ifr(&self, region: &Region) -> Result<f64>;
}

/// The same IFR for every region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedIfr(pub f64);

impl EpidemicParameters for FixedIfr {
    fn ifr(&self, _region: &Region) -> Result<f64> {
        Ok(self.0)
    }
}

/// IFR weighted by the region's population over 9 decade-wide age groups.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeStratifiedIfr {
    pub by_age: [f64; 9],
}

impl AgeStratifiedIfr {
    pub fn covid19() -> Self {
        AgeStratifiedIfr {
            by_age: [
                0.000016, 0.000069, 0.000309, 0.000844, 0.001610, 0.005950, 0.019300, 0.042800,
                0.078000,
            ],
        }
    }
}

impl EpidemicParameters for AgeStratifiedIfr {
    fn ifr(&self, region: &Region) -> Result<f64> {
        let buckets = age_buckets(&region.age_distribution)?;
        let total: u64 = buckets.iter().sum();
        if total == 0 {
            return Err(Error::data(format!(
                "region {} has an empty age distribution",
                region.id
            )));
        }
        let weighted: f64 = buckets
            .iter()
            .zip(self.by_age.iter())
            .map(|(&count, &ifr)| count as f64 * ifr)
            .sum();
        Ok(weighted / total as f64)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    #[serde(flatten)]
    region: Region,
    #[serde(default)]
    deaths: DeathSeries,
}

/// Region catalog backed by a JSON array of regions, each carrying its death series.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    entries: Vec<CatalogEntry>,
}

impl JsonCatalog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut entries: Vec<CatalogEntry> = serde_json::from_str(raw)?;
        entries.sort_by(|a, b| a.region.id.cmp(&b.region.id));
        Ok(JsonCatalog { entries })
    }

    fn entry(&self, id: &str) -> Result<&CatalogEntry> {
        self.entries
            .binary_search_by(|e| e.region.id.as_str().cmp(id))
            .map(|i| &self.entries[i])
            .map_err(|_| Error::config(format!("unknown region {id}")))
    }
}

impl RegionDataSource for JsonCatalog {
    fn regions(&self, kind: &str, country: &str) -> Result<Vec<Region>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.region.kind == kind && e.region.country == country)
            .map(|e| e.region.clone())
            .collect())
    }

    fn region(&self, id: &str) -> Result<Region> {
        self.entry(id).map(|e| e.region.clone())
    }

    fn deaths(&self, region: &Region) -> Result<DeathSeries> {
        self.entry(&region.id).map(|e| e.deaths.clone())
    }
}
