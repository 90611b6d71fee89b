//! Reconstructs daily infections from death curves and runs an external
//! epidemic simulation for many regions at once.
//!
//! The batch flow is: [`region::RegionDataSource`] supplies deaths and
//! demographics, [`curve::CurveReconstructor`] turns deaths into an epicurve,
//! [`config::RegionConfigBuilder`] writes each region's `conf.toml`, and
//! [`orchestrator::Orchestrator`] runs the simulation executable per region
//! and post-processes its `epicurve.csv`. [`aggregate`] sums the results.

pub mod aggregate;
pub mod config;
pub mod curve;
pub mod environment;
pub mod epicurve;
pub mod error;
pub mod orchestrator;
pub mod region;
pub mod settings;

pub use config::{RegionConfigBuilder, SimulationConfig};
pub use curve::{CurveReconstructor, ReconstructedCurve};
pub use environment::{BatchInput, Environment};
pub use epicurve::SimulationResult;
pub use error::{Error, Result};
pub use orchestrator::{BatchReport, Orchestrator, RegionRun, RunStatus};
pub use region::{
    AgeStratifiedIfr, DeathSeries, EpidemicParameters, FixedIfr, JsonCatalog, Region,
    RegionDataSource,
};
pub use settings::Settings;
