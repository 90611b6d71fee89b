use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Knobs shared by reconstruction, config building and the batch runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Width, in days, of the triangular smoothing window.
    pub window_size: usize,
    pub prob_infection: f64,
    pub n_contacts: f64,
    pub num_iter: u32,
    pub smoothness: f64,
    pub verbose: bool,
    /// Worker count for simulation runs. `None` uses the available parallelism.
    pub parallelism: Option<usize>,
    /// Skip regions whose config is unchanged since their last successful run.
    pub reuse_outputs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            window_size: 14,
            prob_infection: 0.10,
            n_contacts: 3.5,
            num_iter: 60,
            smoothness: 0.75,
            verbose: false,
            parallelism: None,
            reuse_outputs: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::config("window_size must be at least 1"));
        }
        if self.parallelism == Some(0) {
            return Err(Error::config("parallelism must be at least 1"));
        }
        Ok(())
    }
}
