//! Batch runs of the simulation executable, one isolated directory per region.
//!
//! Preparation is sequential and finishes before any simulation starts. Runs
//! are then queued in order on a fixed-size worker pool; each one touches only
//! its own directory, so a failing region never affects the others. Results
//! come back as a map from region id to a per-region `Result`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;

use crate::config::{RegionConfigBuilder, SimulationConfig};
use crate::curve::CurveReconstructor;
use crate::epicurve::{OUTPUT_FILE, SimulationResult, post_process};
use crate::error::{Error, Result};
use crate::region::{DeathSeries, EpidemicParameters, Region, RegionDataSource};
use crate::settings::Settings;

/// Digest of the config behind the last successful run in a directory.
pub const STAMP_FILE: &str = ".conf.sha256";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Simulated,
    Reused,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionRun {
    pub dir: PathBuf,
    pub status: RunStatus,
    /// Rows in the post-processed output.
    pub days: usize,
}

pub type BatchReport = BTreeMap<String, Result<RegionRun>>;

/// A region whose config has been written and is ready to simulate.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRegion {
    pub id: String,
    pub dir: PathBuf,
    pub config: SimulationConfig,
    pub digest: String,
    /// The existing output was produced from this exact config.
    pub reusable: bool,
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    executable: PathBuf,
    root: PathBuf,
    /// Directory under `root` owned by the national aggregate.
    national_id: Option<String>,
    settings: Settings,
    reconstructor: CurveReconstructor,
    builder: RegionConfigBuilder,
}

impl Orchestrator {
    pub fn new(
        executable: impl AsRef<Path>,
        root: impl Into<PathBuf>,
        settings: Settings,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Orchestrator {
            // The child runs in the region directory, so relative paths must be fixed now.
            executable: std::path::absolute(executable)?,
            root: root.into(),
            national_id: None,
            reconstructor: CurveReconstructor::new(settings.window_size)?,
            builder: RegionConfigBuilder::new(&settings),
            settings,
        })
    }

    /// Keeps regions out of the directory the national aggregate writes to.
    pub fn with_national_id(mut self, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        check_dir_name(&id)?;
        self.national_id = Some(id);
        Ok(self)
    }

    /// Working directory of a region. Ids must name a single directory under the root.
    pub fn region_dir(&self, id: &str) -> Result<PathBuf> {
        check_dir_name(id)?;
        if self.national_id.as_deref() == Some(id) {
            return Err(Error::config(format!(
                "region {id} collides with the national aggregate directory"
            )));
        }
        Ok(self.root.join(id))
    }

    pub fn workers(&self) -> usize {
        self.settings
            .parallelism
            .unwrap_or_else(|| thread::available_parallelism().map_or(1, NonZeroUsize::get))
    }

    /// Reconstructs the region's epicurve and writes its `conf.toml`.
    pub fn prepare_region<P>(
        &self,
        region: &Region,
        deaths: &DeathSeries,
        params: &P,
    ) -> Result<PreparedRegion>
    where
        P: EpidemicParameters + ?Sized,
    {
        let dir = self.region_dir(&region.id)?;
        let ifr = params.ifr(region)?;
        let curve = self
            .reconstructor
            .reconstruct(deaths, region.population, ifr)?;
        info!("{}: attack rate {:.4}%", region.id, curve.attack_rate);
        if curve.delay > 0 {
            warn!(
                "{}: unreliable tail, truncating epicurve to a {} day delay",
                region.id, curve.delay
            );
        }
        let config = self.builder.build(&curve, &region.age_distribution)?;
        let digest = config.digest()?;

        fs::create_dir_all(&dir)?;
        let stamp = dir.join(STAMP_FILE);
        let reusable = self.settings.reuse_outputs
            && dir.join(OUTPUT_FILE).is_file()
            && fs::read_to_string(&stamp).is_ok_and(|s| s.trim() == digest);
        if !reusable {
            // A run must never be credited with output left by an earlier one.
            remove_if_present(&stamp)?;
            remove_if_present(&dir.join(OUTPUT_FILE))?;
            config.write(&dir)?;
        }

        Ok(PreparedRegion {
            id: region.id.clone(),
            dir,
            config,
            digest,
            reusable,
        })
    }

    /// Prepares every region in order. Regions that fail are reported, not fatal.
    pub fn prepare_all<S, P>(
        &self,
        source: &S,
        params: &P,
        regions: &[Region],
    ) -> (Vec<PreparedRegion>, BatchReport)
    where
        S: RegionDataSource + ?Sized,
        P: EpidemicParameters + ?Sized,
    {
        let mut prepared = Vec::with_capacity(regions.len());
        let mut failed = BatchReport::new();
        for region in regions {
            info!("processing {}", region.id);
            let outcome = source
                .deaths(region)
                .and_then(|deaths| self.prepare_region(region, &deaths, params));
            match outcome {
                Ok(ready) => prepared.push(ready),
                Err(err) => {
                    warn!("{}: skipped, {err}", region.id);
                    failed.insert(region.id.clone(), Err(err));
                }
            }
        }
        (prepared, failed)
    }

    /// Runs and post-processes one prepared region.
    pub fn execute(&self, region: &PreparedRegion) -> Result<RegionRun> {
        let output = region.dir.join(OUTPUT_FILE);
        if region.reusable {
            let result = SimulationResult::read(&output)?;
            info!("{}: config unchanged, reusing {}", region.id, output.display());
            return Ok(RegionRun {
                dir: region.dir.clone(),
                status: RunStatus::Reused,
                days: result.len(),
            });
        }

        info!("running {}", region.dir.display());
        run_simulation(&self.executable, &region.dir, &region.id)?;
        if !output.is_file() {
            return Err(Error::MissingOutput {
                region: region.id.clone(),
                path: output,
            });
        }
        let result = post_process(&output)?;
        fs::write(region.dir.join(STAMP_FILE), &region.digest)?;
        info!("analysis finished: {}", region.dir.display());

        Ok(RegionRun {
            dir: region.dir.clone(),
            status: RunStatus::Simulated,
            days: result.len(),
        })
    }

    /// Runs every prepared region on the worker pool, in submission order.
    pub fn run_all(&self, prepared: &[PreparedRegion]) -> Result<BatchReport> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers())
            .thread_name(|i| format!("epiprep-worker-{i}"))
            .build()?;

        let (tx, rx) = mpsc::channel();
        pool.scope_fifo(|scope| {
            for region in prepared {
                let tx = tx.clone();
                scope.spawn_fifo(move |_| {
                    let outcome = self.execute(region);
                    if let Err(err) = &outcome {
                        warn!("{}: {err}", region.id);
                    }
                    // The receiver outlives the scope.
                    let _ = tx.send((region.id.clone(), outcome));
                });
            }
        });
        drop(tx);
        Ok(rx.into_iter().collect())
    }

    /// Prepares, runs and post-processes all `regions`.
    pub fn run<S, P>(&self, source: &S, params: &P, regions: &[Region]) -> Result<BatchReport>
    where
        S: RegionDataSource + ?Sized,
        P: EpidemicParameters + ?Sized,
    {
        let (prepared, mut report) = self.prepare_all(source, params, regions);
        report.extend(self.run_all(&prepared)?);
        Ok(report)
    }
}

/// Runs `executable` with `dir` as its working directory and waits for it to exit.
pub fn run_simulation(executable: &Path, dir: &Path, region: &str) -> Result<()> {
    let output = Command::new(executable)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| Error::Spawn {
            region: region.to_string(),
            source,
        })?;
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        debug!("{region}: {line}");
    }
    if !output.status.success() {
        return Err(Error::Execution {
            region: region.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Checks that `id` is usable as one path component, e.g. `BR-SP`.
pub fn check_dir_name(id: &str) -> Result<()> {
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == id => Ok(()),
        _ => Err(Error::config(format!(
            "{id:?} is not a valid region directory name"
        ))),
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

/// Successful regions of a report, in id order.
pub fn completed(report: &BatchReport) -> impl Iterator<Item = (&str, &RegionRun)> {
    report
        .iter()
        .filter_map(|(id, outcome)| outcome.as_ref().ok().map(|run| (id.as_str(), run)))
}
