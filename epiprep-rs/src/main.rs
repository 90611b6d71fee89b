use std::path::PathBuf;
use std::process::ExitCode;

use log::{error, info, warn};

use epiprep::orchestrator::completed;
use epiprep::{
    AgeStratifiedIfr, BatchInput, Environment, EpidemicParameters, FixedIfr, JsonCatalog,
    Orchestrator, Region, RegionDataSource, Result, aggregate,
};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut env = Environment::<BatchInput>::load()?;
    let input = env.input.take().unwrap_or_default();
    let catalog = JsonCatalog::open(env.file("catalog")?)?;
    let root = env.output_dir().unwrap_or_else(|| PathBuf::from("data"));

    let regions: Vec<Region> = if input.regions.is_empty() {
        catalog.regions(&input.kind, &input.country)?
    } else {
        let mut regions = input
            .regions
            .iter()
            .map(|id| catalog.region(id))
            .collect::<Result<Vec<_>>>()?;
        regions.sort_by(|a, b| a.id.cmp(&b.id));
        regions
    };
    info!("{} regions selected", regions.len());

    let params: Box<dyn EpidemicParameters> = match input.ifr {
        Some(ifr) => Box::new(FixedIfr(ifr)),
        None => Box::new(AgeStratifiedIfr::covid19()),
    };

    let orchestrator = Orchestrator::new(env.file("executable")?, &root, input.settings.clone())?
        .with_national_id(input.national_id())?;
    let report = orchestrator.run(&catalog, params.as_ref(), &regions)?;

    let failed: Vec<&str> = report
        .iter()
        .filter(|(_, outcome)| outcome.is_err())
        .map(|(id, _)| id.as_str())
        .collect();
    if !failed.is_empty() {
        warn!("{} of {} regions failed: {}", failed.len(), report.len(), failed.join(", "));
    }

    let national = aggregate::national(completed(&report).map(|(_, run)| &run.dir))?;
    let national_dir = root.join(input.national_id());
    national.write(&national_dir)?;
    info!("national series written to {}", national_dir.display());
    Ok(())
}
