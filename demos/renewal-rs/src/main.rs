pub mod output;
pub mod parameters;
pub mod renewal;

use std::path::Path;
use std::process::ExitCode;

use epiprep::epicurve::OUTPUT_FILE;
use epiprep::{Result, SimulationConfig};
use log::{error, info};
use output::COLUMNS;
use parameters::Parameters;
use renewal::RenewalModel;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run(Path::new(".")) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(dir: &Path) -> Result<()> {
    let config = SimulationConfig::read(dir)?;
    if config.verbose {
        println!("{config:#?}");
    }
    let parameters = Parameters::from_config(&config, 0);
    info!(
        "projecting {} days from {} observed, r0 = {:.3}",
        config.num_iter,
        parameters.initial_infections.len(),
        parameters.r0
    );

    let result = RenewalModel::simulate(&parameters);

    // The last observed day is the baseline row
    let start = parameters.initial_infections.len().saturating_sub(1);
    let mut writer = csv::Writer::from_path(dir.join(OUTPUT_FILE))?;
    writer.write_record(COLUMNS)?;
    for row in result.rows(parameters.population, start) {
        writer.write_record(row.iter().map(u64::to_string))?;
    }
    writer.flush()?;
    Ok(())
}
