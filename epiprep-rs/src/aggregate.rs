use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

use log::{info, warn};

use crate::epicurve::{DAY, OUTPUT_FILE};
use crate::error::{Error, Result};

/// Column-wise sums of post-processed region series, keyed by day offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NationalSeries {
    pub columns: Vec<String>,
    pub days: BTreeMap<u64, Vec<f64>>,
    pub regions: usize,
}

impl NationalSeries {
    /// Adds one post-processed `epicurve.csv` to the totals.
    pub fn add(&mut self, path: &Path) -> Result<()> {
        let mut reader = csv::Reader::from_reader(File::open(path)?);
        let headers = reader.headers()?.clone();
        let day_col = headers
            .iter()
            .position(|h| h == DAY)
            .ok_or_else(|| Error::output(path, "missing day column"))?;

        let slots: Vec<Option<usize>> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (i != day_col).then(|| self.slot(name)))
            .collect();

        for record in reader.records() {
            let record = record?;
            let day: u64 = record[day_col]
                .parse()
                .map_err(|_| Error::output(path, format!("bad day {:?}", &record[day_col])))?;
            let width = self.columns.len();
            let totals = self.days.entry(day).or_default();
            totals.resize(width, 0.0);
            for (cell, slot) in record.iter().zip(&slots) {
                let Some(slot) = slot else { continue };
                let value: f64 = cell
                    .parse()
                    .map_err(|_| Error::output(path, format!("non-numeric value {cell:?}")))?;
                totals[*slot] += value;
            }
        }
        self.regions += 1;
        Ok(())
    }

    fn slot(&mut self, name: &str) -> usize {
        match self.columns.iter().position(|c| c == name) {
            Some(i) => i,
            None => {
                self.columns.push(name.to_string());
                self.columns.len() - 1
            }
        }
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let i = self.columns.iter().position(|c| c == name)?;
        Some(
            self.days
                .values()
                .map(|row| row.get(i).copied().unwrap_or(0.0))
                .collect(),
        )
    }

    /// Writes `epicurve.csv` into `dir`, creating it if needed.
    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let mut writer = csv::Writer::from_path(dir.join(OUTPUT_FILE))?;
        let mut headers = vec![DAY];
        headers.extend(self.columns.iter().map(String::as_str));
        writer.write_record(headers)?;
        for (day, totals) in &self.days {
            let mut record = vec![day.to_string()];
            record.extend(
                (0..self.columns.len()).map(|i| totals.get(i).copied().unwrap_or(0.0).to_string()),
            );
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Sums the outputs found in `dirs`, skipping unreadable ones. Fails if none could be read.
pub fn national<I, P>(dirs: I) -> Result<NationalSeries>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut series = NationalSeries::default();
    for dir in dirs {
        let dir = dir.as_ref();
        // Validate the whole file before touching the totals.
        let mut single = series.clone();
        match single.add(&dir.join(OUTPUT_FILE)) {
            Ok(()) => series = single,
            Err(err) => warn!("{}: left out of the aggregate, {err}", dir.display()),
        }
    }
    if series.regions == 0 {
        return Err(Error::NoOutput);
    }
    info!(
        "aggregated {} regions over {} days",
        series.regions,
        series.days.len()
    );
    Ok(series)
}
