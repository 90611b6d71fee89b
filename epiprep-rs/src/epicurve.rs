//! Post-processing of the time series written by the simulation executable.

use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};

pub const OUTPUT_FILE: &str = "epicurve.csv";

pub const DAY: &str = "day";
pub const SUSCEPTIBLE: &str = "S";
pub const DEATHS: &str = "D";
pub const DERIVED: [&str; 4] = ["new_cases", "new_deaths", "cases", "deaths"];

/// Per-day compartment values, with columns derived from `S` and `D`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    /// Columns as emitted by the simulation, excluding `day` and derived ones.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub susceptible: Vec<f64>,
    pub deaths: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedRow {
    pub new_cases: i64,
    pub new_deaths: i64,
    pub cases: f64,
    pub deaths: f64,
}

impl SimulationResult {
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(File::open(path)?);
        let headers = reader.headers()?.clone();

        // Unnamed index columns, `day` and previously derived columns are rebuilt on write.
        let kept: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, name)| {
                let name = name.trim();
                !name.is_empty() && name != DAY && !DERIVED.contains(&name)
            })
            .map(|(i, _)| i)
            .collect();
        let columns: Vec<String> = kept.iter().map(|&i| headers[i].trim().to_string()).collect();

        let find = |name: &str| {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| Error::output(path, format!("missing column {name}")))
        };
        let s_col = find(SUSCEPTIBLE)?;
        let d_col = find(DEATHS)?;

        let mut rows = Vec::new();
        let mut susceptible = Vec::new();
        let mut deaths = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Vec<String> = kept
                .iter()
                .map(|&i| record.get(i).unwrap_or_default().trim().to_string())
                .collect();
            susceptible.push(parse_cell(path, &row[s_col], SUSCEPTIBLE)?);
            deaths.push(parse_cell(path, &row[d_col], DEATHS)?);
            rows.push(row);
        }

        Ok(SimulationResult {
            columns,
            rows,
            susceptible,
            deaths,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Daily deltas and cumulative totals relative to the first row.
    pub fn derived(&self) -> Vec<DerivedRow> {
        let (Some(&s0), Some(&d0)) = (self.susceptible.first(), self.deaths.first()) else {
            return Vec::new();
        };
        let mut prev = (s0, d0);
        self.susceptible
            .iter()
            .zip(&self.deaths)
            .map(|(&s, &d)| {
                let row = DerivedRow {
                    new_cases: -(s - prev.0) as i64,
                    new_deaths: (d - prev.1) as i64,
                    cases: s0 - s,
                    deaths: d - d0,
                };
                prev = (s, d);
                row
            })
            .collect()
    }

    pub fn headers(&self) -> Vec<&str> {
        let mut headers = vec![DAY];
        headers.extend(self.columns.iter().map(String::as_str));
        headers.extend(DERIVED);
        headers
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.headers())?;
        for (day, (row, derived)) in self.rows.iter().zip(self.derived()).enumerate() {
            let mut record = Vec::with_capacity(row.len() + DERIVED.len() + 1);
            record.push(day.to_string());
            record.extend(row.iter().cloned());
            record.push(derived.new_cases.to_string());
            record.push(derived.new_deaths.to_string());
            record.push(derived.cases.to_string());
            record.push(derived.deaths.to_string());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Rewrites the output file at `path` with the derived columns added.
pub fn post_process(path: &Path) -> Result<SimulationResult> {
    let result = SimulationResult::read(path)?;
    result.write(path)?;
    Ok(result)
}

fn parse_cell(path: &Path, cell: &str, column: &str) -> Result<f64> {
    cell.parse()
        .map_err(|_| Error::output(path, format!("non-numeric {column} value {cell:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const RAW: &str = "S,I,C,D\n100,1,0,0\n97,3,1,0\n90,8,2,1\n85,9,2,3\n";

    #[test]
    fn test_derived_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(OUTPUT_FILE);
        fs::write(&path, RAW).unwrap();
        let result = post_process(&path).unwrap();
        let derived = result.derived();
        let new_cases: Vec<i64> = derived.iter().map(|r| r.new_cases).collect();
        let new_deaths: Vec<i64> = derived.iter().map(|r| r.new_deaths).collect();
        assert_eq!(new_cases, vec![0, 3, 7, 5]);
        assert_eq!(new_deaths, vec![0, 0, 1, 2]);
        assert_eq!(derived[3].cases, 15.0);
        assert_eq!(derived[3].deaths, 3.0);

        let written = fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert_eq!(
            lines.next(),
            Some("day,S,I,C,D,new_cases,new_deaths,cases,deaths")
        );
        assert_eq!(lines.next(), Some("0,100,1,0,0,0,0,0,0"));
        assert_eq!(lines.last(), Some("3,85,9,2,3,5,2,15,3"));
    }

    #[test]
    fn test_post_process_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(OUTPUT_FILE);
        fs::write(&path, RAW).unwrap();
        post_process(&path).unwrap();
        let once = fs::read_to_string(&path).unwrap();
        post_process(&path).unwrap();
        let twice = fs::read_to_string(&path).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unnamed_index_column_is_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(OUTPUT_FILE);
        fs::write(&path, ",S,D\n0,10,0\n1,8,1\n").unwrap();
        let result = SimulationResult::read(&path).unwrap();
        assert_eq!(result.columns, vec!["S", "D"]);
        assert_eq!(result.derived()[1].new_cases, 2);
    }

    #[test]
    fn test_missing_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(OUTPUT_FILE);
        fs::write(&path, "S,I\n10,0\n").unwrap();
        assert!(matches!(
            SimulationResult::read(&path),
            Err(Error::Output { .. })
        ));
    }

    #[test]
    fn test_non_numeric_cell() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(OUTPUT_FILE);
        fs::write(&path, "S,D\n10,0\nten,1\n").unwrap();
        assert!(matches!(
            SimulationResult::read(&path),
            Err(Error::Output { .. })
        ));
    }
}
