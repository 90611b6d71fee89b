use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or insufficient input series.
    #[error("data error: {0}")]
    Data(String),

    /// Malformed region metadata or settings.
    #[error("config error: {0}")]
    Config(String),

    #[error("simulation for region {region} failed ({status}){}", stderr_suffix(.stderr))]
    Execution {
        region: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("could not launch simulation for region {region}: {source}")]
    Spawn {
        region: String,
        #[source]
        source: io::Error,
    },

    #[error("simulation for region {region} produced no output at {}", .path.display())]
    MissingOutput { region: String, path: PathBuf },

    #[error("malformed simulation output {}: {reason}", .path.display())]
    Output { path: PathBuf, reason: String },

    #[error("no region produced usable output")]
    NoOutput,

    #[error("could not start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    pub fn data(reason: impl Into<String>) -> Self {
        Error::Data(reason.into())
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config(reason.into())
    }

    pub fn output(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Output {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

fn stderr_suffix(stderr: &str) -> String {
    match stderr.trim().lines().last() {
        Some(line) => format!(": {line}"),
        None => String::new(),
    }
}
