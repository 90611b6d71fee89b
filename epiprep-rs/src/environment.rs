use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::settings::Settings;

/// Run-protocol envelope: `input` parameters, `model.files` paths and an `output` target.
pub struct Environment<I = ()> {
    input_json: serde_json::Map<String, Value>,
    pub input: Option<I>,
    pub files: HashMap<String, PathBuf>,
    output: Value,
}

impl Environment {
    pub fn from_json(data: Value) -> Self {
        let input_json = data
            .get("input")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let files = data
            .get("model")
            .and_then(|m| m.get("files"))
            .and_then(|f| f.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), PathBuf::from(s))))
                    .collect()
            })
            .unwrap_or_default();

        let output = data.get("output").cloned().unwrap_or(Value::Null);

        Self {
            input_json,
            input: None,
            files,
            output,
        }
    }

    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw)?;
        if raw.trim().is_empty() {
            return Err(Error::config("no run description on stdin"));
        }
        let data: Value = serde_json::from_str(&raw)?;
        Ok(Self::from_json(data))
    }

    pub fn from_stdin() -> Result<Self> {
        Self::from_reader(io::stdin().lock())
    }

    pub fn with_input_type<I: DeserializeOwned>(self) -> Result<Environment<I>> {
        let input_value = Value::Object(self.input_json.clone());
        let input = serde_json::from_value(input_value)?;
        Ok(Environment {
            input_json: self.input_json,
            input: Some(input),
            files: self.files,
            output: self.output,
        })
    }
}

impl<I: DeserializeOwned> Environment<I> {
    pub fn load() -> Result<Self> {
        Environment::from_stdin()?.with_input_type::<I>()
    }
}

impl<I> Environment<I> {
    pub fn input_json(&self) -> &serde_json::Map<String, Value> {
        &self.input_json
    }

    /// Path registered under `model.files.<name>`.
    pub fn file(&self, name: &str) -> Result<&Path> {
        self.files
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::config(format!("model.files.{name} is required")))
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        let output = &self.output;

        if output.get("spec").and_then(|v| v.as_str()) == Some("filesystem") {
            if let Some(dir) = output.get("dir").and_then(|v| v.as_str()) {
                return Some(PathBuf::from(dir));
            }
            return None;
        }

        // Profiled output: the "default" profile, else the first one
        if let Some(profiles) = output.get("profile").and_then(|v| v.as_object()) {
            let selected = profiles
                .get("default")
                .or_else(|| profiles.values().next());
            if let Some(profile) = selected {
                if profile.get("spec").and_then(|v| v.as_str()) == Some("filesystem") {
                    if let Some(dir) = profile.get("dir").and_then(|v| v.as_str()) {
                        return Some(PathBuf::from(dir));
                    }
                }
            }
        }

        None
    }
}

/// `input` section of a batch run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchInput {
    pub country: String,
    pub kind: String,
    /// Explicit region ids; empty selects every region of `kind` in `country`.
    pub regions: Vec<String>,
    /// Fixed IFR for all regions instead of the age-stratified default.
    pub ifr: Option<f64>,
    /// Directory name of the national aggregate. Defaults to `country`.
    pub national_id: Option<String>,
    #[serde(flatten)]
    pub settings: Settings,
}

impl Default for BatchInput {
    fn default() -> Self {
        BatchInput {
            country: "BR".to_string(),
            kind: "state".to_string(),
            regions: Vec::new(),
            ifr: None,
            national_id: None,
            settings: Settings::default(),
        }
    }
}

impl BatchInput {
    pub fn national_id(&self) -> &str {
        self.national_id.as_deref().unwrap_or(&self.country)
    }
}
