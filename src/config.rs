use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("lengthFilter.minLength must be a positive number of km, got {0}")]
    InvalidMinLength(f64),
    #[error("lengthFilter.populationThreshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f64),
    #[error("lengthFilter.beta must lie strictly between 0 and 1, got {0}")]
    InvalidBeta(f64),
}

/// Parameters shared by both filter passes.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Kilometres. Shorter edges are exempt from population scoring and this is
    /// also the base of the adoption-adjusted maximum length.
    pub min_length: f64,
    pub population_threshold: f64,
    /// Beta-skeleton shape parameter.
    pub beta: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    length_filter: FilterConfig,
}

impl FilterConfig {
    pub fn new(min_length: f64, population_threshold: f64, beta: f64) -> Result<Self, ConfigError> {
        let config = Self {
            min_length,
            population_threshold,
            beta,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&contents)
    }

    /// Parses `{"lengthFilter": {"minLength": .., "populationThreshold": .., "beta": ..}}`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(contents)?;
        file.length_filter.validate()?;
        Ok(file.length_filter)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_length.is_finite() && self.min_length > 0.0) {
            return Err(ConfigError::InvalidMinLength(self.min_length));
        }
        if !(self.population_threshold.is_finite() && self.population_threshold >= 0.0) {
            return Err(ConfigError::InvalidThreshold(self.population_threshold));
        }
        if !(self.beta > 0.0 && self.beta < 1.0) {
            return Err(ConfigError::InvalidBeta(self.beta));
        }
        Ok(())
    }
}
