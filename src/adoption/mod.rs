use ahash::AHashMap;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Internet adoption per country, as a percentage in `[0, 100]`.
pub trait AdoptionLookup {
    /// Unknown countries yield `0.0`.
    fn percentage(&self, country: &str) -> f64;

    fn fraction(&self, country: &str) -> f64 {
        self.percentage(country) / 100.0
    }
}

#[derive(Error, Debug)]
pub enum AdoptionError {
    #[error("I/O error reading adoption statistics '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed adoption record: {0}")]
    Csv(#[from] csv::Error),
    #[error("Adoption for '{country}' is {percentage}%, expected a value in [0, 100]")]
    OutOfRange { country: String, percentage: f64 },
}

#[derive(Debug, Deserialize)]
struct AdoptionRecord {
    country: String,
    percentage: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AdoptionTable {
    percentages: AHashMap<String, f64>,
}

impl AdoptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        country: impl Into<String>,
        percentage: f64,
    ) -> Result<(), AdoptionError> {
        let country = country.into();
        if !(0.0..=100.0).contains(&percentage) {
            return Err(AdoptionError::OutOfRange {
                country,
                percentage,
            });
        }
        self.percentages.insert(country, percentage);
        Ok(())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AdoptionError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| AdoptionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(BufReader::new(file))?;
        info!(
            "Loaded internet adoption for {} countries from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Reads CSV with the header `country,percentage`. Later rows win.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AdoptionError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut table = Self::new();
        for result in rdr.deserialize() {
            let record: AdoptionRecord = result?;
            table.insert(record.country, record.percentage)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.percentages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.percentages.is_empty()
    }
}

impl AdoptionLookup for AdoptionTable {
    fn percentage(&self, country: &str) -> f64 {
        match self.percentages.get(country) {
            Some(p) => *p,
            None => {
                debug!("No adoption statistics for '{}', assuming 0%", country);
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_default() {
        let table = AdoptionTable::from_reader(
            "country,percentage\nDEU,89.8\nFRA, 85.6\nZAF,56.2\n".as_bytes(),
        )
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.percentage("DEU"), 89.8);
        assert_eq!(table.percentage("FRA"), 85.6);
        assert!((table.fraction("ZAF") - 0.562).abs() < 1e-12);
        assert_eq!(table.percentage("ATA"), 0.0);
        assert_eq!(table.fraction("ATA"), 0.0);
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let err = AdoptionTable::from_reader("country,percentage\nDEU,120\n".as_bytes());
        assert!(matches!(err, Err(AdoptionError::OutOfRange { .. })));

        let mut table = AdoptionTable::new();
        assert!(table.insert("XYZ", -1.0).is_err());
        assert!(table.insert("XYZ", f64::NAN).is_err());
        assert!(table.insert("XYZ", 100.0).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = AdoptionTable::from_path("nowhere/adoption.csv");
        assert!(matches!(err, Err(AdoptionError::Io { .. })));
    }
}
