//! Populated positions around a point, served lazily by distance window.
//!
//! The filter only needs [`PopulationSource`]. [`PopulationIndex`] is the
//! in-memory implementation used by the command line, an R-tree over
//! (lon, lat) degrees loaded from a CSV file. Windows are angular: a scan
//! returns everything within the given degrees of arc of the center, however
//! stretched that is in longitude.

use crate::geometry::{GeographicPosition, spherical_dist};
use rstar::{AABB, RTree};
use rstar::primitives::GeomWithData;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PopulatedPosition {
    pub lat: f64,
    pub lon: f64,
    pub population: f64,
    pub country: String,
}

impl PopulatedPosition {
    pub fn position(&self) -> GeographicPosition {
        GeographicPosition::new(self.lat, self.lon)
    }
}

/// Source of populated positions near a center point.
///
/// `scan` opens a fresh, finite iterator over positions within `radius_deg`
/// degrees of arc of `center`. Order is unspecified. Dropping the iterator releases
/// whatever the scan holds, so stopping early is always safe.
pub trait PopulationSource {
    type Scan<'a>: Iterator<Item = PopulatedPosition>
    where
        Self: 'a;

    fn scan(&self, center: GeographicPosition, radius_deg: f64) -> Self::Scan<'_>;
}

#[derive(Error, Debug)]
pub enum PopulationError {
    #[error("I/O error reading population data '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed population record: {0}")]
    Csv(#[from] csv::Error),
    #[error("Negative population {population} in record {record}")]
    NegativePopulation { record: usize, population: f64 },
    #[error("Invalid coordinate ({lat}, {lon}) in record {record}")]
    InvalidCoordinate { record: usize, lat: f64, lon: f64 },
}

type PopulationEntry = GeomWithData<[f64; 2], PopulatedPosition>;

/// R-tree of populated positions keyed by `[lon, lat]`.
pub struct PopulationIndex {
    tree: RTree<PopulationEntry>,
}

impl PopulationIndex {
    /// Rejects negative populations and out of range coordinates.
    pub fn new(positions: Vec<PopulatedPosition>) -> Result<Self, PopulationError> {
        for (record, p) in positions.iter().enumerate() {
            validate(record, p)?;
        }
        let entries = positions
            .into_iter()
            .map(|p| GeomWithData::new([p.lon, p.lat], p))
            .collect();
        Ok(Self {
            tree: RTree::bulk_load(entries),
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PopulationError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| PopulationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_reader(BufReader::new(file))?;
        info!(
            "Loaded {} populated positions from {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    /// Reads CSV with the header `lat,lon,population,country`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PopulationError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let positions = rdr
            .deserialize()
            .collect::<Result<Vec<PopulatedPosition>, csv::Error>>()?;
        Self::new(positions)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

fn validate(record: usize, p: &PopulatedPosition) -> Result<(), PopulationError> {
    if !p.position().is_valid() {
        return Err(PopulationError::InvalidCoordinate {
            record,
            lat: p.lat,
            lon: p.lon,
        });
    }
    if !(p.population >= 0.0) {
        return Err(PopulationError::NegativePopulation {
            record,
            population: p.population,
        });
    }
    Ok(())
}

/// Whether `position` lies within `radius_deg` degrees of arc of `center`.
fn within(center: GeographicPosition, radius_deg: f64, position: GeographicPosition) -> bool {
    spherical_dist(center, position).to_degrees() <= radius_deg
}

/// Pads every query box so rounding never trims a candidate on the boundary.
const WINDOW_PAD_DEG: f64 = 1e-9;

/// `[lon, lat]` boxes covering the spherical cap of `radius_deg` around `center`.
/// Caps reaching a pole span every longitude; caps crossing the antimeridian are
/// split in two.
fn cap_envelopes(center: GeographicPosition, radius_deg: f64) -> Vec<AABB<[f64; 2]>> {
    let (lat, lon) = (center.lat(), center.lon());
    let lat_min = (lat - radius_deg - WINDOW_PAD_DEG).max(-90.0);
    let lat_max = (lat + radius_deg + WINDOW_PAD_DEG).min(90.0);

    if lat + radius_deg >= 90.0 || lat - radius_deg <= -90.0 {
        return vec![AABB::from_corners([-180.0, lat_min], [180.0, lat_max])];
    }

    let ratio = radius_deg.to_radians().sin() / lat.to_radians().cos();
    let half_width = ratio.clamp(0.0, 1.0).asin().to_degrees() + WINDOW_PAD_DEG;
    let (lon_min, lon_max) = (lon - half_width, lon + half_width);

    if lon_min < -180.0 {
        vec![
            AABB::from_corners([lon_min + 360.0, lat_min], [180.0, lat_max]),
            AABB::from_corners([-180.0, lat_min], [lon_max, lat_max]),
        ]
    } else if lon_max > 180.0 {
        vec![
            AABB::from_corners([lon_min, lat_min], [180.0, lat_max]),
            AABB::from_corners([-180.0, lat_min], [lon_max - 360.0, lat_max]),
        ]
    } else {
        vec![AABB::from_corners([lon_min, lat_min], [lon_max, lat_max])]
    }
}

impl PopulationSource for PopulationIndex {
    type Scan<'a> = PopulationScan<'a>;

    fn scan(&self, center: GeographicPosition, radius_deg: f64) -> Self::Scan<'_> {
        let radius = radius_deg.max(0.0);
        let tree = &self.tree;
        PopulationScan {
            inner: Box::new(
                cap_envelopes(center, radius)
                    .into_iter()
                    .flat_map(move |envelope| tree.locate_in_envelope(&envelope))
                    .filter(move |entry| within(center, radius, entry.data.position())),
            ),
        }
    }
}

/// Lazy cursor over one distance window of a [`PopulationIndex`].
pub struct PopulationScan<'a> {
    inner: Box<dyn Iterator<Item = &'a PopulationEntry> + 'a>,
}

impl Iterator for PopulationScan<'_> {
    type Item = PopulatedPosition;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| entry.data.clone())
    }
}

/// A plain list, scanned with the same window semantics as [`PopulationIndex`]
/// but without an index. Handy for small data sets and tests.
impl PopulationSource for Vec<PopulatedPosition> {
    type Scan<'a> = Box<dyn Iterator<Item = PopulatedPosition> + 'a>;

    fn scan(&self, center: GeographicPosition, radius_deg: f64) -> Self::Scan<'_> {
        let radius = radius_deg.max(0.0);
        Box::new(
            self.iter()
                .filter(move |p| within(center, radius, p.position()))
                .cloned(),
        )
    }
}
