//! Exclusion regions (mountain ranges and similar) that no edge may cross.
//!
//! Regions come from a GeoJSON-like feature collection. Only `MultiPolygon`
//! geometries are imported. A document that cannot be read or has no
//! `features` array is a hard error; a broken feature or coordinate inside an
//! otherwise valid document is logged and skipped.

use crate::geometry::{GeographicPosition, midpoint, point_in_ring, segments_intersect};
use geo::BoundingRect;
use geo_types::{Coord, Line, LineString, Rect};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

pub const DEFAULT_EXCLUSION_REGIONS_PATH: &str = "filter_data/mountainRanges.json";

const MULTI_POLYGON: &str = "MultiPolygon";

#[derive(Error, Debug)]
pub enum RegionLoadError {
    #[error("I/O error reading exclusion regions '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Exclusion region document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Exclusion region document has no top level `features` array")]
    MissingFeatures,
}

/// A closed ring in (lon, lat) space. The closing edge is implicit.
#[derive(Debug, Clone)]
pub struct Ring {
    coords: Vec<Coord<f64>>,
    bounds: Rect<f64>,
}

impl Ring {
    /// Returns `None` for an empty ring.
    pub fn new(coords: Vec<Coord<f64>>) -> Option<Self> {
        let bounds = LineString::from(coords.clone()).bounding_rect()?;
        Some(Self { coords, bounds })
    }

    pub fn coords(&self) -> &[Coord<f64>] {
        &self.coords
    }

    /// Ring edges including the closing edge from the last point back to the first.
    pub fn edges(&self) -> impl Iterator<Item = Line<f64>> + '_ {
        let n = self.coords.len();
        (0..n).map(move |i| Line::new(self.coords[i], self.coords[(i + 1) % n]))
    }

    fn may_touch(&self, segment: &Rect<f64>) -> bool {
        let (a, b) = (self.bounds, segment);
        a.min().x <= b.max().x
            && b.min().x <= a.max().x
            && a.min().y <= b.max().y
            && b.min().y <= a.max().y
    }
}

#[derive(Debug, Clone)]
pub struct ExclusionPolygon {
    rings: Vec<Ring>,
}

impl ExclusionPolygon {
    /// Returns `None` when there is no non-empty ring.
    pub fn new(rings: Vec<Vec<Coord<f64>>>) -> Option<Self> {
        let rings: Vec<Ring> = rings.into_iter().filter_map(Ring::new).collect();
        if rings.is_empty() {
            None
        } else {
            Some(Self { rings })
        }
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExclusionRegions {
    polygons: Vec<ExclusionPolygon>,
}

impl ExclusionRegions {
    pub fn new(polygons: Vec<ExclusionPolygon>) -> Self {
        Self { polygons }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegionLoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| RegionLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let regions = Self::from_reader(BufReader::new(file))?;
        info!(
            "Loaded {} exclusion polygons from {}",
            regions.len(),
            path.display()
        );
        Ok(regions)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RegionLoadError> {
        let root: Value = serde_json::from_reader(reader)?;
        Self::from_value(&root)
    }

    pub fn from_value(root: &Value) -> Result<Self, RegionLoadError> {
        let features = root
            .get("features")
            .and_then(Value::as_array)
            .ok_or(RegionLoadError::MissingFeatures)?;

        let mut polygons = Vec::new();
        for (idx, feature) in features.iter().enumerate() {
            match parse_feature(feature) {
                Ok(Some(polygon)) => {
                    info!("Added polygon with {} rings", polygon.rings.len());
                    polygons.push(polygon);
                }
                Ok(None) => {}
                Err(reason) => {
                    error!("Error processing feature {}: {}", idx, reason);
                }
            }
        }

        Ok(Self { polygons })
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn polygons(&self) -> &[ExclusionPolygon] {
        &self.polygons
    }

    /// Whether the straight (lon, lat) segment between two positions crosses a
    /// ring edge, or has its midpoint inside a ring, of any loaded polygon.
    pub fn intersects(&self, p1: GeographicPosition, p2: GeographicPosition) -> bool {
        let segment = Line::new(p1.to_coord(), p2.to_coord());
        let segment_bounds = Rect::new(segment.start, segment.end);
        let mid = midpoint(p1, p2).to_coord();

        self.polygons
            .iter()
            .flat_map(|polygon| polygon.rings.iter())
            .filter(|ring| ring.may_touch(&segment_bounds))
            .any(|ring| {
                ring.edges().any(|edge| segments_intersect(segment, edge))
                    || point_in_ring(mid, &ring.coords)
            })
    }
}

/// `Ok(None)` for features that are fine but not importable (other geometry
/// kinds, or nothing left after dropping bad rings).
fn parse_feature(feature: &Value) -> Result<Option<ExclusionPolygon>, String> {
    let geometry = feature
        .get("geometry")
        .filter(|g| g.is_object())
        .ok_or("missing geometry")?;
    let geom_type = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or("geometry has no type")?;
    debug!("Processing geometry of type: {}", geom_type);

    if geom_type != MULTI_POLYGON {
        return Ok(None);
    }

    let polygons = geometry
        .get("coordinates")
        .and_then(Value::as_array)
        .ok_or("geometry has no coordinates array")?;

    let mut rings = Vec::new();
    for polygon in polygons {
        let Some(polygon) = polygon.as_array() else {
            return Err("polygon entry is not an array".to_string());
        };
        for ring in polygon {
            let Some(ring) = ring.as_array() else {
                return Err("ring entry is not an array".to_string());
            };
            rings.push(parse_ring(ring));
        }
    }

    Ok(ExclusionPolygon::new(rings))
}

fn parse_ring(ring: &[Value]) -> Vec<Coord<f64>> {
    let mut coords = Vec::with_capacity(ring.len());
    for entry in ring {
        match parse_coordinate(entry) {
            Ok(Some(coord)) => coords.push(coord),
            Ok(None) => {}
            Err(reason) => error!("Failed to parse coordinate: {}", reason),
        }
    }
    coords
}

/// Tuples that are not exactly `[lon, lat]` are dropped without complaint.
fn parse_coordinate(entry: &Value) -> Result<Option<Coord<f64>>, String> {
    let values = entry
        .as_array()
        .ok_or_else(|| format!("expected an array, found {}", entry))?;
    let numbers = values
        .iter()
        .map(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
                .ok_or_else(|| format!("not a number: {}", v))
        })
        .collect::<Result<Vec<f64>, String>>()?;

    match numbers.as_slice() {
        [x, y] => Ok(Some(Coord { x: *x, y: *y })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square_regions() -> ExclusionRegions {
        ExclusionRegions::from_value(&json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "name": "Square Range" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[0, 0], [0, 10], [10, 10], [10, 0]]]]
                }
            }]
        }))
        .unwrap()
    }

    fn pos(lon: f64, lat: f64) -> GeographicPosition {
        GeographicPosition::new(lat, lon)
    }

    #[test]
    fn test_edge_through_square_intersects() {
        let regions = square_regions();
        assert_eq!(regions.len(), 1);
        assert!(regions.intersects(pos(5.0, -5.0), pos(5.0, 15.0)));
    }

    #[test]
    fn test_edge_outside_square_does_not_intersect() {
        let regions = square_regions();
        assert!(!regions.intersects(pos(20.0, -5.0), pos(20.0, 15.0)));
        assert!(!regions.intersects(pos(-5.0, -5.0), pos(-1.0, 20.0)));
    }

    #[test]
    fn test_edge_fully_inside_square_intersects_via_midpoint() {
        let regions = square_regions();
        assert!(regions.intersects(pos(2.0, 2.0), pos(8.0, 8.0)));
    }

    #[test]
    fn test_closing_edge_is_checked() {
        let regions = ExclusionRegions::from_value(&json!({
            "features": [{
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[0, 0], [0, 10], [10, 10], [10, 0]]]]
                }
            }]
        }))
        .unwrap();
        // only crosses the implicit (10,0) -> (0,0) edge, midpoint is outside
        assert!(regions.intersects(pos(9.0, -1.0), pos(9.5, 0.5)));
    }

    #[test]
    fn test_non_multipolygon_features_are_ignored() {
        let regions = ExclusionRegions::from_value(&json!({
            "features": [
                { "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [0, 1], [1, 1]]] } },
                { "geometry": { "type": "Point", "coordinates": [0, 0] } }
            ]
        }))
        .unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let regions = ExclusionRegions::from_value(&json!({
            "features": [
                { "properties": {} },
                { "geometry": { "coordinates": [] } },
                { "geometry": { "type": "MultiPolygon" } },
                { "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[
                        [[0, 0], ["oops", 1], [0, 10, 3], [10, 10], [10, 0]],
                        [],
                        [[1], "bad"]
                    ]]
                } }
            ]
        }))
        .unwrap();

        assert_eq!(regions.len(), 1);
        let rings = regions.polygons()[0].rings();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].coords().len(), 3);
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let regions = ExclusionRegions::from_value(&json!({
            "features": [{ "geometry": {
                "type": "MultiPolygon",
                "coordinates": [[[["0", "0"], ["0", "10"], ["10", "10"]]]]
            } }]
        }))
        .unwrap();
        assert_eq!(regions.polygons()[0].rings()[0].coords().len(), 3);
    }

    #[test]
    fn test_polygon_without_rings_is_dropped() {
        let regions = ExclusionRegions::from_value(&json!({
            "features": [{ "geometry": {
                "type": "MultiPolygon",
                "coordinates": [[[], [["x", "y"]]]]
            } }]
        }))
        .unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn test_missing_features_is_fatal() {
        let err = ExclusionRegions::from_value(&json!({ "type": "FeatureCollection" }));
        assert!(matches!(err, Err(RegionLoadError::MissingFeatures)));

        let err = ExclusionRegions::from_reader("{ not json".as_bytes());
        assert!(matches!(err, Err(RegionLoadError::Json(_))));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = ExclusionRegions::from_path("does/not/exist/mountainRanges.json");
        assert!(matches!(err, Err(RegionLoadError::Io { .. })));
    }

    #[test]
    fn test_empty_store_never_intersects() {
        let regions = ExclusionRegions::default();
        assert!(!regions.intersects(pos(0.0, 0.0), pos(10.0, 10.0)));
    }
}
