//! Planar and spherical helpers shared by the exclusion store and the scoring engine.
//!
//! Planar tests work directly in (lon, lat) degree space, which is only an
//! approximation of the geodesic path but is good enough for coarse regions.
//! Spherical helpers return central angles in radians.

use geo_types::{Coord, Line, Point};
use std::f64::consts::PI;

/// Earth mean radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Below this the two segments are treated as parallel or degenerate.
const PARALLEL_EPSILON: f64 = 1e-8;

/// A (lat, lon) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeographicPosition {
    lat: f64,
    lon: f64,
}

impl GeographicPosition {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Planar coordinate with `x = lon`, `y = lat`.
    pub fn to_coord(self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl From<GeographicPosition> for Point<f64> {
    fn from(pos: GeographicPosition) -> Self {
        Point::from(pos.to_coord())
    }
}

impl From<Coord<f64>> for GeographicPosition {
    fn from(coord: Coord<f64>) -> Self {
        GeographicPosition::new(coord.y, coord.x)
    }
}

/// Crossing-number test. The ring is implicitly closed.
pub fn point_in_ring(point: Coord<f64>, ring: &[Coord<f64>]) -> bool {
    if ring.is_empty() {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (pi, pj) = (ring[i], ring[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Parametric segment intersection. Endpoints touching counts as an intersection,
/// parallel and collinear segments never intersect.
pub fn segments_intersect(first: Line<f64>, second: Line<f64>) -> bool {
    let (x1, y1) = first.start.x_y();
    let (x2, y2) = first.end.x_y();
    let (x3, y3) = second.start.x_y();
    let (x4, y4) = second.end.x_y();

    let denom = (y4 - y3) * (x2 - x1) - (x4 - x3) * (y2 - y1);
    if denom.abs() < PARALLEL_EPSILON {
        return false;
    }

    let ua = ((x4 - x3) * (y1 - y3) - (y4 - y3) * (x1 - x3)) / denom;
    let ub = ((x2 - x1) * (y1 - y3) - (y2 - y1) * (x1 - x3)) / denom;
    (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub)
}

/// Central angle between two positions in radians (spherical law of cosines).
pub fn spherical_dist(p1: GeographicPosition, p2: GeographicPosition) -> f64 {
    let (lat1, lat2) = (p1.lat.to_radians(), p2.lat.to_radians());
    let dlon = (p2.lon - p1.lon).to_radians();
    let cos_c = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * dlon.cos();
    cos_c.clamp(-1.0, 1.0).acos()
}

pub fn spherical_dist_to_km(angle: f64) -> f64 {
    angle * EARTH_RADIUS_KM
}

/// Arithmetic mean of both endpoints, not the geodesic midpoint.
pub fn midpoint(p1: GeographicPosition, p2: GeographicPosition) -> GeographicPosition {
    GeographicPosition::new((p1.lat + p2.lat) / 2.0, (p1.lon + p2.lon) / 2.0)
}

pub fn haversine(x: f64) -> f64 {
    let s = (x / 2.0).sin();
    s * s
}

/// Inverse of [`haversine`]. Input is clamped into `[0, 1]`.
pub fn inverse_haversine(h: f64) -> f64 {
    2.0 * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Angle subtended at a point by an edge of length `c`, where `a` and `b` are the
/// point's distances to the edge endpoints. All inputs are central angles.
///
/// Uses the haversine law `hav(C) = (hav(c) - hav(a - b)) / (sin a sin b)`.
/// A point sitting on an endpoint lies on the edge itself and gets `PI`.
pub fn subtended_angle(a: f64, b: f64, c: f64) -> f64 {
    let denom = a.sin() * b.sin();
    if denom.abs() < f64::EPSILON {
        return PI;
    }
    let h = (haversine(c) - haversine(a - b)) / denom;
    if h.is_nan() {
        return PI;
    }
    inverse_haversine(h)
}

/// Minimum subtended angle for a point to be inside the beta-skeleton lune.
pub fn lune_threshold(beta: f64) -> f64 {
    PI - beta.clamp(0.0, 1.0).asin()
}

/// Point at fraction `f` along the great circle from `p1` to `p2`.
#[cfg(test)]
pub(crate) fn along_great_circle(
    p1: GeographicPosition,
    p2: GeographicPosition,
    f: f64,
) -> GeographicPosition {
    let to_xyz = |p: GeographicPosition| {
        let (lat, lon) = (p.lat.to_radians(), p.lon.to_radians());
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    };
    let (a, b) = (to_xyz(p1), to_xyz(p2));
    let omega = spherical_dist(p1, p2);
    let (wa, wb) = (
        ((1.0 - f) * omega).sin() / omega.sin(),
        (f * omega).sin() / omega.sin(),
    );
    let [x, y, z] = [0, 1, 2].map(|i| wa * a[i] + wb * b[i]);
    GeographicPosition::new(z.asin().to_degrees(), y.atan2(x).to_degrees())
}
