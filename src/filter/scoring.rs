//! Per-edge decisions for both filter passes.

use super::FilterError;
use crate::adoption::AdoptionLookup;
use crate::config::FilterConfig;
use crate::geometry::{
    GeographicPosition, lune_threshold, midpoint, spherical_dist, spherical_dist_to_km,
    subtended_angle,
};
use crate::population::PopulationSource;
use crate::regions::ExclusionRegions;
use crate::topology::GeoNode;

/// Outcome of evaluating a single edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeVerdict {
    /// An endpoint is neither a city nor a landing point, or (length pass) neither
    /// endpoint is a city. The edge is not evaluated.
    Untouched,
    /// Shorter than the minimum length, kept without scoring.
    Exempt { length_km: f64 },
    /// Crosses an exclusion region.
    Excluded,
    Keep { length_km: f64, score: Option<f64> },
    Delete { length_km: f64, score: Option<f64> },
}

impl EdgeVerdict {
    pub fn deletes(&self) -> bool {
        matches!(self, EdgeVerdict::Excluded | EdgeVerdict::Delete { .. })
    }
}

/// Population-weighted score of the lune around the edge `p1`-`p2`.
///
/// Consumption of the scan stops as soon as the score passes the threshold, so
/// the returned value is only exact when it is at or below the threshold.
pub fn population_score<P, A>(
    p1: GeographicPosition,
    p2: GeographicPosition,
    config: &FilterConfig,
    population: &P,
    adoption: &A,
) -> Result<f64, FilterError>
where
    P: PopulationSource,
    A: AdoptionLookup + ?Sized,
{
    let c = spherical_dist(p1, p2);
    let c_km = spherical_dist_to_km(c);
    let mid = midpoint(p1, p2);
    let theta = lune_threshold(config.beta);
    let length_factor = (config.min_length / c_km).powi(2);

    let mut score = 0.0;
    for next in population.scan(mid, c.to_degrees()) {
        if next.population < 0.0 || next.population.is_nan() {
            return Err(FilterError::NegativePopulation {
                lat: next.lat,
                lon: next.lon,
                population: next.population,
            });
        }
        if next.population == 0.0 {
            continue;
        }

        let q = next.position();
        let a = spherical_dist(p1, q);
        let b = spherical_dist(p2, q);
        if subtended_angle(a, b, c) < theta {
            continue;
        }

        let users = adoption.fraction(&next.country);
        // linear falloff from the midpoint, never below zero
        let weight = (1.0 - spherical_dist(q, mid) / (0.5 * c)).max(0.0);
        score += weight * next.population * users.powi(2) * length_factor;

        if score > config.population_threshold {
            break;
        }
    }

    Ok(score)
}

/// Decision of the population density pass for one edge.
pub fn density_verdict<P, A>(
    u: &GeoNode,
    v: &GeoNode,
    config: &FilterConfig,
    exclusion: Option<&ExclusionRegions>,
    population: &P,
    adoption: &A,
) -> Result<EdgeVerdict, FilterError>
where
    P: PopulationSource,
    A: AdoptionLookup + ?Sized,
{
    if !(u.participates() && v.participates()) {
        return Ok(EdgeVerdict::Untouched);
    }
    let (p1, p2) = (u.position, v.position);

    if exclusion.is_some_and(|regions| regions.intersects(p1, p2)) {
        return Ok(EdgeVerdict::Excluded);
    }

    let length_km = spherical_dist_to_km(spherical_dist(p1, p2));
    if length_km < config.min_length {
        return Ok(EdgeVerdict::Exempt { length_km });
    }

    let score = population_score(p1, p2, config, population, adoption)?;
    if score <= config.population_threshold {
        Ok(EdgeVerdict::Delete {
            length_km,
            score: Some(score),
        })
    } else {
        Ok(EdgeVerdict::Keep {
            length_km,
            score: Some(score),
        })
    }
}

/// Adoption fraction governing the edge's maximum length, `None` when neither
/// endpoint is a city.
pub fn edge_adoption<A>(u: &GeoNode, v: &GeoNode, adoption: &A) -> Option<f64>
where
    A: AdoptionLookup + ?Sized,
{
    match (u.as_city(), v.as_city()) {
        (Some(a), Some(b)) => {
            Some((adoption.fraction(&a.country) + adoption.fraction(&b.country)) / 2.0)
        }
        (Some(city), None) | (None, Some(city)) => Some(adoption.fraction(&city.country)),
        (None, None) => None,
    }
}

/// Decision of the adoption-adjusted maximum length pass for one edge.
pub fn length_verdict<A>(
    u: &GeoNode,
    v: &GeoNode,
    config: &FilterConfig,
    exclusion: Option<&ExclusionRegions>,
    adoption: &A,
) -> Result<EdgeVerdict, FilterError>
where
    A: AdoptionLookup + ?Sized,
{
    if !(u.participates() && v.participates()) {
        return Ok(EdgeVerdict::Untouched);
    }
    let (p1, p2) = (u.position, v.position);

    if exclusion.is_some_and(|regions| regions.intersects(p1, p2)) {
        return Ok(EdgeVerdict::Excluded);
    }

    let Some(users) = edge_adoption(u, v, adoption) else {
        return Ok(EdgeVerdict::Untouched);
    };
    if !(0.0..=1.0).contains(&users) {
        return Err(FilterError::AdoptionOutOfRange { fraction: users });
    }

    let length_km = spherical_dist_to_km(spherical_dist(p1, p2));
    if length_km > config.min_length * (1.0 + users) {
        Ok(EdgeVerdict::Delete {
            length_km,
            score: None,
        })
    } else {
        Ok(EdgeVerdict::Keep {
            length_km,
            score: None,
        })
    }
}
