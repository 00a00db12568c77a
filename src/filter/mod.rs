//! Edge filter driver.
//!
//! Both passes walk every edge once, collect the edges to delete and only
//! remove them after the walk has finished. Traversal borrows the graph
//! immutably, so nothing can be removed while it is still in progress.

pub mod scoring;

#[cfg(test)]
mod tests;

use crate::adoption::AdoptionLookup;
use crate::config::FilterConfig;
use crate::population::PopulationSource;
use crate::regions::ExclusionRegions;
use crate::topology::{EdgeView, TopologyGraph};
use scoring::EdgeVerdict;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Negative population {population} at ({lat}, {lon})")]
    NegativePopulation { lat: f64, lon: f64, population: f64 },
    #[error("Internet adoption fraction {fraction} outside [0, 1]")]
    AdoptionOutOfRange { fraction: f64 },
}

/// Counts from one filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub visited: usize,
    /// Not evaluated because of the endpoint kinds.
    pub untouched: usize,
    /// Kept without scoring because they are shorter than the minimum length.
    pub exempt: usize,
    /// Deleted because they cross an exclusion region.
    pub excluded: usize,
    /// All deleted edges, `excluded` included.
    pub deleted: usize,
}

impl FilterReport {
    fn record(&mut self, verdict: &EdgeVerdict) {
        self.visited += 1;
        match verdict {
            EdgeVerdict::Untouched => self.untouched += 1,
            EdgeVerdict::Exempt { .. } => self.exempt += 1,
            EdgeVerdict::Excluded => self.excluded += 1,
            EdgeVerdict::Keep { .. } | EdgeVerdict::Delete { .. } => {}
        }
        if verdict.deletes() {
            self.deleted += 1;
        }
    }
}

pub struct PopulationDensityFilter<'a, P, A: ?Sized> {
    config: FilterConfig,
    population: &'a P,
    adoption: &'a A,
    exclusion: Option<ExclusionRegions>,
}

impl<'a, P, A> PopulationDensityFilter<'a, P, A>
where
    P: PopulationSource,
    A: AdoptionLookup + ?Sized,
{
    pub fn new(config: FilterConfig, population: &'a P, adoption: &'a A) -> Self {
        Self {
            config,
            population,
            adoption,
            exclusion: None,
        }
    }

    /// Enables exclusion filtering: edges crossing any of these regions are
    /// deleted by both passes before any other test.
    pub fn with_exclusion_regions(mut self, regions: ExclusionRegions) -> Self {
        self.exclusion = Some(regions);
        self
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn exclusion_regions(&self) -> Option<&ExclusionRegions> {
        self.exclusion.as_ref()
    }

    /// Population density pass. Deletes edges whose surrounding population,
    /// weighted by internet adoption and distance to the edge midpoint, does
    /// not exceed the population threshold.
    pub fn filter<G: TopologyGraph>(&self, graph: &mut G) -> Result<FilterReport, FilterError> {
        let report = self.run(graph, |edge| {
            scoring::density_verdict(
                edge.u,
                edge.v,
                &self.config,
                self.exclusion.as_ref(),
                self.population,
                self.adoption,
            )
        })?;
        info!(
            "{} edges deleted by population density filter ({} by exclusion regions, {} exempt, {} not evaluated, {} visited)",
            report.deleted, report.excluded, report.exempt, report.untouched, report.visited
        );
        Ok(report)
    }

    /// Length pass. Deletes edges longer than the minimum length stretched by
    /// the internet adoption of their city endpoints.
    pub fn filter_by_length<G: TopologyGraph>(
        &self,
        graph: &mut G,
    ) -> Result<FilterReport, FilterError> {
        let report = self.run(graph, |edge| {
            scoring::length_verdict(
                edge.u,
                edge.v,
                &self.config,
                self.exclusion.as_ref(),
                self.adoption,
            )
        })?;
        info!(
            "{} edges deleted by length filter ({} by exclusion regions, {} not evaluated, {} visited)",
            report.deleted, report.excluded, report.untouched, report.visited
        );
        Ok(report)
    }

    fn run<G, F>(&self, graph: &mut G, mut decide: F) -> Result<FilterReport, FilterError>
    where
        G: TopologyGraph,
        F: FnMut(&EdgeView<'_, G::EdgeId>) -> Result<EdgeVerdict, FilterError>,
    {
        let mut report = FilterReport::default();
        let mut to_delete = Vec::new();

        for edge in graph.edges() {
            let verdict = decide(&edge)?;
            debug!("edge {:?}: {:?}", edge.id, verdict);
            report.record(&verdict);
            if verdict.deletes() {
                to_delete.push(edge.id);
            }
        }

        for edge in to_delete {
            graph.remove_edge(edge);
        }
        Ok(report)
    }
}
