//! Pruning of geographic network edges by surrounding population density,
//! internet adoption and mountain range exclusion regions.

pub mod adoption;
pub mod config;
pub mod filter;
pub mod geometry;
pub mod population;
pub mod regions;
pub mod topology;

pub use adoption::{AdoptionLookup, AdoptionTable};
pub use config::FilterConfig;
pub use filter::{FilterError, FilterReport, PopulationDensityFilter};
pub use geometry::GeographicPosition;
pub use population::{PopulatedPosition, PopulationIndex, PopulationSource};
pub use regions::ExclusionRegions;
pub use topology::{GeoNode, Topology, TopologyGraph};
