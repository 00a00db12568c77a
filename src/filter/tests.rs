use super::*;
use crate::adoption::AdoptionTable;
use crate::geometry::{GeographicPosition, along_great_circle};
use crate::population::PopulatedPosition;
use crate::topology::{EdgeId, GeoNode, Topology};
use serde_json::json;

fn config(min_length: f64, threshold: f64) -> FilterConfig {
    FilterConfig::new(min_length, threshold, 0.5).unwrap()
}

fn half_adoption() -> AdoptionTable {
    let mut table = AdoptionTable::new();
    table.insert("AAA", 50.0).unwrap();
    table.insert("BBB", 50.0).unwrap();
    table.insert("FULL", 100.0).unwrap();
    table
}

fn no_people() -> Vec<PopulatedPosition> {
    Vec::new()
}

fn square_range() -> ExclusionRegions {
    ExclusionRegions::from_value(&json!({
        "features": [{ "geometry": {
            "type": "MultiPolygon",
            "coordinates": [[[[0, 0], [0, 10], [10, 10], [10, 0]]]]
        } }]
    }))
    .unwrap()
}

/// Equator edge of `span` degrees of longitude starting at `lon`.
fn add_equator_edge(
    topology: &mut Topology,
    name: &str,
    lon: f64,
    span: f64,
    u: GeoNode,
    v: GeoNode,
) -> EdgeId {
    let (u_id, v_id) = (format!("{}-u", name), format!("{}-v", name));
    let u = GeoNode {
        position: GeographicPosition::new(0.0, lon),
        ..u
    };
    let v = GeoNode {
        position: GeographicPosition::new(0.0, lon + span),
        ..v
    };
    topology.add_node(u_id.as_str(), u).unwrap();
    topology.add_node(v_id.as_str(), v).unwrap();
    topology.add_edge(&u_id, &v_id).unwrap()
}

fn city(country: &str) -> GeoNode {
    GeoNode::city(0.0, 0.0, country)
}

fn landing() -> GeoNode {
    GeoNode::landing_point(0.0, 0.0)
}

fn other() -> GeoNode {
    GeoNode::other(0.0, 0.0)
}

#[test]
fn test_other_nodes_are_never_touched() {
    let mut topology = Topology::new();
    let a = add_equator_edge(&mut topology, "a", 20.0, 30.0, city("AAA"), other());
    let b = add_equator_edge(&mut topology, "b", 60.0, 30.0, other(), landing());
    let c = add_equator_edge(&mut topology, "c", 100.0, 30.0, other(), other());

    let people = no_people();
    let table = half_adoption();
    let filter = PopulationDensityFilter::new(config(100.0, 10.0), &people, &table);

    let mut by_density = topology.clone();
    let report = filter.filter(&mut by_density).unwrap();
    assert_eq!(report.untouched, 3);
    assert_eq!(report.deleted, 0);

    let mut by_length = topology.clone();
    let report = filter.filter_by_length(&mut by_length).unwrap();
    assert_eq!(report.untouched, 3);

    for edge in [a, b, c] {
        assert!(by_density.contains_edge(edge));
        assert!(by_length.contains_edge(edge));
    }
}

#[test]
fn test_short_edges_survive_density_filter() {
    let mut topology = Topology::new();
    // about 50 km
    let short = add_equator_edge(&mut topology, "short", 20.0, 0.45, city("AAA"), city("BBB"));

    let people = no_people();
    let table = half_adoption();
    let filter = PopulationDensityFilter::new(config(100.0, 0.0), &people, &table);
    let report = filter.filter(&mut topology).unwrap();

    assert_eq!(report.exempt, 1);
    assert!(topology.contains_edge(short));
}

#[test]
fn test_empty_surroundings_delete_long_edge() {
    let mut topology = Topology::new();
    // about 150 km with nobody living nearby
    let edge = add_equator_edge(&mut topology, "empty", 20.0, 1.35, city("AAA"), landing());

    let people = no_people();
    let table = half_adoption();
    let filter = PopulationDensityFilter::new(config(100.0, 0.0), &people, &table);
    let report = filter.filter(&mut topology).unwrap();

    assert_eq!(report.deleted, 1);
    assert!(!topology.contains_edge(edge));
}

#[test]
fn test_populated_surroundings_keep_edge() {
    let mut topology = Topology::new();
    let edge = add_equator_edge(&mut topology, "busy", 20.0, 2.0, city("FULL"), city("FULL"));
    let deserted = add_equator_edge(&mut topology, "quiet", 60.0, 2.0, city("FULL"), city("FULL"));

    let people = vec![PopulatedPosition {
        lat: 0.0,
        lon: 21.0,
        population: 50_000.0,
        country: "FULL".to_string(),
    }];
    let table = half_adoption();
    let filter = PopulationDensityFilter::new(config(100.0, 1_000.0), &people, &table);
    let report = filter.filter(&mut topology).unwrap();

    assert_eq!(report.deleted, 1);
    assert!(topology.contains_edge(edge));
    assert!(!topology.contains_edge(deserted));
}

#[test]
fn test_high_latitude_population_keeps_edge() {
    let (west, east) = (
        GeographicPosition::new(80.0, 0.0),
        GeographicPosition::new(80.0, 60.0),
    );
    let mut topology = Topology::new();
    topology
        .add_node("west", GeoNode::city(west.lat(), west.lon(), "FULL"))
        .unwrap();
    topology
        .add_node("east", GeoNode::city(east.lat(), east.lon(), "FULL"))
        .unwrap();
    let edge = topology.add_edge("west", "east").unwrap();

    // towns along the great circle, well apart from the midpoint in longitude
    let people: Vec<PopulatedPosition> = [0.1, 0.2, 0.3]
        .into_iter()
        .map(|f| {
            let town = along_great_circle(west, east, f);
            PopulatedPosition {
                lat: town.lat(),
                lon: town.lon(),
                population: 100_000.0,
                country: "FULL".to_string(),
            }
        })
        .collect();
    let index = crate::population::PopulationIndex::new(people.clone()).unwrap();
    let table = half_adoption();

    for report in [
        PopulationDensityFilter::new(config(100.0, 100.0), &people, &table)
            .filter(&mut topology.clone())
            .unwrap(),
        PopulationDensityFilter::new(config(100.0, 100.0), &index, &table)
            .filter(&mut topology)
            .unwrap(),
    ] {
        assert_eq!(report.deleted, 0);
    }
    assert!(topology.contains_edge(edge));
}

#[test]
fn test_length_filter_ignores_landing_point_pairs() {
    let mut topology = Topology::new();
    let cable = add_equator_edge(&mut topology, "cable", -60.0, 50.0, landing(), landing());

    let people = no_people();
    let table = half_adoption();
    let filter = PopulationDensityFilter::new(config(10.0, 0.0), &people, &table);
    let report = filter.filter_by_length(&mut topology).unwrap();

    assert_eq!(report.untouched, 1);
    assert!(topology.contains_edge(cable));
}

#[test]
fn test_length_filter_stretches_by_adoption() {
    let mut topology = Topology::new();
    // 12.5 degrees is about 1390 km, 14 degrees about 1557 km
    let within = add_equator_edge(&mut topology, "within", 0.0, 12.5, city("AAA"), city("BBB"));
    let beyond = add_equator_edge(&mut topology, "beyond", 40.0, 14.0, city("AAA"), city("BBB"));

    let people = no_people();
    let table = half_adoption();
    let filter = PopulationDensityFilter::new(config(1000.0, 0.0), &people, &table);
    let report = filter.filter_by_length(&mut topology).unwrap();

    assert_eq!(report.deleted, 1);
    assert!(topology.contains_edge(within));
    assert!(!topology.contains_edge(beyond));
}

#[test]
fn test_length_filter_with_single_city() {
    let mut topology = Topology::new();
    // unknown country means zero adoption, so the limit is exactly minLength
    let edge = add_equator_edge(&mut topology, "single", 0.0, 9.5, city("ZZZ"), landing());

    let people = no_people();
    let table = half_adoption();
    let filter = PopulationDensityFilter::new(config(1000.0, 0.0), &people, &table);
    filter.filter_by_length(&mut topology).unwrap();

    assert!(!topology.contains_edge(edge));
}

#[test]
fn test_exclusion_short_circuits_both_passes() {
    let mut crossing = Topology::new();
    crossing.add_node("south", GeoNode::city(-5.0, 5.0, "AAA")).unwrap();
    crossing.add_node("north", GeoNode::city(15.0, 5.0, "BBB")).unwrap();
    let edge = crossing.add_edge("south", "north").unwrap();
    let mut topology = crossing.clone();

    let people = no_people();
    let table = half_adoption();
    // generous limits so only the mountain range can remove the edge
    let filter = PopulationDensityFilter::new(config(100_000.0, 0.0), &people, &table)
        .with_exclusion_regions(square_range());

    let report = filter.filter(&mut topology).unwrap();
    assert_eq!(report.excluded, 1);
    assert!(!topology.contains_edge(edge));

    let report = filter.filter_by_length(&mut crossing).unwrap();
    assert_eq!(report.excluded, 1);
    assert!(!crossing.contains_edge(edge));
}

#[test]
fn test_exclusion_only_adds_deletions() {
    let mut topology = Topology::new();
    let spans = [(-30.0, 12.0), (-8.0, 20.0), (2.0, 3.0), (20.0, 0.5), (40.0, 14.0)];
    for (i, (lon, span)) in spans.into_iter().enumerate() {
        add_equator_edge(&mut topology, &format!("e{}", i), lon, span, city("AAA"), landing());
    }
    // straddles the equator, so edges over lon -1..10 cross it or lie inside
    let regions = ExclusionRegions::from_value(&json!({
        "features": [{ "geometry": {
            "type": "MultiPolygon",
            "coordinates": [[[[-1, -1], [-1, 10], [10, 10], [10, -1]]]]
        } }]
    }))
    .unwrap();

    let people = no_people();
    let table = half_adoption();
    let plain = PopulationDensityFilter::new(config(1000.0, 0.0), &people, &table);
    let excluding = PopulationDensityFilter::new(config(1000.0, 0.0), &people, &table)
        .with_exclusion_regions(regions);

    for by_length in [false, true] {
        let mut without = topology.clone();
        let mut with = topology.clone();
        if by_length {
            plain.filter_by_length(&mut without).unwrap();
            excluding.filter_by_length(&mut with).unwrap();
        } else {
            plain.filter(&mut without).unwrap();
            excluding.filter(&mut with).unwrap();
        }

        let survivors: Vec<EdgeId> = with.edges().map(|e| e.id).collect();
        assert!(survivors.iter().all(|id| without.contains_edge(*id)));
        assert!(with.edge_count() < without.edge_count());
    }
}

/// Graph wrapper that records the order of removals.
struct RecordingGraph {
    inner: Topology,
    removed: Vec<EdgeId>,
}

impl TopologyGraph for RecordingGraph {
    type EdgeId = EdgeId;

    fn edges(&self) -> impl Iterator<Item = EdgeView<'_, EdgeId>> {
        self.inner.edges()
    }

    fn remove_edge(&mut self, edge: EdgeId) -> bool {
        self.removed.push(edge);
        self.inner.remove_edge(edge)
    }

    fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }
}

#[test]
fn test_deletions_are_committed_in_discovery_order() {
    let mut topology = Topology::new();
    let first = add_equator_edge(&mut topology, "first", 0.0, 20.0, city("AAA"), city("AAA"));
    add_equator_edge(&mut topology, "kept", 30.0, 1.0, city("AAA"), city("AAA"));
    let second = add_equator_edge(&mut topology, "second", 40.0, 20.0, city("AAA"), landing());
    let third = add_equator_edge(&mut topology, "third", 70.0, 20.0, landing(), city("BBB"));

    let mut graph = RecordingGraph {
        inner: topology,
        removed: Vec::new(),
    };
    let people = no_people();
    let table = half_adoption();
    let filter = PopulationDensityFilter::new(config(1000.0, 0.0), &people, &table);
    let report = filter.filter_by_length(&mut graph).unwrap();

    assert_eq!(report.visited, 4);
    assert_eq!(report.deleted, 3);
    assert_eq!(graph.removed, vec![first, second, third]);
    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn test_filters_run_independently_on_same_graph() {
    let mut topology = Topology::new();
    add_equator_edge(&mut topology, "long", 0.0, 20.0, city("AAA"), city("BBB"));
    add_equator_edge(&mut topology, "short", 30.0, 0.2, city("AAA"), city("BBB"));

    let people = no_people();
    let table = half_adoption();
    let filter = PopulationDensityFilter::new(config(100.0, 0.0), &people, &table);

    let first = filter.filter_by_length(&mut topology).unwrap();
    assert_eq!(first.deleted, 1);
    let second = filter.filter(&mut topology).unwrap();
    assert_eq!(second.visited, 1);
    assert_eq!(second.exempt, 1);
    assert_eq!(topology.edge_count(), 1);
}
