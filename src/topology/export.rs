use super::{NodeKind, Topology, TopologyError, TopologyGraph};
use geo_types::LineString;
use geojson::{Feature, FeatureCollection, Geometry, JsonValue};
use serde_json::Map;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

fn kind_name(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::City(_) => "city",
        NodeKind::LandingPoint => "landing_point",
        NodeKind::Other => "other",
    }
}

impl Topology {
    /// Surviving edges as straight `LineString` features, one per edge.
    pub fn to_geojson(&self) -> FeatureCollection {
        let features = self
            .edges()
            .filter_map(|edge| {
                let (u_id, v_id) = self.endpoints(edge.id)?;
                let line: LineString<f64> =
                    vec![edge.u.position.to_coord(), edge.v.position.to_coord()].into();

                let mut properties = Map::new();
                properties.insert("u".to_string(), JsonValue::String(u_id.to_string()));
                properties.insert("v".to_string(), JsonValue::String(v_id.to_string()));
                properties.insert(
                    "u_kind".to_string(),
                    JsonValue::String(kind_name(edge.u.kind()).to_string()),
                );
                properties.insert(
                    "v_kind".to_string(),
                    JsonValue::String(kind_name(edge.v.kind()).to_string()),
                );

                Some(Feature {
                    bbox: None,
                    geometry: Some(Geometry {
                        bbox: None,
                        value: geojson::Value::from(&line),
                        foreign_members: None,
                    }),
                    id: Some(geojson::feature::Id::Number(edge.id.0.into())),
                    properties: Some(properties),
                    foreign_members: None,
                })
            })
            .collect::<Vec<Feature>>();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    pub fn export_geojson(&self, path: impl AsRef<Path>) -> Result<(), TopologyError> {
        let path = path.as_ref();
        let io_err = |source: std::io::Error| TopologyError::Io {
            path: path.to_path_buf(),
            source,
        };
        let collection = self.to_geojson();
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        writer
            .write_all(collection.to_string().as_bytes())
            .map_err(io_err)?;
        writer.flush().map_err(io_err)?;
        info!(
            "Exported {} edges as GeoJSON to {}",
            collection.features.len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::topology::{GeoNode, Topology};

    #[test]
    fn test_edges_become_line_strings() {
        let mut topology = Topology::new();
        topology.add_node("a", GeoNode::city(10.0, 20.0, "AAA")).unwrap();
        topology.add_node("b", GeoNode::landing_point(11.0, 21.0)).unwrap();
        topology.add_edge("a", "b").unwrap();

        let collection = topology.to_geojson();
        assert_eq!(collection.features.len(), 1);

        let feature = &collection.features[0];
        assert_eq!(feature.property("u").and_then(|v| v.as_str()), Some("a"));
        assert_eq!(
            feature.property("v_kind").and_then(|v| v.as_str()),
            Some("landing_point")
        );
        match &feature.geometry.as_ref().unwrap().value {
            geojson::Value::LineString(coords) => {
                // GeoJSON positions are [lon, lat]
                assert_eq!(coords[0], vec![20.0, 10.0]);
                assert_eq!(coords[1], vec![21.0, 11.0]);
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }
}
