//! Graph collaborator consumed by the edge filter.
//!
//! The filter only relies on [`TopologyGraph`]: enumerate edges with both
//! endpoints, then remove edges by id. [`Topology`] is a small in-memory graph
//! with a JSON file format, used by the command line and the tests.

pub mod export;

use crate::geometry::GeographicPosition;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityAttributes {
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// What a node stands for. Only cities and cable landing points take part in
/// filtering; an edge touching any other node is never evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    City(CityAttributes),
    LandingPoint,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoNode {
    pub position: GeographicPosition,
    pub kind: NodeKind,
}

impl GeoNode {
    pub fn city(lat: f64, lon: f64, country: impl Into<String>) -> Self {
        Self {
            position: GeographicPosition::new(lat, lon),
            kind: NodeKind::City(CityAttributes {
                country: country.into(),
                name: None,
            }),
        }
    }

    pub fn landing_point(lat: f64, lon: f64) -> Self {
        Self {
            position: GeographicPosition::new(lat, lon),
            kind: NodeKind::LandingPoint,
        }
    }

    pub fn other(lat: f64, lon: f64) -> Self {
        Self {
            position: GeographicPosition::new(lat, lon),
            kind: NodeKind::Other,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn as_city(&self) -> Option<&CityAttributes> {
        match &self.kind {
            NodeKind::City(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn is_city(&self) -> bool {
        self.as_city().is_some()
    }

    /// Cities and landing points are filtered, everything else passes through.
    pub fn participates(&self) -> bool {
        matches!(self.kind, NodeKind::City(_) | NodeKind::LandingPoint)
    }
}

/// Borrowed view of one edge and its endpoints.
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'a, E> {
    pub id: E,
    pub u: &'a GeoNode,
    pub v: &'a GeoNode,
}

pub trait TopologyGraph {
    type EdgeId: Copy + Eq + Hash + Debug;

    /// All edges in the graph's native order.
    fn edges(&self) -> impl Iterator<Item = EdgeView<'_, Self::EdgeId>>;

    /// Returns `false` when the edge was already gone.
    fn remove_edge(&mut self, edge: Self::EdgeId) -> bool;

    fn edge_count(&self) -> usize;
}

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("I/O error on topology file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Topology file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Node '{0}' is defined more than once")]
    DuplicateNode(String),
    #[error("Edge references unknown node '{0}'")]
    UnknownNode(String),
    #[error("Node '{id}' has an invalid position ({lat}, {lon})")]
    InvalidPosition { id: String, lat: f64, lon: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeRecord {
    id: String,
    lat: f64,
    lon: f64,
    #[serde(flatten)]
    kind: NodeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EdgeRecord {
    u: String,
    v: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TopologyFile {
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    edges: Vec<EdgeRecord>,
}

/// Undirected graph of geographic nodes. Edges iterate in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    node_ids: Vec<String>,
    nodes: Vec<GeoNode>,
    index: AHashMap<String, usize>,
    edges: BTreeMap<EdgeId, (usize, usize)>,
    next_edge: u64,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: impl Into<String>, node: GeoNode) -> Result<(), TopologyError> {
        let id = id.into();
        if !node.position.is_valid() {
            return Err(TopologyError::InvalidPosition {
                id,
                lat: node.position.lat(),
                lon: node.position.lon(),
            });
        }
        if self.index.contains_key(&id) {
            return Err(TopologyError::DuplicateNode(id));
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.node_ids.push(id);
        self.nodes.push(node);
        Ok(())
    }

    pub fn add_edge(&mut self, u: &str, v: &str) -> Result<EdgeId, TopologyError> {
        let u = self.lookup(u)?;
        let v = self.lookup(v)?;
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.insert(id, (u, v));
        Ok(id)
    }

    fn lookup(&self, id: &str) -> Result<usize, TopologyError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| TopologyError::UnknownNode(id.to_string()))
    }

    pub fn node(&self, id: &str) -> Option<&GeoNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains_key(&edge)
    }

    /// Node ids of an edge's endpoints.
    pub fn endpoints(&self, edge: EdgeId) -> Option<(&str, &str)> {
        self.edges
            .get(&edge)
            .map(|&(u, v)| (self.node_ids[u].as_str(), self.node_ids[v].as_str()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TopologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let topology = Self::from_reader(BufReader::new(file))?;
        info!(
            "Loaded topology with {} nodes and {} edges from {}",
            topology.node_count(),
            topology.edge_count(),
            path.display()
        );
        Ok(topology)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TopologyError> {
        let file: TopologyFile = serde_json::from_reader(reader)?;
        let mut topology = Self::new();
        for record in file.nodes {
            topology.add_node(
                record.id,
                GeoNode {
                    position: GeographicPosition::new(record.lat, record.lon),
                    kind: record.kind,
                },
            )?;
        }
        for edge in &file.edges {
            topology.add_edge(&edge.u, &edge.v)?;
        }
        Ok(topology)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TopologyError> {
        let path = path.as_ref();
        let io_err = |source: std::io::Error| TopologyError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        self.to_writer(&mut writer)?;
        writer.flush().map_err(io_err)?;
        info!(
            "Wrote topology with {} edges to {}",
            self.edge_count(),
            path.display()
        );
        Ok(())
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), TopologyError> {
        let file = TopologyFile {
            nodes: self
                .node_ids
                .iter()
                .zip(&self.nodes)
                .map(|(id, node)| NodeRecord {
                    id: id.clone(),
                    lat: node.position.lat(),
                    lon: node.position.lon(),
                    kind: node.kind.clone(),
                })
                .collect(),
            edges: self
                .edges
                .values()
                .map(|&(u, v)| EdgeRecord {
                    u: self.node_ids[u].clone(),
                    v: self.node_ids[v].clone(),
                })
                .collect(),
        };
        serde_json::to_writer_pretty(writer, &file)?;
        Ok(())
    }
}

impl TopologyGraph for Topology {
    type EdgeId = EdgeId;

    fn edges(&self) -> impl Iterator<Item = EdgeView<'_, EdgeId>> {
        self.edges.iter().map(|(&id, &(u, v))| EdgeView {
            id,
            u: &self.nodes[u],
            v: &self.nodes[v],
        })
    }

    fn remove_edge(&mut self, edge: EdgeId) -> bool {
        self.edges.remove(&edge).is_some()
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
