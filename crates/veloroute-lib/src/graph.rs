use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::geodesy::{bearing_deg, haversine_m, path_length_m, Coordinate};
use crate::tags::{RoadClass, SurfaceKind};
use crate::weight::{edge_weight, RoutePreferences, FALLBACK_LENGTH_M};

/// Provider-assigned node identifier.
pub type NodeId = i64;

/// Position of an edge inside [`RoadGraph::edges`].
pub type EdgeIndex = usize;

/// Directed edge of the raw road multigraph.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadEdge {
    pub from: NodeId,
    pub to: NodeId,
    /// Distinguishes parallel edges sharing the same `(from, to)` pair.
    pub key: u32,
    pub length_m: f64,
    pub road_class: RoadClass,
    pub surface: SurfaceKind,
    /// Polyline in travel direction. Empty when the source did not provide one.
    pub geometry: Vec<Coordinate>,
    /// Cost assigned by [`RoadGraph::apply_weights`]; starts as the length.
    pub weight: f64,
    /// Bearing from the origin node towards the far end of the edge.
    pub bearing: f64,
}

impl RoadEdge {
    pub fn has_geometry(&self) -> bool {
        self.geometry.len() >= 2
    }
}

/// Which directed edges a road contributes to the multigraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Two-way road: one edge each way, the reverse edge with reversed geometry.
    #[default]
    Both,
    Forward,
    Backward,
}

/// A road as supplied by a provider, before expansion into directed edges.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadSpec {
    pub from: NodeId,
    pub to: NodeId,
    pub road_class: RoadClass,
    pub surface: SurfaceKind,
    pub length_m: Option<f64>,
    pub geometry: Vec<Coordinate>,
    pub direction: Direction,
}

impl RoadSpec {
    pub fn new(from: NodeId, to: NodeId, road_class: RoadClass) -> Self {
        Self {
            from,
            to,
            road_class,
            surface: SurfaceKind::Unknown,
            length_m: None,
            geometry: Vec::new(),
            direction: Direction::Both,
        }
    }

    pub fn surface(mut self, surface: SurfaceKind) -> Self {
        self.surface = surface;
        self
    }

    pub fn length(mut self, length_m: f64) -> Self {
        self.length_m = Some(length_m);
        self
    }

    pub fn geometry(mut self, geometry: Vec<Coordinate>) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn oneway(mut self) -> Self {
        self.direction = Direction::Forward;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

/// Incrementally assembles a [`RoadGraph`].
#[derive(Debug, Default)]
pub struct RoadGraphBuilder {
    nodes: BTreeMap<NodeId, Coordinate>,
    edges: Vec<RoadEdge>,
    keys: HashMap<(NodeId, NodeId), u32>,
}

impl RoadGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node.
    pub fn add_node(&mut self, id: NodeId, coordinate: Coordinate) -> &mut Self {
        self.nodes.insert(id, coordinate);
        self
    }

    pub fn node_coordinate(&self, id: NodeId) -> Option<Coordinate> {
        self.nodes.get(&id).copied()
    }

    /// Expand a road into one or two directed edges.
    ///
    /// Both endpoints must already be present. A missing or invalid length is
    /// replaced by the haversine length of the geometry, or of the straight
    /// line between the endpoints when no geometry is available.
    pub fn add_road(&mut self, road: RoadSpec) -> Result<&mut Self> {
        let from_coord = self.node(road.from)?;
        let to_coord = self.node(road.to)?;

        let length_m = match road.length_m {
            Some(length) if length.is_finite() && length >= 0.0 => length,
            _ if road.geometry.len() >= 2 => path_length_m(&road.geometry),
            _ => {
                let straight = haversine_m(from_coord, to_coord);
                if straight.is_finite() {
                    straight
                } else {
                    FALLBACK_LENGTH_M
                }
            }
        };

        if matches!(road.direction, Direction::Both | Direction::Forward) {
            self.push_edge(
                road.from,
                road.to,
                length_m,
                &road,
                road.geometry.clone(),
                from_coord,
                to_coord,
            );
        }
        if matches!(road.direction, Direction::Both | Direction::Backward) {
            let reversed: Vec<Coordinate> = road.geometry.iter().rev().copied().collect();
            self.push_edge(
                road.to, road.from, length_m, &road, reversed, to_coord, from_coord,
            );
        }
        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        length_m: f64,
        road: &RoadSpec,
        geometry: Vec<Coordinate>,
        from_coord: Coordinate,
        to_coord: Coordinate,
    ) {
        let key_slot = self.keys.entry((from, to)).or_insert(0);
        let key = *key_slot;
        *key_slot += 1;

        let far_end = if geometry.len() >= 2 {
            geometry[geometry.len() - 1]
        } else {
            to_coord
        };

        self.edges.push(RoadEdge {
            from,
            to,
            key,
            length_m,
            road_class: road.road_class,
            surface: road.surface,
            geometry,
            weight: length_m,
            bearing: bearing_deg(from_coord, far_end),
        });
    }

    fn node(&self, id: NodeId) -> Result<Coordinate> {
        self.nodes
            .get(&id)
            .copied()
            .ok_or(Error::UnknownNode { id })
    }

    pub fn build(self) -> RoadGraph {
        RoadGraph::from_parts(self.nodes, self.edges)
    }
}

/// Raw directed road multigraph for one fetched area.
#[derive(Debug, Clone, Default)]
pub struct RoadGraph {
    nodes: BTreeMap<NodeId, Coordinate>,
    edges: Vec<RoadEdge>,
    outgoing: HashMap<NodeId, Vec<EdgeIndex>>,
    degree: HashMap<NodeId, usize>,
}

impl RoadGraph {
    fn from_parts(nodes: BTreeMap<NodeId, Coordinate>, edges: Vec<RoadEdge>) -> Self {
        let mut outgoing: HashMap<NodeId, Vec<EdgeIndex>> = HashMap::new();
        // An undirected connection is identified by its unordered endpoints
        // and parallel key, so a two-way street counts once per neighbour.
        let mut connections: HashSet<(NodeId, NodeId, u32)> = HashSet::new();
        let mut degree: HashMap<NodeId, usize> = HashMap::new();

        for (index, edge) in edges.iter().enumerate() {
            outgoing.entry(edge.from).or_default().push(index);
            let pair = (edge.from.min(edge.to), edge.from.max(edge.to), edge.key);
            if connections.insert(pair) {
                *degree.entry(edge.from).or_default() += 1;
                *degree.entry(edge.to).or_default() += 1;
            }
        }

        Self {
            nodes,
            edges,
            outgoing,
            degree,
        }
    }

    pub fn builder() -> RoadGraphBuilder {
        RoadGraphBuilder::new()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn coordinate(&self, id: NodeId) -> Option<Coordinate> {
        self.nodes.get(&id).copied()
    }

    /// Nodes in ascending identifier order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, Coordinate)> + '_ {
        self.nodes.iter().map(|(id, coord)| (*id, *coord))
    }

    pub fn edges(&self) -> &[RoadEdge] {
        &self.edges
    }

    pub fn edge(&self, index: EdgeIndex) -> Option<&RoadEdge> {
        self.edges.get(index)
    }

    /// Indices of the edges leaving `node`, in insertion order.
    pub fn outgoing(&self, node: NodeId) -> &[EdgeIndex] {
        self.outgoing
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of undirected connections incident to `node`. Self-loops count
    /// twice.
    pub fn undirected_degree(&self, node: NodeId) -> usize {
        self.degree.get(&node).copied().unwrap_or(0)
    }

    /// Annotate every edge with the cost computed by the weight model.
    pub fn apply_weights(&mut self, prefs: &RoutePreferences) {
        let started = Instant::now();
        for edge in &mut self.edges {
            edge.weight = edge_weight(edge.length_m, edge.road_class, edge.surface, prefs);
        }
        debug!(
            edges = self.edges.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "applied edge weights"
        );
    }

    /// Closest node to `target` by great-circle distance. Ties resolve to the
    /// lowest identifier.
    pub fn nearest_node(&self, target: Coordinate) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for (&id, &coord) in &self.nodes {
            let distance = haversine_m(coord, target);
            match best {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => best = Some((id, distance)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Copy of the graph restricted to nodes within `radius_m` of `center`.
    /// Edges survive only when both endpoints do.
    pub fn subgraph_within(&self, center: Coordinate, radius_m: f64) -> RoadGraph {
        let nodes: BTreeMap<NodeId, Coordinate> = self
            .nodes
            .iter()
            .filter(|(_, coord)| haversine_m(**coord, center) <= radius_m)
            .map(|(id, coord)| (*id, *coord))
            .collect();
        let edges: Vec<RoadEdge> = self
            .edges
            .iter()
            .filter(|edge| nodes.contains_key(&edge.from) && nodes.contains_key(&edge.to))
            .cloned()
            .collect();
        RoadGraph::from_parts(nodes, edges)
    }

    /// Coordinates of an edge in travel direction, falling back to its
    /// endpoint nodes when no geometry was supplied.
    pub fn edge_polyline(&self, index: EdgeIndex) -> Vec<Coordinate> {
        let Some(edge) = self.edges.get(index) else {
            return Vec::new();
        };
        if edge.has_geometry() {
            return edge.geometry.clone();
        }
        [edge.from, edge.to]
            .iter()
            .filter_map(|id| self.coordinate(*id))
            .collect()
    }

    /// Build a graph from the JSON document format.
    pub fn from_document(document: &RoadGraphDocument) -> Result<Self> {
        let mut builder = RoadGraphBuilder::new();
        for node in &document.nodes {
            let coordinate = Coordinate::checked(node.lat, node.lon)?;
            builder.add_node(node.id, coordinate);
        }
        for edge in &document.edges {
            let direction = if edge.oneway {
                Direction::Forward
            } else {
                Direction::Both
            };
            builder.add_road(RoadSpec {
                from: edge.from,
                to: edge.to,
                road_class: RoadClass::from_tag(edge.highway.as_deref()),
                surface: SurfaceKind::from_tag(edge.surface.as_deref()),
                length_m: edge.length,
                geometry: edge.geometry.clone().unwrap_or_default(),
                direction,
            })?;
        }
        Ok(builder.build())
    }

    /// Serialise every directed edge as a one-way document edge so a reload
    /// reproduces the same multigraph.
    pub fn to_document(&self) -> RoadGraphDocument {
        RoadGraphDocument {
            nodes: self
                .nodes
                .iter()
                .map(|(id, coord)| DocumentNode {
                    id: *id,
                    lat: coord.lat,
                    lon: coord.lon,
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|edge| DocumentEdge {
                    from: edge.from,
                    to: edge.to,
                    highway: Some(edge.road_class.to_string()),
                    surface: (edge.surface != SurfaceKind::Unknown)
                        .then(|| edge.surface.to_string()),
                    length: Some(edge.length_m),
                    geometry: edge.has_geometry().then(|| edge.geometry.clone()),
                    oneway: true,
                })
                .collect(),
        }
    }

    /// Load a JSON road graph document from disk.
    pub fn load_json(path: &Path) -> Result<Self> {
        let started = Instant::now();
        let raw = fs::read_to_string(path).map_err(|err| Error::GraphLoad {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let document: RoadGraphDocument =
            serde_json::from_str(&raw).map_err(|err| Error::GraphLoad {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        let graph = Self::from_document(&document)?;
        debug!(
            path = %path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded road graph document"
        );
        Ok(graph)
    }
}

/// On-disk representation of a road graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadGraphDocument {
    pub nodes: Vec<DocumentNode>,
    pub edges: Vec<DocumentEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEdge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub highway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Vec<Coordinate>>,
    /// `false` (the default) expands the road into both directions.
    #[serde(default)]
    pub oneway: bool,
}
